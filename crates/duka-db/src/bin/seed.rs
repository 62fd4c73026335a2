//! # Seed Data Generator
//!
//! Populates a database with a small shop catalogue for development.
//!
//! ## Usage
//! ```bash
//! # Seed using duka.toml (or defaults)
//! cargo run -p duka-db --bin seed
//!
//! # Specify database path and batches per product
//! cargo run -p duka-db --bin seed -- --db ./data/duka.db --batches 3
//! ```
//!
//! ## Generated Data
//! - One category per catalogue group
//! - Every product gets `--batches` batches (`{CODE}-{N}`), each with its
//!   own prices and expiry so wholesale and expiry reports have something
//!   to show
//! - One batch per product is already expired

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use duka_core::{Actor, Role};
use duka_db::logging::init_tracing;
use duka_db::{Database, DbConfig, NewBatch, NewProduct, StoreConfig};

/// Catalogue groups: (category, batch code prefix, products with retail price in cents)
const CATALOGUE: &[(&str, &str, &[(&str, i64)])] = &[
    (
        "Painkillers",
        "PK",
        &[
            ("Panadol 500mg", 1000),
            ("Ibuprofen 400mg", 1500),
            ("Diclofenac 50mg", 2000),
            ("Aspirin 300mg", 800),
        ],
    ),
    (
        "Antibiotics",
        "AB",
        &[
            ("Amoxicillin 250mg", 3500),
            ("Ciprofloxacin 500mg", 4500),
            ("Metronidazole 200mg", 1800),
        ],
    ),
    (
        "Supplements",
        "SP",
        &[
            ("Vitamin C 1000mg", 2500),
            ("Zinc 20mg", 1200),
            ("Folic Acid 5mg", 900),
        ],
    ),
    (
        "First Aid",
        "FA",
        &[
            ("Cotton Wool 100g", 600),
            ("Elastic Bandage", 1400),
            ("Surgical Gloves (pair)", 300),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut batches: i64 = 2;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--batches" | "-b" => {
                if i + 1 < args.len() {
                    batches = args[i + 1].parse().unwrap_or(2).max(1);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Duka Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from duka.toml)");
                println!("  -c, --config <PATH>   Config file (default: ./duka.toml)");
                println!("  -b, --batches <N>     Batches per product (default: 2)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut store = StoreConfig::load(config_path)?;
    if let Some(path) = db_path {
        store.database_path = path;
    }

    let db = Database::new(DbConfig::from(&store))
        .await?
        .with_store_config(store.clone());
    info!(path = %store.database_path.display(), "Connected to database");

    if !db.products().categories().await?.is_empty() {
        warn!("Database already has a catalogue, skipping seed (delete the file to regenerate)");
        return Ok(());
    }

    let admin = Actor::new("seed", Role::Admin);
    let inventory = db.inventory();
    let today = Utc::now().date_naive();
    let start = std::time::Instant::now();

    let mut products = 0;
    let mut created_batches = 0;

    for (category_name, prefix, items) in CATALOGUE {
        let category = inventory.create_category(&admin, category_name).await?;

        for (index, (name, retail_cents)) in items.iter().enumerate() {
            let product = inventory
                .create_product(
                    &admin,
                    NewProduct {
                        name: name.to_string(),
                        category_id: Some(category.id.clone()),
                        low_stock_threshold: 10,
                    },
                )
                .await?;
            products += 1;

            for n in 0..batches {
                // First batch expired last month, later ones a year apart.
                let expiry_date = if n == 0 {
                    today - Duration::days(30)
                } else {
                    today + Duration::days(365 * n)
                };

                inventory
                    .add_batch(
                        &admin,
                        NewBatch {
                            product_id: product.id.clone(),
                            batch_code: format!("{prefix}{index:02}-{n:03}"),
                            expiry_date,
                            buying_price_cents: retail_cents * 60 / 100,
                            selling_price_cents: *retail_cents,
                            wholesale_price_cents: retail_cents * 85 / 100,
                            quantity: 20 + 15 * n,
                        },
                    )
                    .await?;
                created_batches += 1;
            }
        }
    }

    info!(
        products,
        batches = created_batches,
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
