//! # Authorization Capabilities
//!
//! Workflows never look at role strings. They ask an [`Authorizer`] whether
//! an [`Actor`] holds a [`Capability`]; the default [`RolePolicy`] maps the
//! shop's three roles onto capabilities.
//!
//! ## Role Matrix
//! ```text
//! ┌──────────────────┬─────────┬─────────┬─────────┐
//! │ capability       │ admin   │ cashier │ staff   │
//! ├──────────────────┼─────────┼─────────┼─────────┤
//! │ CreateOrder      │   ✓     │         │   ✓     │
//! │ UpdateOrder      │   ✓     │         │   ✓     │
//! │ ResendOrder      │   ✓     │         │   ✓     │
//! │ DeleteOrder      │   ✓     │         │   ✓     │
//! │ ConfirmOrder     │   ✓     │   ✓     │         │
//! │ RejectOrder      │   ✓     │   ✓     │         │
//! │ CreateSale       │   ✓     │   ✓     │         │
//! │ RecordPayment    │   ✓     │   ✓     │         │
//! │ Refund           │   ✓     │   ✓     │         │
//! │ ReverseRefund    │   ✓     │         │         │
//! │ ManageInventory  │   ✓     │         │         │
//! └──────────────────┴─────────┴─────────┴─────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cashier,
    Staff,
}

/// Something a workflow may need permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateOrder,
    ConfirmOrder,
    RejectOrder,
    ResendOrder,
    UpdateOrder,
    DeleteOrder,
    CreateSale,
    RecordPayment,
    Refund,
    ReverseRefund,
    ManageInventory,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateOrder => "create_order",
            Capability::ConfirmOrder => "confirm_order",
            Capability::RejectOrder => "reject_order",
            Capability::ResendOrder => "resend_order",
            Capability::UpdateOrder => "update_order",
            Capability::DeleteOrder => "delete_order",
            Capability::CreateSale => "create_sale",
            Capability::RecordPayment => "record_payment",
            Capability::Refund => "refund",
            Capability::ReverseRefund => "reverse_refund",
            Capability::ManageInventory => "manage_inventory",
        }
    }
}

/// The user performing an operation. Stamped onto every row it writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Decides whether an actor may perform an action.
pub trait Authorizer: Send + Sync {
    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool;

    /// Returns `PermissionDenied` when the capability is missing.
    fn require(&self, actor: &Actor, capability: Capability) -> CoreResult<()> {
        if self.has_capability(actor, capability) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                user_id: actor.user_id.clone(),
                capability: capability.as_str().to_string(),
            })
        }
    }
}

/// Default role matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl Authorizer for RolePolicy {
    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        use Capability::*;
        match actor.role {
            Role::Admin => true,
            Role::Cashier => matches!(
                capability,
                ConfirmOrder | RejectOrder | CreateSale | RecordPayment | Refund
            ),
            Role::Staff => matches!(
                capability,
                CreateOrder | UpdateOrder | ResendOrder | DeleteOrder
            ),
        }
    }
}

/// Grants everything. Handy where authorization happens upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn has_capability(&self, _actor: &Actor, _capability: Capability) -> bool {
        true
    }
}
