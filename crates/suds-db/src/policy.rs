//! Row-level access rules, mirrored in application code.
//!
//! The same rules exist as row-level-security policies in the migrations;
//! these functions enforce them before any SQL is issued so that policy
//! refusals are cheap, deterministic, and identical across the Postgres and
//! in-memory stores.
//!
//! Effective policy:
//! - a customer may insert orders only for their own account, and may read
//!   only their own orders;
//! - the admin role reads all orders, advances any order's status, and owns
//!   the expense ledger end to end.

use suds_schemas::{Order, Principal};
use uuid::Uuid;

use crate::error::StoreError;

/// Which order rows a principal may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    All,
    Owner(Uuid),
}

pub fn order_read_scope(principal: &Principal) -> ReadScope {
    if principal.is_admin() {
        ReadScope::All
    } else {
        ReadScope::Owner(principal.user_id)
    }
}

/// Insert is allowed only where the order's owner equals the caller; the
/// admin role may create on a customer's behalf.
pub fn allow_order_insert(principal: &Principal, owner: Uuid) -> Result<(), StoreError> {
    if principal.is_admin() || principal.user_id == owner {
        Ok(())
    } else {
        Err(StoreError::Authorization(
            "orders may only be created for the submitting account".to_string(),
        ))
    }
}

pub fn allow_order_read(principal: &Principal, order: &Order) -> bool {
    match order_read_scope(principal) {
        ReadScope::All => true,
        ReadScope::Owner(u) => order.user_id == Some(u),
    }
}

/// Gate for admin-only operations (status advance, expense ledger).
pub fn require_admin(principal: &Principal, action: &str) -> Result<(), StoreError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(StoreError::Authorization(format!(
            "{action} requires the admin role"
        )))
    }
}
