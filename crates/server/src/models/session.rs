//! Session-related types for staff authentication.
//!
//! Login itself is handled by the shop's account service, which writes
//! [`CurrentStaff`] under [`keys::CURRENT_STAFF`] into the shared session
//! store. This crate only reads it.

use serde::{Deserialize, Serialize};

use orderdesk_core::{StaffId, StaffRole};

use super::history::Actor;

/// Session-stored staff identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentStaff {
    /// Staff member's account ID.
    pub id: StaffId,
    /// Display name, recorded on history entries.
    pub name: String,
    /// Role/permission level.
    pub role: StaffRole,
}

impl CurrentStaff {
    /// The identity recorded on history entries.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Session keys for staff authentication data.
pub mod keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";
}
