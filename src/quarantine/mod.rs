//! Quarantine vault management.
//!
//! This module handles:
//! - Moving detected files out of harm's way
//! - Tracking quarantined items in a JSON index
//! - Restoring and permanently deleting items

pub mod vault;

pub use vault::{QuarantineItem, QuarantineVault};
