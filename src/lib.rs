//! Vigil: a signature and heuristic file scanner.
//!
//! Files are classified by looking up their MD5/SHA256 digests in a local
//! signature database and by running content heuristics (entropy, suspicious
//! keywords, extension/content-type mismatch). The database can be refreshed
//! from a remote source, detections can be moved into a quarantine vault,
//! and every verdict is written to an audit log.

pub mod audit;
pub mod core;
pub mod detection;
pub mod quarantine;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
