//! Detection engines.
//!
//! - Signature matching against MD5 and SHA256 hash databases
//! - Heuristic analysis (entropy, keywords, content-type mismatch)
//! - Remote signature updates

pub mod database;
pub mod heuristic;
pub mod signature;
pub mod update;

pub use database::{DatabaseInfo, DatabaseMetadata, SignatureDatabase, SignatureStore};
pub use heuristic::{Finding, FindingCategory, HeuristicAnalyzer};
pub use signature::{HashAlgorithm, SignatureEntry};
pub use update::{UpdateCoordinator, UpdateDescriptor};
