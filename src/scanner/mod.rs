//! File and directory scanning.
//!
//! The [`Classifier`] merges signature lookups and heuristic findings into a
//! single verdict per file and drives parallel directory scans.

pub mod classifier;

pub use classifier::{heuristic_label, Classifier};
