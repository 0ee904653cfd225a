//! User interface components.
//!
//! This module provides:
//! - CLI argument definitions
//! - Colored console output and prompts

pub mod cli;
pub mod console;

pub use cli::Cli;
pub use console::Console;
