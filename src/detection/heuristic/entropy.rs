//! Entropy calculation for detecting packed/encrypted content.
//!
//! High entropy (close to 8.0 for byte data) typically indicates:
//! - Encrypted content
//! - Compressed/packed executables
//! - Random or obfuscated data
//!
//! Plain text usually sits between 3.5 and 5.0.

use super::{Finding, FindingCategory};

/// Entropy thresholds for classification.
pub const ENTROPY_LOW: f64 = 5.0;
pub const ENTROPY_NORMAL: f64 = 6.5;
pub const ENTROPY_HIGH: f64 = 7.0;
pub const ENTROPY_VERY_HIGH: f64 = 7.5;
pub const ENTROPY_MAX: f64 = 8.0;

/// Whole-file Shannon entropy check.
#[derive(Debug, Clone)]
pub struct EntropyAnalyzer {
    /// Findings are raised strictly above this value
    threshold: f64,
}

impl Default for EntropyAnalyzer {
    fn default() -> Self {
        Self::new(ENTROPY_HIGH)
    }
}

impl EntropyAnalyzer {
    /// Create an analyzer flagging data above `threshold` bits per byte.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, ENTROPY_MAX),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Calculate Shannon entropy of byte data.
    ///
    /// Returns a value between 0.0 (no randomness) and 8.0 (maximum randomness for bytes).
    pub fn calculate(data: &[u8]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }

        let mut frequencies = [0u64; 256];
        for &byte in data {
            frequencies[byte as usize] += 1;
        }

        let len = data.len() as f64;
        let mut entropy = 0.0;

        for &count in &frequencies {
            if count > 0 {
                let probability = count as f64 / len;
                entropy -= probability * probability.log2();
            }
        }

        entropy
    }

    /// Run the check on already-read content.
    pub fn check(&self, data: &[u8]) -> Option<Finding> {
        let entropy = Self::calculate(data);
        if entropy > self.threshold {
            Some(Finding::new(
                FindingCategory::Entropy,
                format!("High entropy ({:.2} > {:.2})", entropy, self.threshold),
            ))
        } else {
            None
        }
    }

    /// Classify entropy level.
    pub fn classify(entropy: f64) -> EntropyLevel {
        if entropy < ENTROPY_LOW {
            EntropyLevel::Low
        } else if entropy < ENTROPY_NORMAL {
            EntropyLevel::Normal
        } else if entropy < ENTROPY_HIGH {
            EntropyLevel::Elevated
        } else if entropy < ENTROPY_VERY_HIGH {
            EntropyLevel::High
        } else {
            EntropyLevel::VeryHigh
        }
    }
}

/// Classification of entropy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyLevel {
    /// Low entropy (< 5.0) - structured data, text
    Low,
    /// Normal entropy (5.0-6.5) - typical executable code
    Normal,
    /// Elevated entropy (6.5-7.0) - some compression or encoding
    Elevated,
    /// High entropy (7.0-7.5) - likely packed or partially encrypted
    High,
    /// Very high entropy (> 7.5) - likely encrypted or compressed
    VeryHigh,
}

impl std::fmt::Display for EntropyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntropyLevel::Low => write!(f, "Low"),
            EntropyLevel::Normal => write!(f, "Normal"),
            EntropyLevel::Elevated => write!(f, "Elevated"),
            EntropyLevel::High => write!(f, "High"),
            EntropyLevel::VeryHigh => write!(f, "Very High"),
        }
    }
}
