//! Fused feature table models

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Uniform fill range for a synthesized water-stress column
pub const WATER_STRESS_PLACEHOLDER_RANGE: (f64, f64) = (10.0, 30.0);

/// Uniform fill range for a synthesized temperature column (°C)
pub const TEMPERATURE_PLACEHOLDER_RANGE: (f64, f64) = (20.0, 40.0);

/// What to do when the fused table has no water-stress or temperature column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Fill the missing column with uniform values from a seeded generator.
    /// The same seed always yields the same values.
    Seeded { seed: u64 },
    /// Leave the column absent; risk scoring then reports a degraded result
    Disabled,
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        PlaceholderPolicy::Seeded { seed: 42 }
    }
}

/// The denormalized monitoring + weather + soil + yield table
#[derive(Debug, Clone, PartialEq)]
pub struct FusedFrame {
    pub frame: Frame,
    /// Columns filled by the placeholder policy rather than read from a source
    pub synthesized: Vec<String>,
}

impl FusedFrame {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            synthesized: Vec::new(),
        }
    }

    pub fn is_synthesized(&self, column: &str) -> bool {
        self.synthesized.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}
