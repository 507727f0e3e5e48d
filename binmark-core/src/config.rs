use serde::{Deserialize, Serialize};

/// What to do with bytes inside a record's declared size that its decoder did
/// not consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessBytes {
    #[default]
    Ignore,
    Warn,
    /// demote the record to an opaque one
    Reject,
}

/// Knobs for a single decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub excess_bytes: ExcessBytes,
    /// Treat containers as loaded binary images. Load commands are only
    /// marked up when this is set.
    pub mark_binary_image: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            excess_bytes: ExcessBytes::Ignore,
            mark_binary_image: true,
        }
    }
}
