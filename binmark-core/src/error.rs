use thiserror::Error;

/// Errors raised while reading or laying out records.
///
/// Only [`DecodeError::UnreadableHeader`] is meant to escape to the caller of a
/// walk; the other kinds are turned into "no value" at the synthesizer and
/// extractor boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("read of {want} bytes at pos=0x{pos:X} exceeds window length 0x{len:X}")]
    BoundsViolation { pos: u64, want: u64, len: u64 },

    #[error("layout of {layout} needs 0x{needed:X} bytes but only 0x{declared:X} are declared")]
    MalformedLayout {
        layout: &'static str,
        needed: u64,
        declared: u64,
    },

    #[error("unreadable header for record #{index} at offset 0x{offset:X}: {reason}")]
    UnreadableHeader {
        index: usize,
        offset: u64,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    pub fn bounds(pos: u64, want: u64, len: u64) -> Self {
        Self::BoundsViolation { pos, want, len }
    }

    pub fn malformed(layout: &'static str, needed: u64, declared: u64) -> Self {
        Self::MalformedLayout {
            layout,
            needed,
            declared,
        }
    }

    pub fn unreadable_header<S: Into<String>>(index: usize, offset: u64, reason: S) -> Self {
        Self::UnreadableHeader {
            index,
            offset,
            reason: reason.into(),
        }
    }
}

/// Errors raised by a [`MarkupTarget`](crate::markup::MarkupTarget).
///
/// These never abort a decode; callers log them against the record name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("type {name} already registered with a different shape")]
    Conflict { name: String },

    #[error("address 0x{address:X} is not valid for {what}")]
    InvalidAddress { address: u64, what: String },

    #[error("markup rejected: {0}")]
    Rejected(String),
}
