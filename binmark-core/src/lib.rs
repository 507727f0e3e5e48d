//! This crate implements the core functionality of binmark
//!
//! This mostly includes bounded byte readers, dynamic structure synthesis for
//! self-terminating records, and decoders for ELF section metadata and Mach-O
//! load commands. Everything a decoder produces is handed to a
//! [`markup::MarkupTarget`], which stands in for the analysis database.

#![allow(clippy::uninlined_format_args)]

pub mod cancel;
pub mod config;
pub mod cursor;
pub mod elf;
pub mod error;
pub mod macho;
pub mod markup;
pub mod structure;
pub mod synth;
pub mod window;

pub use cancel::CancelToken;
pub use config::{DecodeConfig, ExcessBytes};
pub use cursor::ByteCursor;
pub use error::{DecodeError, MarkupError};
pub use structure::{CategoryPath, DataKind, FieldDescriptor, StructureDescriptor};
pub use synth::{align_up, DynamicStructureSynthesizer, LayoutRule};
pub use window::{ByteWindow, Endianness, WindowId};

#[cfg(test)]
mod test_util;
