//! Mach-O load commands.
//!
//! A Mach-O header is followed by `ncmds` load commands packed into
//! `sizeofcmds` bytes. Every command starts with the same two words, `cmd`
//! and `cmdsize`; what follows depends on `cmd`. [`CommandArea`] wraps the
//! packed commands, [`registry::CommandRegistry`] maps `cmd` codes to
//! decoders and [`walk::CommandWalker`] drives the two over a whole area.

pub mod commands;
pub mod registry;
pub mod walk;

pub use commands::{
    CommandVariant, DecodeCommand, EncryptedInformationCommand, EntryPointCommand, LoadCommand,
    OpaqueCommand, SourceVersionCommand, UuidCommand,
};
pub use registry::{CommandRegistry, Dispatched};
pub use walk::{CommandWalker, MarkupFailure, WalkOutcome, WalkState, WalkSummary};

use binrw::{BinRead, BinResult, BinWrite};
use bitflags::bitflags;
use bytes::Bytes;
use num_derive::{FromPrimitive, ToPrimitive};

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, Result};
use crate::window::{ByteWindow, Endianness};

/// Size of `mach_header`.
pub const MACH_HEADER_SIZE: u64 = 28;
/// Size of `mach_header_64`, which adds a reserved word.
pub const MACH_HEADER_64_SIZE: u64 = 32;

/// Load command codes with a dedicated decoder.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    strum::Display,
    strum::IntoStaticStr,
)]
#[repr(u32)]
pub enum LoadCommandType {
    #[strum(serialize = "LC_UUID")]
    Uuid = 0x1B,
    #[strum(serialize = "LC_ENCRYPTION_INFO")]
    EncryptionInfo = 0x21,
    #[strum(serialize = "LC_SOURCE_VERSION")]
    SourceVersion = 0x2A,
    #[strum(serialize = "LC_ENCRYPTION_INFO_64")]
    EncryptionInfo64 = 0x2C,
    #[strum(serialize = "LC_MAIN")]
    Main = 0x8000_0028,
}

impl LoadCommandType {
    pub fn from_code(code: u32) -> Option<Self> {
        num_traits::FromPrimitive::from_u32(code)
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Printable name for any command code, known or not.
pub fn command_code_name(code: u32) -> String {
    match LoadCommandType::from_code(code) {
        Some(ty) => ty.to_string(),
        None => format!("LC_0x{:X}", code),
    }
}

bitflags! {
    /// Mode a command is decoded in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModeFlags: u32 {
        /// 32-bit layout; cleared for the `_64` forms
        const IS_32BIT = 1;
    }
}

/// The `(cmd, cmdsize)` pair every load command starts with.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub cmd: u32,
    pub cmdsize: u32,
}

impl RecordHeader {
    pub const SIZE: u64 = 8;

    pub fn new(cmd: u32, cmdsize: u32) -> Self {
        Self { cmd, cmdsize }
    }

    /// Read a header at the cursor, in the byte order of its window.
    pub fn read_from(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let start = cursor.position();
        if cursor.remaining() < Self::SIZE {
            return Err(DecodeError::bounds(start, Self::SIZE, cursor.window().len()));
        }
        let order = cursor.window().order().into();
        match Self::read_options(cursor, order, ()) {
            Ok(header) => Ok(header),
            Err(_) => {
                // binrw restores the stream on error, but only on a best-effort basis
                cursor.seek(start)?;
                Err(DecodeError::bounds(start, Self::SIZE, cursor.window().len()))
            }
        }
    }

    pub fn kind(&self) -> Option<LoadCommandType> {
        LoadCommandType::from_code(self.cmd)
    }
}

/// The packed load commands following a Mach-O header.
#[derive(Debug, Clone)]
pub struct CommandArea {
    window: ByteWindow,
    count: Option<u32>,
    mode: ModeFlags,
}

impl CommandArea {
    /// An area holding exactly `window`. Without a count the walk runs until
    /// the window is used up.
    pub fn new(window: ByteWindow, count: Option<u32>, mode: ModeFlags) -> Self {
        Self {
            window,
            count,
            mode,
        }
    }

    /// Locate the commands of a Mach-O image from the values in its header.
    pub fn from_header(
        blob: &Bytes,
        order: Endianness,
        is_64: bool,
        ncmds: u32,
        sizeofcmds: u32,
    ) -> Result<Self> {
        let (offset, mode) = if is_64 {
            (MACH_HEADER_64_SIZE, ModeFlags::empty())
        } else {
            (MACH_HEADER_SIZE, ModeFlags::IS_32BIT)
        };
        let window = ByteWindow::over(blob, offset, sizeofcmds as u64, order)?;
        Ok(Self::new(window, Some(ncmds), mode))
    }

    pub fn window(&self) -> &ByteWindow {
        &self.window
    }

    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn mode(&self) -> ModeFlags {
        self.mode
    }
}

/// Serialize a binrw-writable value in `order`.
pub fn encode<T>(value: &T, order: Endianness) -> BinResult<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut out = std::io::Cursor::new(Vec::new());
    value.write_options(&mut out, order.into(), ())?;
    Ok(out.into_inner())
}
