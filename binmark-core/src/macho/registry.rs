use std::collections::HashMap;

use super::commands::{
    CommandVariant, DecodeCommand, EncryptedInformationCommand, EntryPointCommand, OpaqueCommand,
    SourceVersionCommand, UuidCommand,
};
use super::{command_code_name, LoadCommandType, ModeFlags, RecordHeader};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::window::ByteWindow;

/// Constructor stored in a [`CommandRegistry`]. Receives a reader positioned
/// after the record header.
pub type DecodeFn = fn(RecordHeader, u64, &mut ByteCursor<'_>, ModeFlags) -> Result<CommandVariant>;

/// Result of dispatching one record.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub command: CommandVariant,
    /// bytes of the record read by the decoder, header included
    pub consumed: u64,
    /// a registered decoder failed and the record was kept opaque
    pub fell_back: bool,
}

/// Maps load command codes to decoders.
#[derive(Clone)]
pub struct CommandRegistry {
    table: HashMap<u32, DecodeFn>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::macho()
    }
}

fn decode_as<T>(
    header: RecordHeader,
    start_index: u64,
    reader: &mut ByteCursor<'_>,
    mode: ModeFlags,
) -> Result<CommandVariant>
where
    T: DecodeCommand + Into<CommandVariant>,
{
    T::decode(header, start_index, reader, mode).map(Into::into)
}

impl CommandRegistry {
    /// A registry that knows no codes; everything decodes as opaque.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// The decoders for the Mach-O commands this crate understands.
    pub fn macho() -> Self {
        let mut registry = Self::empty();
        registry.register(LoadCommandType::EncryptionInfo.code(), |h, s, r, m| {
            decode_as::<EncryptedInformationCommand>(h, s, r, m | ModeFlags::IS_32BIT)
        });
        registry.register(LoadCommandType::EncryptionInfo64.code(), |h, s, r, m| {
            decode_as::<EncryptedInformationCommand>(h, s, r, m - ModeFlags::IS_32BIT)
        });
        registry.register(LoadCommandType::Uuid.code(), decode_as::<UuidCommand>);
        registry.register(
            LoadCommandType::SourceVersion.code(),
            decode_as::<SourceVersionCommand>,
        );
        registry.register(LoadCommandType::Main.code(), decode_as::<EntryPointCommand>);
        registry
    }

    /// Bind `code` to `decode`, replacing any earlier binding.
    pub fn register(&mut self, code: u32, decode: DecodeFn) {
        if self.table.insert(code, decode).is_some() {
            log::debug!("replaced decoder for {}", command_code_name(code));
        }
    }

    pub fn is_registered(&self, code: u32) -> bool {
        self.table.contains_key(&code)
    }

    /// Decode the record in `record`, a window spanning exactly `cmdsize`
    /// bytes. Never fails: unknown codes and bodies that do not decode come
    /// back as [`OpaqueCommand`].
    pub fn dispatch(
        &self,
        header: RecordHeader,
        start_index: u64,
        record: &ByteWindow,
        mode: ModeFlags,
    ) -> Dispatched {
        if let Some(decode) = self.table.get(&header.cmd) {
            let mut reader = ByteCursor::new(record);
            let decoded = reader
                .seek(RecordHeader::SIZE)
                .and_then(|_| decode(header, start_index, &mut reader, mode));
            match decoded {
                Ok(command) => {
                    return Dispatched {
                        command,
                        consumed: reader.position(),
                        fell_back: false,
                    }
                }
                Err(e) => log::warn!(
                    "{} at 0x{:X} does not decode, keeping it opaque: {}",
                    command_code_name(header.cmd),
                    start_index,
                    e
                ),
            }
            let mut dispatched = self.opaque(header, start_index, record);
            dispatched.fell_back = true;
            return dispatched;
        }

        log::debug!(
            "no decoder for {} at 0x{:X}",
            command_code_name(header.cmd),
            start_index
        );
        self.opaque(header, start_index, record)
    }

    /// Decode `record` as an [`OpaqueCommand`] regardless of its code.
    pub fn opaque(&self, header: RecordHeader, start_index: u64, record: &ByteWindow) -> Dispatched {
        let raw = record.slice(0, record.len()).unwrap_or_default();
        Dispatched {
            consumed: raw.len() as u64,
            command: OpaqueCommand {
                header,
                raw,
                start_index,
            }
            .into(),
            fell_back: false,
        }
    }
}
