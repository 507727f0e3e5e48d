mod encrypted_information;
mod entry_point;
mod opaque;
mod source_version;
mod uuid;

pub use encrypted_information::EncryptedInformationCommand;
pub use entry_point::EntryPointCommand;
pub use opaque::OpaqueCommand;
pub use source_version::SourceVersionCommand;
pub use uuid::UuidCommand;

use enum_dispatch::enum_dispatch;

use super::{ModeFlags, RecordHeader};
use crate::cursor::ByteCursor;
use crate::error::{MarkupError, Result};
use crate::markup::MarkupTarget;
use crate::structure::StructureDescriptor;

/// What every decoded load command can do.
#[enum_dispatch]
pub trait LoadCommand {
    /// Structure name, e.g. `encryption_info_command`.
    fn name(&self) -> &'static str;

    fn header(&self) -> &RecordHeader;

    /// File offset of the first byte of the command.
    fn start_index(&self) -> u64;

    /// Bytes covered by the structure, header included.
    fn fixed_size(&self) -> u64;

    /// Layout of the command, filed under `/MachO`.
    fn to_structure(&self) -> StructureDescriptor;

    /// Register the command's type, place it at `base_address + start_index`
    /// and cover the record with a fragment. Only binary images are marked
    /// up; otherwise this does nothing.
    fn markup(
        &self,
        target: &mut dyn MarkupTarget,
        base_address: u64,
        is_binary: bool,
    ) -> std::result::Result<(), MarkupError> {
        if !is_binary {
            return Ok(());
        }
        let invalid = || MarkupError::InvalidAddress {
            address: base_address,
            what: self.name().to_string(),
        };
        let address = base_address
            .checked_add(self.start_index())
            .ok_or_else(invalid)?;
        let span = (self.header().cmdsize as u64).max(self.fixed_size());
        address.checked_add(span).ok_or_else(invalid)?;

        // nothing is placed unless the type could be registered
        let ty = target.register_type(&self.to_structure())?;
        target.create_data(address, &ty)?;
        target.create_fragment(self.name(), address, self.header().cmdsize as u64)
    }
}

/// Decoding half of a command. The walker has already consumed the header;
/// `reader` is positioned right after it and bounded by `cmdsize`.
pub trait DecodeCommand: Sized {
    fn decode(
        header: RecordHeader,
        start_index: u64,
        reader: &mut ByteCursor<'_>,
        mode: ModeFlags,
    ) -> Result<Self>;
}

/// A decoded load command.
#[enum_dispatch(LoadCommand)]
#[derive(Debug, Clone, PartialEq)]
pub enum CommandVariant {
    EncryptedInformation(EncryptedInformationCommand),
    Uuid(UuidCommand),
    SourceVersion(SourceVersionCommand),
    EntryPoint(EntryPointCommand),
    Opaque(OpaqueCommand),
}

impl CommandVariant {
    pub fn is_opaque(&self) -> bool {
        matches!(self, CommandVariant::Opaque(_))
    }
}
