use bytes::Bytes;

use super::LoadCommand;
use crate::macho::{command_code_name, RecordHeader};
use crate::structure::{CategoryPath, StructureDescriptor};

/// A command without a dedicated decoder, kept as raw bytes.
///
/// Also stands in for known commands whose body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueCommand {
    pub header: RecordHeader,
    /// the whole record, header included
    pub raw: Bytes,
    pub start_index: u64,
}

impl OpaqueCommand {
    pub const NAME: &'static str = "load_command";

    /// Bytes following the header.
    pub fn payload(&self) -> &[u8] {
        self.raw.get(RecordHeader::SIZE as usize..).unwrap_or_default()
    }

    pub fn code_name(&self) -> String {
        command_code_name(self.header.cmd)
    }
}

impl LoadCommand for OpaqueCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn start_index(&self) -> u64 {
        self.start_index
    }

    fn fixed_size(&self) -> u64 {
        RecordHeader::SIZE
    }

    fn to_structure(&self) -> StructureDescriptor {
        StructureDescriptor::builder(Self::NAME)
            .category(CategoryPath::macho())
            .dword("cmd")
            .dword("cmdsize")
            .build()
    }
}
