use binrw::BinWrite;

use super::{DecodeCommand, LoadCommand};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::macho::{LoadCommandType, ModeFlags, RecordHeader};
use crate::structure::{CategoryPath, StructureDescriptor};

/// `source_version_command`. The version packs `A.B.C.D.E` as 24.10.10.10.10
/// bits.
#[derive(BinWrite, Debug, Clone, PartialEq, Eq)]
pub struct SourceVersionCommand {
    pub header: RecordHeader,
    pub version: u64,
    #[bw(ignore)]
    pub start_index: u64,
}

impl SourceVersionCommand {
    pub const NAME: &'static str = "source_version_command";

    pub fn new(version: u64) -> Self {
        Self {
            header: RecordHeader::new(LoadCommandType::SourceVersion.code(), 16),
            version,
            start_index: 0,
        }
    }

    pub fn components(&self) -> [u64; 5] {
        let v = self.version;
        [
            v >> 40,
            (v >> 30) & 0x3FF,
            (v >> 20) & 0x3FF,
            (v >> 10) & 0x3FF,
            v & 0x3FF,
        ]
    }

    pub fn version_string(&self) -> String {
        let [a, b, c, d, e] = self.components();
        format!("{}.{}.{}.{}.{}", a, b, c, d, e)
    }
}

impl DecodeCommand for SourceVersionCommand {
    fn decode(
        header: RecordHeader,
        start_index: u64,
        reader: &mut ByteCursor<'_>,
        _mode: ModeFlags,
    ) -> Result<Self> {
        Ok(Self {
            header,
            version: reader.read_u64()?,
            start_index,
        })
    }
}

impl LoadCommand for SourceVersionCommand {
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
        16
    }

    fn to_structure(&self) -> StructureDescriptor {
        StructureDescriptor::builder(Self::NAME)
            .category(CategoryPath::macho())
            .dword("cmd")
            .dword("cmdsize")
            .qword("version")
            .build()
    }
}
