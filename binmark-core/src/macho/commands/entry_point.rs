use binrw::BinWrite;

use super::{DecodeCommand, LoadCommand};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::macho::{LoadCommandType, ModeFlags, RecordHeader};
use crate::structure::{CategoryPath, StructureDescriptor};

/// `entry_point_command` (`LC_MAIN`).
#[derive(BinWrite, Debug, Clone, PartialEq, Eq)]
pub struct EntryPointCommand {
    pub header: RecordHeader,
    /// file offset of `main()`
    pub entryoff: u64,
    /// initial stack size, 0 for the default
    pub stacksize: u64,
    #[bw(ignore)]
    pub start_index: u64,
}

impl EntryPointCommand {
    pub const NAME: &'static str = "entry_point_command";

    pub fn new(entryoff: u64, stacksize: u64) -> Self {
        Self {
            header: RecordHeader::new(LoadCommandType::Main.code(), 24),
            entryoff,
            stacksize,
            start_index: 0,
        }
    }
}

impl DecodeCommand for EntryPointCommand {
    fn decode(
        header: RecordHeader,
        start_index: u64,
        reader: &mut ByteCursor<'_>,
        _mode: ModeFlags,
    ) -> Result<Self> {
        let entryoff = reader.read_u64()?;
        let stacksize = reader.read_u64()?;
        Ok(Self {
            header,
            entryoff,
            stacksize,
            start_index,
        })
    }
}

impl LoadCommand for EntryPointCommand {
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
        24
    }

    fn to_structure(&self) -> StructureDescriptor {
        StructureDescriptor::builder(Self::NAME)
            .category(CategoryPath::macho())
            .dword("cmd")
            .dword("cmdsize")
            .qword("entryoff")
            .qword("stacksize")
            .build()
    }
}
