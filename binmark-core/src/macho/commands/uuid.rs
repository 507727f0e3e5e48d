use std::fmt;

use binrw::BinWrite;

use super::{DecodeCommand, LoadCommand};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::macho::{LoadCommandType, ModeFlags, RecordHeader};
use crate::structure::{CategoryPath, DataKind, StructureDescriptor};

/// `uuid_command`: the 128-bit identifier shared by a binary and its dSYM.
#[derive(BinWrite, Debug, Clone, PartialEq, Eq)]
pub struct UuidCommand {
    pub header: RecordHeader,
    pub uuid: [u8; 16],
    #[bw(ignore)]
    pub start_index: u64,
}

impl UuidCommand {
    pub const NAME: &'static str = "uuid_command";

    pub fn new(uuid: [u8; 16]) -> Self {
        Self {
            header: RecordHeader::new(LoadCommandType::Uuid.code(), 24),
            uuid,
            start_index: 0,
        }
    }

    /// Canonical 8-4-4-4-12 rendering.
    pub fn uuid_string(&self) -> String {
        UuidDisplay(&self.uuid).to_string()
    }
}

struct UuidDisplay<'a>(&'a [u8; 16]);

impl fmt::Display for UuidDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl DecodeCommand for UuidCommand {
    fn decode(
        header: RecordHeader,
        start_index: u64,
        reader: &mut ByteCursor<'_>,
        _mode: ModeFlags,
    ) -> Result<Self> {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(reader.read_bytes(16)?);
        Ok(Self {
            header,
            uuid,
            start_index,
        })
    }
}

impl LoadCommand for UuidCommand {
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
            .field("uuid", DataKind::Bytes, 16)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::encode;
    use crate::window::{ByteWindow, Endianness};

    #[test]
    fn uuid_string_is_grouped() {
        let cmd = UuidCommand::new(*b"\x01\x23\x45\x67\x89\xab\xcd\xef\x01\x23\x45\x67\x89\xab\xcd\xef");
        assert_eq!(cmd.uuid_string(), "01234567-89AB-CDEF-0123-456789ABCDEF");
    }

    #[test]
    fn uuid_bytes_ignore_byte_order() {
        let cmd = UuidCommand::new([7; 16]);
        let bytes = encode(&cmd, Endianness::Big).unwrap();
        let window = ByteWindow::new(bytes, Endianness::Big);
        let mut cursor = ByteCursor::new(&window);
        let header = RecordHeader::read_from(&mut cursor).unwrap();
        let decoded = UuidCommand::decode(header, 0, &mut cursor, ModeFlags::empty()).unwrap();
        assert_eq!(decoded, cmd);
        assert_eq!(decoded.to_structure().size(), 24);
    }
}
