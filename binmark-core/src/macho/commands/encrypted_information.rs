use binrw::BinWrite;

use super::{DecodeCommand, LoadCommand};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::macho::{LoadCommandType, ModeFlags, RecordHeader};
use crate::structure::{CategoryPath, StructureDescriptor};

/// `encryption_info_command` and `encryption_info_command_64`.
///
/// The 64-bit form carries one extra padding word. Whether it is present is
/// decided once, at decode time, and both the byte count and the structure
/// follow from `pad` being set.
#[derive(BinWrite, Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInformationCommand {
    pub header: RecordHeader,
    /// file offset of the encrypted range
    pub cryptoff: u32,
    /// length of the encrypted range
    pub cryptsize: u32,
    /// encryption system, 0 when not encrypted yet
    pub cryptid: u32,
    pub pad: Option<u32>,
    #[bw(ignore)]
    pub start_index: u64,
}

impl EncryptedInformationCommand {
    pub const NAME: &'static str = "encryption_info_command";

    /// Build a command with a consistent header, for writing test images.
    pub fn new(cryptoff: u32, cryptsize: u32, cryptid: u32, is_32bit: bool) -> Self {
        let (cmd, pad, size) = if is_32bit {
            (LoadCommandType::EncryptionInfo, None, 20)
        } else {
            (LoadCommandType::EncryptionInfo64, Some(0), 24)
        };
        Self {
            header: RecordHeader::new(cmd.code(), size),
            cryptoff,
            cryptsize,
            cryptid,
            pad,
            start_index: 0,
        }
    }

    pub fn is_32bit(&self) -> bool {
        self.pad.is_none()
    }

    pub fn is_encrypted(&self) -> bool {
        self.cryptid != 0
    }
}

impl DecodeCommand for EncryptedInformationCommand {
    fn decode(
        header: RecordHeader,
        start_index: u64,
        reader: &mut ByteCursor<'_>,
        mode: ModeFlags,
    ) -> Result<Self> {
        let cryptoff = reader.read_u32()?;
        let cryptsize = reader.read_u32()?;
        let cryptid = reader.read_u32()?;
        let pad = if mode.contains(ModeFlags::IS_32BIT) {
            None
        } else {
            Some(reader.read_u32()?)
        };
        Ok(Self {
            header,
            cryptoff,
            cryptsize,
            cryptid,
            pad,
            start_index,
        })
    }
}

impl LoadCommand for EncryptedInformationCommand {
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
        if self.is_32bit() {
            20
        } else {
            24
        }
    }

    fn to_structure(&self) -> StructureDescriptor {
        let builder = StructureDescriptor::builder(Self::NAME)
            .category(CategoryPath::macho())
            .dword("cmd")
            .dword("cmdsize")
            .dword("cryptoff")
            .dword("cryptsize")
            .dword("cryptid");
        match self.pad {
            Some(_) => builder.dword("pad").build(),
            None => builder.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::encode;
    use crate::window::{ByteWindow, Endianness};
    use pretty_assertions::assert_eq;

    fn decode_bytes(bytes: Vec<u8>, order: Endianness, mode: ModeFlags) -> EncryptedInformationCommand {
        let window = ByteWindow::new(bytes, order);
        let mut cursor = ByteCursor::new(&window);
        let header = RecordHeader::read_from(&mut cursor).unwrap();
        EncryptedInformationCommand::decode(header, 0x40, &mut cursor, mode).unwrap()
    }

    #[test]
    fn decode_32bit() {
        let bytes = hex::decode("2100000014000000001000000020000001000000").unwrap();
        let cmd = decode_bytes(bytes, Endianness::Little, ModeFlags::IS_32BIT);
        assert_eq!(cmd.cryptoff, 0x1000);
        assert_eq!(cmd.cryptsize, 0x2000);
        assert_eq!(cmd.cryptid, 1);
        assert!(cmd.is_32bit());
        assert!(cmd.is_encrypted());
        assert_eq!(cmd.start_index(), 0x40);
        assert_eq!(cmd.fixed_size(), 20);

        let s = cmd.to_structure();
        assert_eq!(s.fields().len(), 5);
        assert_eq!(s.size(), 20);
        assert_eq!(s.category().as_str(), "/MachO");
    }

    #[test]
    fn decode_64bit_consumes_pad() {
        let original = EncryptedInformationCommand {
            pad: Some(0xAABBCCDD),
            ..EncryptedInformationCommand::new(0x4000, 0x8000, 0, false)
        };
        let bytes = encode(&original, Endianness::Big).unwrap();
        assert_eq!(bytes.len(), 24);

        let window = ByteWindow::new(bytes, Endianness::Big);
        let mut cursor = ByteCursor::new(&window);
        let header = RecordHeader::read_from(&mut cursor).unwrap();
        let cmd =
            EncryptedInformationCommand::decode(header, 0, &mut cursor, ModeFlags::empty()).unwrap();
        assert_eq!(cursor.position(), 24);
        assert_eq!(cmd, original);

        let s = cmd.to_structure();
        assert_eq!(
            s.layout(),
            vec![
                ("cmd", 4),
                ("cmdsize", 4),
                ("cryptoff", 4),
                ("cryptsize", 4),
                ("cryptid", 4),
                ("pad", 4)
            ]
        );
    }

    #[test]
    fn truncated_64bit_body_fails() {
        let bytes = encode(&EncryptedInformationCommand::new(1, 2, 3, true), Endianness::Little).unwrap();
        let window = ByteWindow::new(bytes, Endianness::Little);
        let mut cursor = ByteCursor::new(&window);
        let header = RecordHeader::read_from(&mut cursor).unwrap();
        assert!(EncryptedInformationCommand::decode(header, 0, &mut cursor, ModeFlags::empty()).is_err());
    }
}
