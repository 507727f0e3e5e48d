use anyhow::{bail, Context, Result};
use bytes::Bytes;
use goblin::elf::section_header::SHT_NOBITS;
use goblin::mach::Mach;
use goblin::Object;

use binmark_core::elf::{ElfImage, SectionEntry, SectionTable};
use binmark_core::macho::CommandArea;
use binmark_core::Endianness;

/// A Mach-O image reduced to what the command walk needs.
pub struct MachImage {
    pub area: CommandArea,
    /// load address of the segment mapping the header
    pub base_address: u64,
}

pub enum Container {
    Elf(ElfImage),
    MachO(MachImage),
}

impl Container {
    pub fn kind(&self) -> &'static str {
        match self {
            Container::Elf(_) => "elf",
            Container::MachO(_) => "macho",
        }
    }
}

/// Parse container headers with goblin and hand the core what it needs.
pub fn load(bytes: Vec<u8>) -> Result<Container> {
    let blob = Bytes::from(bytes);
    let object = Object::parse(&blob).context("parsing container headers")?;
    match object {
        Object::Elf(elf) => {
            let order = Endianness::from_little(elf.little_endian);
            let mut entries = Vec::with_capacity(elf.section_headers.len());
            for sh in &elf.section_headers {
                let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or_default();
                let size = if sh.sh_type == SHT_NOBITS { 0 } else { sh.sh_size };
                entries.push(SectionEntry::new(name, sh.sh_offset, size).at_address(sh.sh_addr));
            }
            Ok(Container::Elf(ElfImage::new(
                blob.clone(),
                order,
                SectionTable::new(entries),
            )))
        }
        Object::Mach(Mach::Binary(macho)) => {
            let order = Endianness::from_little(macho.little_endian);
            let base_address = macho
                .segments
                .iter()
                .find(|seg| seg.fileoff == 0 && seg.filesize > 0)
                .map(|seg| seg.vmaddr)
                .unwrap_or(0);
            let area = CommandArea::from_header(
                &blob,
                order,
                macho.is_64,
                macho.header.ncmds as u32,
                macho.header.sizeofcmds,
            )
            .context("locating load commands")?;
            Ok(Container::MachO(MachImage { area, base_address }))
        }
        Object::Mach(Mach::Fat(_)) => {
            bail!("fat Mach-O files are not supported, extract a single architecture first")
        }
        _ => bail!("unsupported container format"),
    }
}

/// A 64-bit little-endian Mach-O header for `commands`.
#[cfg(test)]
pub(crate) fn macho64(commands: &[Vec<u8>]) -> Vec<u8> {
    let sizeofcmds: usize = commands.iter().map(Vec::len).sum();
    let mut out = Vec::new();
    for word in [
        0xFEED_FACFu32,
        0x0100_000C,
        0,
        2,
        commands.len() as u32,
        sizeofcmds as u32,
        0,
        0,
    ] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    for command in commands {
        out.extend_from_slice(command);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use binmark_core::macho::{encode, EntryPointCommand, UuidCommand};

    #[test]
    fn loads_thin_macho() -> Result<()> {
        let bytes = macho64(&[
            encode(&UuidCommand::new([9; 16]), Endianness::Little)?,
            encode(&EntryPointCommand::new(0x4000, 0), Endianness::Little)?,
        ]);
        let Container::MachO(image) = load(bytes)? else {
            bail!("expected a Mach-O container");
        };
        assert_eq!(image.area.count(), Some(2));
        assert_eq!(image.area.window().offset(), 32);
        assert_eq!(image.area.window().len(), 48);
        assert_eq!(image.base_address, 0);
        Ok(())
    }

    #[test]
    fn rejects_unknown_formats() {
        assert!(load(b"definitely not a binary".to_vec()).is_err());
    }
}
