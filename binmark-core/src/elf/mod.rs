//! ELF section metadata.
//!
//! The section table comes from whatever parsed the ELF header; this module
//! only needs `(name, offset, size)` for each section plus the container's
//! byte order.

mod debug_link;

pub use debug_link::{
    extract_debug_link, gnu_debuglink_crc32, DebugLinkLayout, DebugLinkRecord, DebugLinkSection,
    DEBUG_LINK_SECTION_NAME, DEBUG_LINK_TYPE_NAME,
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::window::{ByteWindow, Endianness};

/// One row of an externally supplied section table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub name: String,
    /// file offset of the section contents
    pub offset: u64,
    pub size: u64,
    /// load address, 0 for sections that are not mapped
    #[serde(default)]
    pub address: u64,
}

impl SectionEntry {
    pub fn new(name: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            address: 0,
        }
    }

    pub fn at_address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionTable {
    entries: Vec<SectionEntry>,
}

impl SectionTable {
    pub fn new(entries: Vec<SectionEntry>) -> Self {
        Self { entries }
    }

    /// Exact-name lookup. The first match wins when names repeat.
    pub fn find(&self, name: &str) -> Option<&SectionEntry> {
        self.entries.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ELF file resident in memory together with its section table.
#[derive(Debug, Clone)]
pub struct ElfImage {
    blob: Bytes,
    order: Endianness,
    sections: SectionTable,
}

impl ElfImage {
    pub fn new(blob: impl Into<Bytes>, order: Endianness, sections: SectionTable) -> Self {
        Self {
            blob: blob.into(),
            order,
            sections,
        }
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    /// Window over the contents of the section called `name`, sized to the
    /// section's declared length. `None` when there is no such section or the
    /// table points outside the file.
    pub fn section_window(&self, name: &str) -> Option<(SectionEntry, ByteWindow)> {
        let section = self.sections.find(name)?;
        match ByteWindow::over(&self.blob, section.offset, section.size, self.order) {
            Ok(window) => Some((section.clone(), window)),
            Err(e) => {
                log::warn!("section {} lies outside the file: {}", name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_exact() {
        let table = SectionTable::new(vec![
            SectionEntry::new(".gnu_debuglink.bak", 0, 4),
            SectionEntry::new(".text", 4, 4),
        ]);
        assert!(table.find(".gnu_debuglink").is_none());
        assert_eq!(table.find(".text").map(|s| s.offset), Some(4));
    }

    #[test]
    fn section_window_inherits_order() {
        let image = ElfImage::new(
            vec![0u8; 32],
            Endianness::Big,
            SectionTable::new(vec![
                SectionEntry::new(".a", 8, 16),
                SectionEntry::new(".broken", 24, 16),
            ]),
        );
        let (entry, window) = image.section_window(".a").unwrap();
        assert_eq!(entry.size, 16);
        assert_eq!(window.offset(), 8);
        assert_eq!(window.len(), 16);
        assert_eq!(window.order(), Endianness::Big);

        assert!(image.section_window(".broken").is_none());
        assert!(image.section_window(".missing").is_none());
    }
}
