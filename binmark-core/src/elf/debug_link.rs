use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ElfImage, SectionEntry};
use crate::cursor::ByteCursor;
use crate::error::{DecodeError, MarkupError, Result};
use crate::markup::{MarkupTarget, TypeHandle};
use crate::structure::{CategoryPath, DataKind, StructureDescriptor};
use crate::synth::{align_up, DynamicStructureSynthesizer, LayoutRule};
use crate::window::{ByteWindow, Endianness};

pub const DEBUG_LINK_SECTION_NAME: &str = ".gnu_debuglink";
pub const DEBUG_LINK_TYPE_NAME: &str = "Gnu_DebugLink";

const CRC_SIZE: u64 = 4;
const CRC_ALIGN: u64 = 4;

/// Contents of a `.gnu_debuglink` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLinkRecord {
    pub filename: String,
    pub crc: u32,
}

impl DebugLinkRecord {
    /// Whether `debug_file` is the file this link points at, judged by CRC.
    pub fn matches(&self, debug_file: &[u8]) -> bool {
        gnu_debuglink_crc32(debug_file) == self.crc
    }

    /// Wire encoding: NUL-terminated name, zero padding to 4, CRC in
    /// `order`.
    pub fn encode(&self, order: Endianness) -> Vec<u8> {
        let mut out = self.filename.as_bytes().to_vec();
        out.push(0);
        out.resize(align_up(out.len() as u64, CRC_ALIGN) as usize, 0);
        match order {
            Endianness::Little => out.extend_from_slice(&self.crc.to_le_bytes()),
            Endianness::Big => out.extend_from_slice(&self.crc.to_be_bytes()),
        }
        out
    }
}

/// The CRC stored in a debug link: plain CRC-32 over the whole debug file.
pub fn gnu_debuglink_crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Layout of a debug link: the filename field covers the name, its
/// terminator and the padding up to the 4-byte boundary; the CRC follows.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugLinkLayout;

impl LayoutRule for DebugLinkLayout {
    fn name(&self) -> &'static str {
        DEBUG_LINK_TYPE_NAME
    }

    fn layout(&self, window: &ByteWindow, declared_size: u64) -> Result<StructureDescriptor> {
        let text_len = ByteCursor::new(window).peek_nul_terminated_len()?;
        if text_len == 0 {
            return Err(DecodeError::malformed(DEBUG_LINK_TYPE_NAME, CRC_SIZE + 1, declared_size));
        }

        // stored length, terminator included
        let name_len = text_len + 1;
        if name_len + CRC_SIZE > declared_size {
            return Err(DecodeError::malformed(
                DEBUG_LINK_TYPE_NAME,
                name_len + CRC_SIZE,
                declared_size,
            ));
        }

        Ok(StructureDescriptor::builder(DEBUG_LINK_TYPE_NAME)
            .commented(
                "filename",
                DataKind::String,
                align_up(name_len, CRC_ALIGN),
                "Debug file name",
            )
            .dword("crc")
            .build())
    }
}

/// A located `.gnu_debuglink` section.
///
/// Holds the section window for as long as the value lives, so the layout is
/// synthesized once no matter how often it is asked for.
pub struct DebugLinkSection {
    section: SectionEntry,
    window: ByteWindow,
    synth: DynamicStructureSynthesizer<DebugLinkLayout>,
}

impl DebugLinkSection {
    /// Find the debug link section of `image`. A missing section is a normal
    /// outcome.
    pub fn locate(image: &ElfImage) -> Option<Self> {
        let (section, window) = image.section_window(DEBUG_LINK_SECTION_NAME)?;
        Some(Self::from_window(section, window))
    }

    pub fn from_window(section: SectionEntry, window: ByteWindow) -> Self {
        Self {
            section,
            window,
            synth: DynamicStructureSynthesizer::new(DebugLinkLayout),
        }
    }

    pub fn section(&self) -> &SectionEntry {
        &self.section
    }

    /// Synthesized layout without a category, shared across calls.
    pub fn structure(&self) -> Option<Arc<StructureDescriptor>> {
        self.synth.synthesize(&self.window, self.section.size)
    }

    /// Layout filed under `/ELF`, ready for registration.
    pub fn typed_structure(&self) -> Option<StructureDescriptor> {
        self.structure().map(|s| s.with_category(CategoryPath::elf()))
    }

    /// Decode the filename and CRC. Any bounds or layout problem yields `None`.
    pub fn values(&self) -> Option<DebugLinkRecord> {
        self.structure()?;
        match self.read_values() {
            Ok(values) => Some(values),
            Err(e) => {
                log::debug!("unreadable {} section: {}", DEBUG_LINK_SECTION_NAME, e);
                None
            }
        }
    }

    fn read_values(&self) -> Result<DebugLinkRecord> {
        let mut cursor = ByteCursor::new(&self.window);
        let filename = cursor.read_nul_terminated_string()?;
        cursor.align_to(CRC_ALIGN)?;
        let crc = cursor.read_u32()?;
        Ok(DebugLinkRecord { filename, crc })
    }

    /// Address the structure is placed at: the load address when the section
    /// is mapped, its file offset otherwise (debug links normally are not).
    pub fn placement_address(&self) -> u64 {
        if self.section.address != 0 {
            self.section.address
        } else {
            self.section.offset
        }
    }

    /// Register the layout and place it over the section. Returns `Ok(None)`
    /// when there is no layout to place.
    pub fn markup(
        &self,
        target: &mut dyn MarkupTarget,
    ) -> std::result::Result<Option<TypeHandle>, MarkupError> {
        let Some(structure) = self.typed_structure() else {
            return Ok(None);
        };
        let handle = target.register_type(&structure)?;
        target.create_data(self.placement_address(), &handle)?;
        Ok(Some(handle))
    }
}

/// Extract the debug link of `image`, if it has a well-formed one.
pub fn extract_debug_link(image: &ElfImage) -> Option<DebugLinkRecord> {
    DebugLinkSection::locate(image)?.values()
}
