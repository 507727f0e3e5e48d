use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use binmark_core::elf::DebugLinkRecord;
use binmark_core::macho::{command_code_name, CommandVariant, LoadCommand, MarkupFailure, WalkOutcome};
use binmark_core::markup::{Placement, RegisteredType};

#[derive(Debug, Serialize)]
pub struct CommandEntry {
    pub index: usize,
    pub code: String,
    pub name: &'static str,
    pub start_index: u64,
    pub size: u32,
    pub detail: String,
}

impl CommandEntry {
    pub fn new(index: usize, command: &CommandVariant) -> Self {
        Self {
            index,
            code: command_code_name(command.header().cmd),
            name: command.name(),
            start_index: command.start_index(),
            size: command.header().cmdsize,
            detail: describe(command),
        }
    }
}

/// One-line rendering of a command's decoded values.
pub fn describe(command: &CommandVariant) -> String {
    match command {
        CommandVariant::EncryptedInformation(c) => format!(
            "cryptoff=0x{:X} cryptsize=0x{:X} cryptid={}",
            c.cryptoff, c.cryptsize, c.cryptid
        ),
        CommandVariant::Uuid(c) => c.uuid_string(),
        CommandVariant::SourceVersion(c) => c.version_string(),
        CommandVariant::EntryPoint(c) => {
            format!("entryoff=0x{:X} stacksize=0x{:X}", c.entryoff, c.stacksize)
        }
        CommandVariant::Opaque(c) => format!("{} raw bytes", c.payload().len()),
    }
}

#[derive(Debug, Default, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_link: Option<DebugLinkRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<WalkOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<MarkupFailure>,
    pub placements: Vec<Placement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Default::default()
        }
    }
}

/// Names of the files written by [`write_reports`].
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpIndex {
    pub report_file: PathBuf,
    pub types_file: PathBuf,
    pub files: usize,
    pub failed: usize,
}

pub fn write_reports(output: &Path, files: &[FileReport], types: &[RegisteredType]) -> Result<()> {
    if !output.exists() {
        std::fs::create_dir_all(output)?;
    }

    let mut writer = std::fs::File::create(output.join("report.yaml"))?;
    serde_yaml::to_writer(&mut writer, files)?;

    let mut writer = std::fs::File::create(output.join("types.yaml"))?;
    serde_yaml::to_writer(&mut writer, types)?;

    let index = DumpIndex {
        report_file: PathBuf::from("report.yaml"),
        types_file: PathBuf::from("types.yaml"),
        files: files.len(),
        failed: files.iter().filter(|f| f.error.is_some()).count(),
    };
    let mut writer = std::fs::File::create(output.join("index.toml"))?;
    writer.write_all(toml::to_string_pretty(&index)?.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binmark_core::macho::{EncryptedInformationCommand, SourceVersionCommand};
    use binmark_core::markup::TypeRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn describes_commands() {
        let enc = EncryptedInformationCommand::new(0x4000, 0x10, 1, false);
        assert_eq!(
            describe(&enc.into()),
            "cryptoff=0x4000 cryptsize=0x10 cryptid=1"
        );
        let version = SourceVersionCommand::new((3 << 40) | (1 << 30));
        let entry = CommandEntry::new(4, &version.into());
        assert_eq!(entry.code, "LC_SOURCE_VERSION");
        assert_eq!(entry.detail, "3.1.0.0.0");
        assert_eq!(entry.size, 16);
    }

    #[test]
    fn writes_report_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("out");
        let mut report = FileReport::new(Path::new("a.out"));
        report.error = Some("unsupported container format".to_string());
        write_reports(&output, &[report], &TypeRegistry::new().snapshot())?;

        let index: DumpIndex = toml::from_str(&std::fs::read_to_string(output.join("index.toml"))?)?;
        assert_eq!(index.files, 1);
        assert_eq!(index.failed, 1);
        let yaml = std::fs::read_to_string(output.join("report.yaml"))?;
        assert!(yaml.contains("unsupported container format"));
        Ok(())
    }
}
