mod config;
mod container;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::LevelFilter;
use rayon::prelude::*;

use binmark_core::elf::DebugLinkSection;
use binmark_core::macho::{CommandRegistry, CommandWalker};
use binmark_core::markup::{ConflictPolicy, MarkupSession, TypeRegistry};
use binmark_core::{CancelToken, DecodeConfig};

use crate::config::{AppConfig, AppConfigBuilder, AppConfigReader, LoggerConfig};
use crate::container::Container;
use crate::report::{write_reports, CommandEntry, FileReport};

/// Decode ELF debug links and Mach-O load commands into typed structures
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(short, long, required = true)]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// fail conflicting types instead of registering them under a new name
    #[arg(long)]
    reject_conflicts: bool,

    /// stop walking the remaining files after the first fatal error
    #[arg(long)]
    fail_fast: bool,

    /// decode load commands without marking them up
    #[arg(long)]
    no_markup: bool,

    /// log debug output from binmark itself
    #[arg(short, long)]
    verbose: bool,
}

struct Dumper {
    config: AppConfig,
    registry: CommandRegistry,
    types: Arc<TypeRegistry>,
    cancel: CancelToken,
    fail_fast: bool,
}

impl Dumper {
    fn new(config: AppConfig, fail_fast: bool) -> Self {
        let types = Arc::new(TypeRegistry::with_policy(config.conflict_policy));
        Self {
            config,
            registry: CommandRegistry::macho(),
            types,
            cancel: CancelToken::new(),
            fail_fast,
        }
    }

    fn dump_all(&self, inputs: &[PathBuf]) -> Vec<FileReport> {
        inputs
            .par_iter()
            .map(|path| {
                let mut report = FileReport::new(path);
                if let Err(e) = self.dump(path, &mut report) {
                    log::error!("{}: {:#}", path.display(), e);
                    report.error = Some(format!("{:#}", e));
                    if self.fail_fast {
                        self.cancel.cancel();
                    }
                }
                report
            })
            .collect()
    }

    fn dump(&self, path: &Path, report: &mut FileReport) -> Result<()> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let container = container::load(bytes)?;
        report.format = Some(container.kind());

        let mut session = MarkupSession::new(&self.types);
        match &container {
            Container::Elf(image) => {
                if let Some(link) = DebugLinkSection::locate(image) {
                    report.debug_link = link.values();
                    if let Err(e) = link.markup(&mut session) {
                        log::error!("Unable to create Gnu_DebugLink: {}", e);
                    }
                }
            }
            Container::MachO(image) => {
                let walker = CommandWalker::new(&self.registry, &self.config.decode)
                    .with_cancel(self.cancel.clone());
                let summary = match walker.walk(&image.area, &mut session, image.base_address) {
                    Ok(summary) => summary,
                    Err(e) => {
                        report.placements = session.into_placements();
                        return Err(e.into());
                    }
                };
                report.commands = summary
                    .commands
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CommandEntry::new(i, c))
                    .collect();
                report.outcome = Some(summary.outcome);
                report.failures = summary.failures;
                if summary.fallbacks > 0 {
                    log::info!(
                        "{}: {} command(s) kept opaque",
                        path.display(),
                        summary.fallbacks
                    );
                }
            }
        }
        report.placements = session.into_placements();
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfigReader::read_or_default(args.config.as_deref())?;
    let mut builder = AppConfigBuilder::from_config(config.clone());
    if args.reject_conflicts {
        builder = builder.with_conflict_policy(ConflictPolicy::Reject);
    }
    if args.no_markup {
        builder = builder.with_decode_config(DecodeConfig {
            mark_binary_image: false,
            ..config.decode
        });
    }
    if args.verbose {
        builder = builder.with_logger_config(LoggerConfig {
            app_level_filter: LevelFilter::Debug,
            ..config.logger
        });
    }
    let config = builder.get();
    config.logger.init();

    let dumper = Dumper::new(config, args.fail_fast);
    let reports = dumper.dump_all(&args.inputs);
    write_reports(&args.output, &reports, &dumper.types.snapshot())?;

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    log::info!(
        "dumped {} file(s), {} failed, {} type(s) registered",
        reports.len(),
        failed,
        dumper.types.len()
    );
    Ok(())
}
