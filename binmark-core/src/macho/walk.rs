//! The load command walk.
//!
//! ```text
//! Start -> ReadHeader -> Dispatch(i) -> Markup(i) -> ReadHeader -> ... -> Done
//!               |
//!               +-> Fatal
//! ```
//!
//! Only an unreadable header stops a walk early. Records that do not decode
//! are kept opaque, and markup failures are recorded against their record and
//! skipped. Cancellation is honoured before each header read, so a cancelled
//! walk always ends on a record boundary.

use serde::Serialize;

use super::commands::{CommandVariant, LoadCommand};
use super::registry::{CommandRegistry, Dispatched};
use super::{command_code_name, CommandArea, RecordHeader};
use crate::cancel::CancelToken;
use crate::config::{DecodeConfig, ExcessBytes};
use crate::cursor::ByteCursor;
use crate::error::{DecodeError, Result};
use crate::markup::MarkupTarget;
use crate::window::ByteWindow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    Start,
    ReadHeader,
    Dispatch(usize),
    Markup(usize),
    Done,
    Fatal(DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkOutcome {
    #[default]
    Completed,
    Cancelled,
}

/// A record whose markup did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkupFailure {
    pub index: usize,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct WalkSummary {
    pub commands: Vec<CommandVariant>,
    pub failures: Vec<MarkupFailure>,
    pub outcome: WalkOutcome,
    /// records kept opaque although a decoder was registered for them
    pub fallbacks: usize,
}

impl WalkSummary {
    /// Records that were marked up without error.
    pub fn marked_up(&self) -> impl Iterator<Item = (usize, &CommandVariant)> {
        self.commands
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.failures.iter().any(|f| f.index == *i))
    }
}

pub struct CommandWalker<'a> {
    registry: &'a CommandRegistry,
    config: &'a DecodeConfig,
    cancel: Option<CancelToken>,
}

impl<'a> CommandWalker<'a> {
    pub fn new(registry: &'a CommandRegistry, config: &'a DecodeConfig) -> Self {
        Self {
            registry,
            config,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Decode every command of `area` and mark each one up at `base_address`
    /// plus its file offset.
    pub fn walk(
        &self,
        area: &CommandArea,
        target: &mut dyn MarkupTarget,
        base_address: u64,
    ) -> Result<WalkSummary> {
        let window = area.window();
        let mut cursor = ByteCursor::new(window);
        let mut summary = WalkSummary::default();
        let mut pending: Option<(RecordHeader, u64)> = None;
        let mut state = WalkState::Start;

        loop {
            log::trace!("command walk: {:?}", state);
            state = match state {
                WalkState::Start => WalkState::ReadHeader,
                WalkState::ReadHeader => {
                    let index = summary.commands.len();
                    if self.cancelled() {
                        log::debug!("command walk cancelled before record #{}", index);
                        summary.outcome = WalkOutcome::Cancelled;
                        WalkState::Done
                    } else if self.exhausted(area, &cursor, index) {
                        WalkState::Done
                    } else {
                        match read_header(&mut cursor, index) {
                            Ok(header) => {
                                pending = Some(header);
                                WalkState::Dispatch(index)
                            }
                            Err(e) => WalkState::Fatal(e),
                        }
                    }
                }
                WalkState::Dispatch(index) => {
                    let Some((header, offset)) = pending.take() else {
                        // Dispatch is only entered with a pending header
                        return Err(DecodeError::unreadable_header(
                            index,
                            window.offset() + cursor.position(),
                            "no header read",
                        ));
                    };
                    let end = offset + header.cmdsize as u64;
                    let record = window.sub_window(offset, header.cmdsize as u64)?;
                    let start_index = record.offset();

                    let mut dispatched = self
                        .registry
                        .dispatch(header, start_index, &record, area.mode());
                    if dispatched.consumed < header.cmdsize as u64 {
                        dispatched = self.excess(index, header, &record, dispatched);
                    }
                    if dispatched.fell_back {
                        summary.fallbacks += 1;
                    }
                    summary.commands.push(dispatched.command);
                    cursor.seek(end)?;
                    WalkState::Markup(index)
                }
                WalkState::Markup(index) => {
                    let command = &summary.commands[index];
                    let marked = command.markup(target, base_address, self.config.mark_binary_image);
                    if let Err(e) = marked {
                        log::error!("Unable to create {}: {}", command.name(), e);
                        summary.failures.push(MarkupFailure {
                            index,
                            name: command.name().to_string(),
                            message: e.to_string(),
                        });
                    }
                    WalkState::ReadHeader
                }
                WalkState::Done => return Ok(summary),
                WalkState::Fatal(e) => {
                    log::error!("command walk stopped: {}", e);
                    return Err(e);
                }
            };
        }
    }

    fn exhausted(&self, area: &CommandArea, cursor: &ByteCursor<'_>, index: usize) -> bool {
        match area.count() {
            Some(count) => index >= count as usize,
            None => cursor.remaining() == 0,
        }
    }

    fn excess(
        &self,
        index: usize,
        header: RecordHeader,
        record: &ByteWindow,
        dispatched: Dispatched,
    ) -> Dispatched {
        let unread = header.cmdsize as u64 - dispatched.consumed;
        match self.config.excess_bytes {
            ExcessBytes::Ignore => dispatched,
            ExcessBytes::Warn => {
                log::warn!(
                    "record #{} ({}) leaves 0x{:X} bytes unread",
                    index,
                    command_code_name(header.cmd),
                    unread
                );
                dispatched
            }
            ExcessBytes::Reject => {
                log::warn!(
                    "record #{} ({}) leaves 0x{:X} bytes unread, keeping it opaque",
                    index,
                    command_code_name(header.cmd),
                    unread
                );
                let mut opaque = self.registry.opaque(header, record.offset(), record);
                opaque.fell_back = true;
                opaque
            }
        }
    }
}

/// Read and validate the header of record `index`. Returns the header and its
/// offset inside the command area.
fn read_header(cursor: &mut ByteCursor<'_>, index: usize) -> Result<(RecordHeader, u64)> {
    let offset = cursor.position();
    let area_len = cursor.window().len();
    let file_offset = cursor.window().offset() + offset;

    let header = RecordHeader::read_from(cursor).map_err(|_| {
        DecodeError::unreadable_header(
            index,
            file_offset,
            format!("only {} bytes left in the command area", area_len - offset),
        )
    })?;
    if (header.cmdsize as u64) < RecordHeader::SIZE {
        return Err(DecodeError::unreadable_header(
            index,
            file_offset,
            format!("cmdsize {} is smaller than the header", header.cmdsize),
        ));
    }
    if offset + header.cmdsize as u64 > area_len {
        return Err(DecodeError::unreadable_header(
            index,
            file_offset,
            format!(
                "cmdsize 0x{:X} runs past the end of the command area",
                header.cmdsize
            ),
        ));
    }
    Ok((header, offset))
}
