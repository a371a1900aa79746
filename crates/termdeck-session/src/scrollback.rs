//! Scrollback save and restore.
//!
//! Saving walks the buffer backwards from the newest row, merging soft-wrapped
//! continuation rows back into the logical line they came from, so a restore
//! at the same width reproduces the same rows. ANSI sequences are kept.

use std::iter::FusedIterator;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use termdeck_core::{
    Error, HostCommand, Result, ScrollbackSettings, ScrollbackSnapshot, SessionId,
};
use termdeck_view::{BufferLines, TerminalView};

use crate::coordinator::Coordinator;

lazy_static! {
    static ref ANSI_SEQUENCE: Regex =
        Regex::new(r"\x1b(\[[0-9;:?<=>]*[ -/]*[@-~]|\][^\x07\x1b]*(\x07|\x1b\\)|[@-Z\\-_])")
            .expect("ANSI sequence pattern is valid");
}

/// Options for [`ScrollbackCodec::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollbackOptions {
    /// Logical lines to keep, newest first
    pub max_lines: usize,
    /// Strip leading and trailing blank lines
    pub trim_empty_lines: bool,
    /// Merge wrapped continuation rows into logical lines
    pub preserve_wrapped_lines: bool,
}

impl Default for ScrollbackOptions {
    fn default() -> Self {
        Self::from(&ScrollbackSettings::default())
    }
}

impl From<&ScrollbackSettings> for ScrollbackOptions {
    fn from(settings: &ScrollbackSettings) -> Self {
        Self {
            max_lines: settings.max_lines,
            trim_empty_lines: settings.trim_empty_lines,
            preserve_wrapped_lines: settings.preserve_wrapped_lines,
        }
    }
}

/// A logical line rebuilt from one or more physical rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// First physical row of the line
    pub start: usize,
    /// Merged text
    pub text: String,
}

/// Lazy walk over buffer rows from `from_line` down to row 0.
///
/// Yields `(index, text)` pairs. Created by [`reverse_iterate`].
pub struct ReverseLines<'a, B: BufferLines + ?Sized> {
    buffer: &'a B,
    next: Option<usize>,
}

impl<B: BufferLines + ?Sized> Iterator for ReverseLines<'_, B> {
    type Item = (usize, String);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        self.next = index.checked_sub(1);
        let text = self.buffer.line_text(index).unwrap_or_default();
        Some((index, text))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.map(|index| index + 1).unwrap_or(0);
        (remaining, Some(remaining))
    }
}

impl<B: BufferLines + ?Sized> ExactSizeIterator for ReverseLines<'_, B> {}

impl<B: BufferLines + ?Sized> FusedIterator for ReverseLines<'_, B> {}

/// Iterate rows from `from_line` (clamped to the last row) down to 0.
pub fn reverse_iterate<B: BufferLines + ?Sized>(buffer: &B, from_line: usize) -> ReverseLines<'_, B> {
    let next = buffer
        .line_count()
        .checked_sub(1)
        .map(|last| from_line.min(last));
    ReverseLines { buffer, next }
}

/// Rebuild the logical line ending at row `index`.
///
/// If the row is a wrapped continuation, predecessor rows are merged in front
/// of it until a row that is not wrapped is reached.
pub fn reconstruct_logical_line<B: BufferLines + ?Sized>(
    line: &str,
    index: usize,
    buffer: &B,
) -> LogicalLine {
    if index == 0 || !buffer.is_wrapped_line(index) {
        return LogicalLine {
            start: index,
            text: line.to_string(),
        };
    }

    let mut parts = vec![line.to_string()];
    let mut start = index;
    for (row, text) in reverse_iterate(buffer, index - 1) {
        parts.push(text);
        start = row;
        if !buffer.is_wrapped_line(row) {
            break;
        }
    }

    parts.reverse();
    LogicalLine {
        start,
        text: parts.concat(),
    }
}

/// Whether a line holds nothing visible once ANSI sequences are removed.
pub fn is_blank_line(line: &str) -> bool {
    ANSI_SEQUENCE.replace_all(line, "").trim().is_empty()
}

/// Strip leading and trailing blank lines; interior blank lines stay.
pub fn trim_empty_lines(lines: Vec<String>) -> Vec<String> {
    let Some(first) = lines.iter().position(|line| !is_blank_line(line)) else {
        return Vec::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !is_blank_line(line))
        .unwrap_or(first);

    lines
        .into_iter()
        .skip(first)
        .take(last - first + 1)
        .collect()
}

/// The newest `max_lines` logical lines, oldest first.
fn logical_tail<B: BufferLines + ?Sized>(buffer: &B, max_lines: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut next = buffer.line_count().checked_sub(1);

    while let Some(index) = next {
        if lines.len() >= max_lines {
            break;
        }
        let text = buffer.line_text(index).unwrap_or_default();
        let logical = reconstruct_logical_line(&text, index, buffer);
        next = logical.start.checked_sub(1);
        lines.push(logical.text);
    }

    lines.reverse();
    lines
}

/// Serializes and restores terminal history.
#[derive(Debug, Clone, Default)]
pub struct ScrollbackCodec {
    defaults: ScrollbackOptions,
}

impl ScrollbackCodec {
    /// Codec whose [`defaults`](Self::defaults) come from `settings`.
    pub fn new(settings: &ScrollbackSettings) -> Self {
        Self {
            defaults: ScrollbackOptions::from(settings),
        }
    }

    /// Configured options.
    pub fn defaults(&self) -> ScrollbackOptions {
        self.defaults
    }

    /// Capture the view's history.
    pub fn save(&self, view: &dyn TerminalView, options: ScrollbackOptions) -> Result<ScrollbackSnapshot> {
        let lines = if options.preserve_wrapped_lines {
            // Row reads do not report a disposed view.
            view.buffer_snapshot(0)
                .map_err(|e| Error::SerializationFailure(e.to_string()))?;
            logical_tail(view, options.max_lines)
        } else {
            view.buffer_snapshot(options.max_lines)
                .map_err(|e| Error::SerializationFailure(e.to_string()))?
                .split('\n')
                .map(str::to_string)
                .collect()
        };

        let original_size = joined_len(&lines);
        let lines = if options.trim_empty_lines {
            trim_empty_lines(lines)
        } else {
            lines
        };
        let content = lines.join("\n");

        debug!(
            "Scrollback saved: lines={}, original_size={}, trimmed_size={}",
            lines.len(),
            original_size,
            content.len()
        );
        Ok(ScrollbackSnapshot {
            line_count: lines.len(),
            original_size,
            trimmed_size: content.len(),
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Clear the view and write `content` back line by line.
    pub fn restore(&self, view: &mut dyn TerminalView, content: &str) -> Result<()> {
        view.clear().map_err(restore_failure)?;

        let mut lines = content.split('\n').peekable();
        while let Some(line) = lines.next() {
            view.write(line).map_err(restore_failure)?;
            if lines.peek().is_some() {
                view.write("\r\n").map_err(restore_failure)?;
            }
        }
        Ok(())
    }
}

fn joined_len(lines: &[String]) -> usize {
    let bytes: usize = lines.iter().map(String::len).sum();
    bytes + lines.len().saturating_sub(1)
}

fn restore_failure(e: Error) -> Error {
    warn!("Scrollback restore failed: {}", e);
    Error::SerializationFailure(e.to_string())
}

impl Coordinator {
    /// Snapshot a session's scrollback; `None` if the session or its view is
    /// unavailable.
    pub fn save_scrollback(
        &self,
        id: &SessionId,
        max_lines: Option<usize>,
    ) -> Option<ScrollbackSnapshot> {
        let session = self.registry.get(id)?;
        let mut options = self.codec.defaults();
        if let Some(max_lines) = max_lines {
            options.max_lines = max_lines;
        }

        match self.codec.save(session.view(), options) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Scrollback save failed: id={}, error={}", id, e);
                None
            }
        }
    }

    /// Replace a session's buffer with saved content. Never fails loudly.
    pub fn restore_scrollback(&mut self, id: &SessionId, content: &str) -> bool {
        let Some(view) = self.registry.view_mut(id) else {
            debug!("Scrollback restore skipped, session not found: id={}", id);
            return false;
        };
        self.codec.restore(view, content).is_ok()
    }

    /// Debounced save after output: hand the snapshot to the host.
    pub(crate) fn persist_scrollback(&mut self, id: &SessionId) {
        let Some(snapshot) = self.save_scrollback(id, None) else {
            return;
        };
        self.channel.enqueue(
            HostCommand::PersistScrollback {
                id: id.clone(),
                snapshot,
            },
            None,
        );
    }
}
