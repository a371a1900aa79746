//! ANSI/VT output parser feeding the scrollback buffer, using the VTE crate.

use tracing::trace;
use vte::{Params, Perform};

use crate::buffer::ScrollbackBuffer;

/// Stateful output parser.
///
/// The VTE state machine persists across calls so escape sequences split
/// between two writes are still recognised.
pub struct Parser {
    vte: vte::Parser,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            vte: vte::Parser::new(),
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").finish_non_exhaustive()
    }
}

impl Parser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process bytes into `buffer`.
    ///
    /// Returns the number of bytes consumed.
    pub fn process(&mut self, buffer: &mut ScrollbackBuffer, bytes: &[u8]) -> usize {
        let mut performer = BufferPerformer { buffer };
        for byte in bytes {
            self.vte.advance(&mut performer, *byte);
        }
        bytes.len()
    }
}

/// Re-encode a CSI sequence so it can be stored verbatim.
fn encode_csi(params: &Params, intermediates: &[u8], action: char) -> String {
    let mut sequence = String::from("\x1b[");
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            sequence.push(';');
        }
        for (j, value) in param.iter().enumerate() {
            if j > 0 {
                sequence.push(':');
            }
            sequence.push_str(&value.to_string());
        }
    }
    for byte in intermediates {
        sequence.push(*byte as char);
    }
    sequence.push(action);
    sequence
}

struct BufferPerformer<'a> {
    buffer: &'a mut ScrollbackBuffer,
}

impl Perform for BufferPerformer<'_> {
    fn print(&mut self, c: char) {
        self.buffer.push_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // Backspace (BS)
            0x08 => self.buffer.backspace(),

            // Horizontal Tab (HT)
            0x09 => self.buffer.tab(),

            // Line Feed (LF)
            0x0A => self.buffer.newline(),

            // Carriage Return (CR) is implied by LF in a line buffer
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, c: char) {
        if ignore {
            return;
        }

        match c {
            // SGR is kept so history replays with its colors
            'm' => {
                let sequence = encode_csi(params, intermediates, c);
                self.buffer.push_sequence(&sequence);
            }

            // Erase in Display: 2 (screen) and 3 (scrollback) wipe the buffer
            'J' => {
                let mode = params.iter().next().map(|p| p[0]).unwrap_or(0);
                if mode == 2 || mode == 3 {
                    self.buffer.clear();
                }
            }

            other => {
                trace!("Dropping CSI sequence with action '{}'", other);
            }
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
