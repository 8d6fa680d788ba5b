//! Report decoder
//!
//! Turns the text of one fit report into [`FitResult`] trees, one per
//! marker-delimited block, lazily and in file order.
//!
//! A malformed block yields one `Err` and is dropped whole; decoding resumes
//! at the next marker line. A line that is not valid UTF-8 counts as malformed
//! for its block. Only a failing line source ends the sequence.

mod block;
mod fields;
pub mod state;

pub use block::BlockParser;
pub use state::{DecodeState, LineKind};

use crate::error::{DecodeError, FormatErrorKind};
use crate::types::FitResult;
use state::BLOCK_MARKER;
use std::collections::VecDeque;
use std::io::BufRead;
use std::iter::FusedIterator;

pub type DecodeItem = Result<FitResult, DecodeError>;

/// Lazy block-by-block decoder over any line source
pub struct Decoder<R> {
    reader: R,
    line_no: usize,
    current: Option<BlockParser>,
    /// Items produced by a marker line that closes one block and opens the next
    pending: VecDeque<DecodeItem>,
    exhausted: bool,
}

impl<R: BufRead> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            current: None,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line_no
    }

    /// State of the block being decoded
    pub fn state(&self) -> DecodeState {
        self.current
            .as_ref()
            .map(BlockParser::state)
            .unwrap_or(DecodeState::AwaitingBlockStart)
    }

    /// Next raw line without its `\n` or `\r\n` terminator
    fn read_line(&mut self) -> Option<std::io::Result<Vec<u8>>> {
        let mut raw = Vec::new();
        match self.reader.read_until(b'\n', &mut raw) {
            Ok(0) => None,
            Ok(_) => {
                if raw.last() == Some(&b'\n') {
                    raw.pop();
                    if raw.last() == Some(&b'\r') {
                        raw.pop();
                    }
                }
                Some(Ok(raw))
            }
            Err(e) => Some(Err(e)),
        }
    }

    fn close_current(&mut self) {
        if let Some(block) = self.current.take() {
            self.pending.push_back(block.finish(self.line_no - 1));
        }
    }

    fn on_marker(&mut self, line: &str) {
        self.close_current();
        match BlockParser::open(line, self.line_no) {
            Ok(block) => {
                tracing::trace!(point_name = %block.point_name(), line = self.line_no, "Block opened");
                self.current = Some(block);
            }
            Err(e) => self.pending.push_back(Err(e)),
        }
    }

    /// A line that does not decode as UTF-8 rejects the block it belongs to
    fn on_invalid_line(&mut self, raw: &[u8]) -> Option<DecodeError> {
        let error = |point_name: Option<String>, line| DecodeError::Format {
            point_name,
            line,
            kind: FormatErrorKind::InvalidUtf8,
        };

        if raw.starts_with(BLOCK_MARKER.as_bytes()) {
            self.close_current();
            self.pending.push_back(Err(error(None, self.line_no)));
            return None;
        }
        self.current
            .take()
            .map(|block| error(Some(block.point_name().to_string()), self.line_no))
    }
}

impl<'a> Decoder<&'a [u8]> {
    /// Decode an in-memory report
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: BufRead> Iterator for Decoder<R> {
    type Item = DecodeItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.exhausted {
                return None;
            }

            let raw = match self.read_line() {
                None => {
                    self.exhausted = true;
                    // Flush the final block even without a trailing marker
                    return self.current.take().map(|block| block.finish(self.line_no));
                }
                Some(Err(source)) => {
                    self.exhausted = true;
                    self.current = None;
                    return Some(Err(DecodeError::Io {
                        line: self.line_no + 1,
                        source,
                    }));
                }
                Some(Ok(raw)) => raw,
            };
            self.line_no += 1;

            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    if let Some(error) = self.on_invalid_line(e.as_bytes()) {
                        return Some(Err(error));
                    }
                    continue;
                }
            };

            if line.starts_with(BLOCK_MARKER) {
                self.on_marker(&line);
            } else if let Some(block) = self.current.as_mut() {
                if let Err(e) = block.feed(&line, self.line_no) {
                    // Rest of the block is skipped up to the next marker
                    self.current = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<R: BufRead> FusedIterator for Decoder<R> {}
