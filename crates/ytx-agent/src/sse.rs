use serde_json::Value;
use tracing::trace;

use crate::backends::ProviderAdapter;
use crate::stream::StreamEvent;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Turns a vendor SSE byte stream into [`StreamEvent`]s.
///
/// Bytes may arrive in arbitrary slices: incomplete UTF-8 sequences and
/// partial lines are held until the rest arrives. At most one terminal event
/// is ever produced; input after it is ignored.
pub struct SseNormalizer {
    adapter: Box<dyn ProviderAdapter>,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    buffer: String,
    finished: bool,
}

impl SseNormalizer {
    pub fn new(adapter: Box<dyn ProviderAdapter>) -> Self {
        Self {
            adapter,
            pending: Vec::new(),
            buffer: String::new(),
            finished: false,
        }
    }

    /// Whether a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds one slice of the response body.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        decode_utf8(&mut self.pending, bytes, &mut self.buffer);

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.handle_line(trim_line_end(&line), &mut events);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Signals the end of the body. Processes an unterminated last line, then
    /// synthesizes `Done` if no terminal event was seen.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if !self.pending.is_empty() {
            self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            self.handle_line(trim_line_end(&rest), &mut events);
        }

        self.terminate(StreamEvent::Done, &mut events);
        events
    }

    /// Ends the stream with an error unless it already ended.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.buffer.clear();
        self.pending.clear();
        Some(StreamEvent::error(message))
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data.trim() == DONE_SENTINEL {
            self.terminate(StreamEvent::Done, events);
            return;
        }

        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, "skipping malformed SSE data line");
                return;
            }
        };

        if let Some(message) = self.adapter.extract_stream_error(&event) {
            self.terminate(StreamEvent::error(message), events);
            return;
        }

        if let Some(text) = self.adapter.extract_delta_text(&event) {
            if !text.is_empty() {
                events.push(StreamEvent::Chunk { text });
            }
        }

        if self.adapter.is_stream_end(&event) {
            self.terminate(StreamEvent::Done, events);
        }
    }

    fn terminate(&mut self, event: StreamEvent, events: &mut Vec<StreamEvent>) {
        if !self.finished {
            self.finished = true;
            events.push(event);
        }
    }
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(|c: char| c == '\n' || c == '\r')
}

/// Appends the decodable prefix of `pending + bytes` to `out`, keeping an
/// incomplete trailing sequence in `pending`. Invalid bytes become U+FFFD.
fn decode_utf8(pending: &mut Vec<u8>, bytes: &[u8], out: &mut String) {
    pending.extend_from_slice(bytes);
    let mut start = 0;
    while start < pending.len() {
        match std::str::from_utf8(&pending[start..]) {
            Ok(s) => {
                out.push_str(s);
                start = pending.len();
            }
            Err(e) => {
                let valid = start + e.valid_up_to();
                out.push_str(std::str::from_utf8(&pending[start..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        start = valid + len;
                    }
                    None => {
                        start = valid;
                        break;
                    }
                }
            }
        }
    }
    pending.drain(..start);
}
