//! Envelope framing for messages spread over several websocket frames.
//!
//! The chat service wraps every logical message in literal start/end markers.
//! A message that does not fit one frame arrives as a start-only frame, zero or
//! more bare continuation frames and an end-only frame:
//!
//! ```text
//! "CaSr{\"jsonrpc\":\"2.0\",\"me"   start fragment   -> buffered
//! "thod\":\"eventNewChat\",\"pa"    continuation     -> appended
//! "rams\":{}}CaEd"                  end fragment     -> complete message
//! ```

use crate::config::{DEFAULT_ENVELOPE_END, DEFAULT_ENVELOPE_START};

/// Feed one raw frame into `buffer`.
///
/// Returns the logical message once its end marker has been seen, `None`
/// while more frames are needed. A complete message is never left in
/// `buffer`, and `buffer` is empty whenever no fragment is in flight.
pub fn process_fragment(frame: &str, start: &str, end: &str, buffer: &mut String) -> Option<String> {
    if let Some(rest) = frame.strip_prefix(start) {
        if frame.len() >= start.len() + end.len() {
            if let Some(inner) = rest.strip_suffix(end) {
                return Some(inner.to_string());
            }
        }

        if !buffer.is_empty() {
            trace_warn!(
                "discarding {} buffered bytes of an unterminated envelope",
                buffer.len()
            );
        }
        buffer.clear();
        buffer.push_str(rest);
        return None;
    }

    if let Some(head) = frame.strip_suffix(end) {
        buffer.push_str(head);
        return Some(std::mem::take(buffer));
    }

    buffer.push_str(frame);
    None
}

/// Envelope markers plus the per-connection reassembly buffer.
#[derive(Debug, Clone)]
pub struct EnvelopeFramer {
    start: String,
    end: String,
    buffer: String,
}

impl Default for EnvelopeFramer {
    fn default() -> Self {
        Self::new(DEFAULT_ENVELOPE_START, DEFAULT_ENVELOPE_END)
    }
}

impl EnvelopeFramer {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            buffer: String::new(),
        }
    }

    pub fn start_marker(&self) -> &str {
        &self.start
    }

    pub fn end_marker(&self) -> &str {
        &self.end
    }

    /// Feed one frame, see [`process_fragment`].
    pub fn process(&mut self, frame: &str) -> Option<String> {
        process_fragment(frame, &self.start, &self.end, &mut self.buffer)
    }

    /// True while a fragment is waiting for its end marker.
    pub fn is_buffering(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Wrap a payload into a single enveloped frame.
    pub fn wrap(&self, payload: &str) -> String {
        let mut frame = String::with_capacity(self.start.len() + payload.len() + self.end.len());
        frame.push_str(&self.start);
        frame.push_str(payload);
        frame.push_str(&self.end);
        frame
    }

    /// Split a payload into enveloped frames no longer than `max_frame_len`
    /// bytes (at least one character of payload per frame).
    ///
    /// The payload must not itself contain the markers.
    pub fn split(&self, payload: &str, max_frame_len: usize) -> Vec<String> {
        let overhead = self.start.len() + self.end.len();
        if payload.len() + overhead <= max_frame_len || payload.is_empty() {
            return vec![self.wrap(payload)];
        }

        let cap = max_frame_len.saturating_sub(overhead).max(1);
        let pieces = chunk_on_char_boundaries(payload, cap);
        let last = pieces.len() - 1;

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| match i {
                0 => format!("{}{}", self.start, piece),
                i if i == last => format!("{}{}", piece, self.end),
                _ => piece.to_string(),
            })
            .collect()
    }
}

fn chunk_on_char_boundaries(s: &str, cap: usize) -> Vec<&str> {
    let mut pieces = Vec::with_capacity(s.len() / cap + 1);
    let mut rest = s;
    while !rest.is_empty() {
        let mut cut = cap.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // cap is smaller than the next character; take the whole character
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (piece, tail) = rest.split_at(cut);
        pieces.push(piece);
        rest = tail;
    }
    pieces
}
