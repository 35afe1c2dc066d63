// ABOUTME: Reassembles SSE data lines from arbitrarily chunked network reads
// ABOUTME: Buffers raw bytes so multi-byte characters may straddle chunk boundaries

use tracing::warn;

const DATA_FIELD: &str = "data:";

/// Splits a byte stream into `data:` payloads.
///
/// Network reads do not respect record boundaries: one read may carry half a
/// line, several lines, or split a UTF-8 sequence. Bytes are buffered until a
/// `\n` arrives and only complete lines are decoded.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one chunk and return every data payload it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = decode_line(&line[..line.len() - 1]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }

    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, len = raw.len(), "Skipping stream line that is not valid UTF-8");
            return None;
        }
    };

    // Comments (":keepalive") and other SSE fields (event:, id:, retry:) carry no payload.
    let value = line.strip_prefix(DATA_FIELD)?;
    let value = value.strip_prefix(' ').unwrap_or(value);
    Some(value.to_string())
}
