//! Decoding of the incremental diagnosis reply: UTF-8 bytes in,
//! newline-delimited `data: {json}` records out.

use serde::Deserialize;

use crate::constants::stream::DATA_PREFIX;

/// Payload of one `data:` record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StreamPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: Option<bool>,
}

impl StreamPayload {
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

/// Incremental record splitter. Bytes of a split UTF-8 sequence and the tail
/// of an unterminated line are carried over to the next chunk.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    pending_bytes: Vec<u8>,
    pending_line: String,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns the data of every record it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = self.decode_available();
        self.pending_line.push_str(&text);

        let mut records = Vec::new();
        while let Some(pos) = self.pending_line.find('\n') {
            let line: String = self.pending_line.drain(..=pos).collect();
            if let Some(data) = record_data(&line) {
                records.push(data.to_string());
            }
        }
        records
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_line.push_str(&tail);
            self.pending_bytes.clear();
        }

        let line = std::mem::take(&mut self.pending_line);
        record_data(&line)
            .map(|data| vec![data.to_string()])
            .unwrap_or_default()
    }

    fn decode_available(&mut self) -> String {
        let mut out = String::new();
        let mut consumed = 0;

        loop {
            let rest = &self.pending_bytes[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending_bytes.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + bad;
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending_bytes.drain(..consumed);
        out
    }
}

/// The payload text of a `data:` line, if the line is one.
pub fn record_data(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return None;
    }
    line.strip_prefix(DATA_PREFIX)
}
