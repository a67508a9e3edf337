//! Line framing and record classification for the generation stream.
//!
//! The wire format is newline-delimited UTF-8 text:
//!
//! ```text
//! progress:40
//! message:Picking restaurants
//! {"content": "..."}
//! ```

/// Default substring that marks a JSON line as the terminal plan payload.
pub const DEFAULT_TERMINAL_MARKER: &str = "\"content\"";

const PROGRESS_PREFIX: &str = "progress:";
const MESSAGE_PREFIX: &str = "message:";

/// One classified line of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    /// `progress:<int>`, clamped to `0..=100`.
    Progress { value: u8 },
    /// `message:<text>`, text kept verbatim.
    Message { text: String },
    /// A JSON object line carrying the terminal marker. Not parsed yet.
    Terminal { json: String },
    /// Anything else, including a `progress:` line that failed to decode.
    Unrecognized { text: String, reason: UnrecognizedReason },
}

/// Why a line ended up as [`RawRecord::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrecognizedReason {
    /// No known prefix.
    UnknownPrefix,
    /// `progress:` with a value that is not a base-10 integer.
    BadProgressValue,
}

/// Classifies a single decoded line. Blank lines yield `None`.
pub fn classify(line: &str, terminal_marker: &str) -> Option<RawRecord> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        return Some(match rest.trim().parse::<i64>() {
            Ok(value) => RawRecord::Progress {
                value: value.clamp(0, 100) as u8,
            },
            Err(_) => RawRecord::Unrecognized {
                text: line.to_string(),
                reason: UnrecognizedReason::BadProgressValue,
            },
        });
    }

    if let Some(rest) = line.strip_prefix(MESSAGE_PREFIX) {
        return Some(RawRecord::Message {
            text: rest.to_string(),
        });
    }

    if line.starts_with('{') && line.contains(terminal_marker) {
        return Some(RawRecord::Terminal {
            json: line.to_string(),
        });
    }

    Some(RawRecord::Unrecognized {
        text: line.to_string(),
        reason: UnrecognizedReason::UnknownPrefix,
    })
}

/// Splits a chunked byte stream into complete `\n`-terminated lines.
///
/// Splitting happens on raw bytes. `\n` never appears inside a multi-byte
/// UTF-8 sequence, so a code point cut by a chunk boundary stays in the
/// carried fragment until its remaining bytes arrive.
#[derive(Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Appends a chunk and returns every line it completed, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        // The carried fragment holds no `\n`, so only the new bytes are searched.
        let Some(offset) = chunk.iter().rposition(|b| *b == b'\n') else {
            self.buf.extend_from_slice(chunk);
            return Vec::new();
        };
        let last_newline = self.buf.len() + offset;
        self.buf.extend_from_slice(chunk);
        let complete: Vec<u8> = self.buf.drain(..=last_newline).collect();
        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Returns the unterminated trailing fragment, if any, at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Number of bytes currently carried over.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_prefixes() {
        let m = DEFAULT_TERMINAL_MARKER;
        assert_eq!(
            classify("progress:42", m),
            Some(RawRecord::Progress { value: 42 })
        );
        assert_eq!(
            classify("message: keep  spacing ", m),
            Some(RawRecord::Message {
                text: " keep  spacing ".into()
            })
        );
        assert_eq!(
            classify(r#"{"content":"x"}"#, m),
            Some(RawRecord::Terminal {
                json: r#"{"content":"x"}"#.into()
            })
        );
        assert_eq!(classify("   ", m), None);
        assert_eq!(classify("\r", m), None);
    }

    #[test]
    fn json_without_marker_is_unrecognized() {
        let record = classify(r#"{"status":"ok"}"#, DEFAULT_TERMINAL_MARKER);
        assert!(matches!(
            record,
            Some(RawRecord::Unrecognized {
                reason: UnrecognizedReason::UnknownPrefix,
                ..
            })
        ));
    }

    #[test]
    fn bad_progress_value_is_flagged() {
        let record = classify("progress:abc", DEFAULT_TERMINAL_MARKER);
        assert_eq!(
            record,
            Some(RawRecord::Unrecognized {
                text: "progress:abc".into(),
                reason: UnrecognizedReason::BadProgressValue,
            })
        );
    }

    #[test]
    fn progress_is_clamped_and_crlf_stripped() {
        let m = DEFAULT_TERMINAL_MARKER;
        assert_eq!(
            classify("progress:250\r", m),
            Some(RawRecord::Progress { value: 100 })
        );
        assert_eq!(
            classify("progress:-3", m),
            Some(RawRecord::Progress { value: 0 })
        );
    }

    #[test]
    fn decoder_carries_partial_line() {
        let mut decoder = LineDecoder::default();
        assert_eq!(decoder.push_chunk(b"progress:10\nmess"), vec!["progress:10"]);
        assert_eq!(decoder.pending_len(), 4);
        assert_eq!(decoder.push_chunk(b"age:hi\n"), vec!["message:hi"]);
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_keeps_empty_lines_between_newlines() {
        let mut decoder = LineDecoder::default();
        assert_eq!(decoder.push_chunk(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn decoder_reassembles_split_code_points_at_every_offset() {
        let text = "message:Zürich → 東京 🚆\n";
        let bytes = text.as_bytes();
        for first in 0..bytes.len() {
            for second in first..bytes.len() {
                let mut decoder = LineDecoder::default();
                let mut lines = decoder.push_chunk(&bytes[..first]);
                lines.extend(decoder.push_chunk(&bytes[first..second]));
                lines.extend(decoder.push_chunk(&bytes[second..]));
                assert_eq!(lines, vec!["message:Zürich → 東京 🚆"], "split at {first}/{second}");
                assert!(!lines[0].contains('\u{FFFD}'));
            }
        }
    }

    #[test]
    fn long_line_fed_byte_by_byte_is_carried_whole() {
        let payload = format!("{{\"content\":\"{}\"}}\n", "x".repeat(4096));
        let mut decoder = LineDecoder::default();
        let mut lines = Vec::new();
        for byte in payload.as_bytes() {
            lines.extend(decoder.push_chunk(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec![payload.trim_end().to_string()]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push_chunk(b"progress:100").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("progress:100"));
        assert_eq!(decoder.finish(), None);
    }
}
