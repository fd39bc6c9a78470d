//! Incremental JSON array streaming
//!
//! Source files are single JSON arrays far too large to materialize, so the
//! reader scans one balanced element at a time and parses each element
//! independently. An element that fails to decode becomes a quarantinable
//! [`StreamItem::Malformed`] instead of aborting the scan; only broken
//! array framing (a truncated or unbalanced file) stops the stream.

use crate::Result;
use freightline_core::SourceRecord;
use std::io::BufRead;

/// One element scanned from the source array
#[derive(Debug)]
pub enum StreamItem {
    /// A decoded record object
    Record(SourceRecord),

    /// A balanced element that did not decode to a record object
    Malformed { raw: String, error: String },
}

enum ScanState {
    /// Before the opening `[`
    Start,
    /// Expecting an element or the closing `]`
    BeforeElement,
    /// Expecting `,` or the closing `]`
    AfterElement,
    /// Array fully consumed
    Done,
}

/// Lazy reader over one JSON array
///
/// The stream is finite and not restartable; it holds at most one element
/// in memory at a time.
pub struct JsonArrayStream<R> {
    reader: R,
    state: ScanState,
}

impl<R: BufRead> JsonArrayStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: ScanState::Start,
        }
    }

    /// Scan the next element, or `None` once the array is closed
    pub fn next_item(&mut self) -> Result<Option<StreamItem>> {
        loop {
            match self.state {
                ScanState::Start => match self.next_non_whitespace()? {
                    Some(b'[') => self.state = ScanState::BeforeElement,
                    Some(other) => {
                        return Err(framing(format!(
                            "expected '[' at start of array, found '{}'",
                            other as char
                        )))
                    }
                    None => return Err(framing("empty input, expected a JSON array".to_string())),
                },
                ScanState::BeforeElement => match self.next_non_whitespace()? {
                    Some(b']') => {
                        self.state = ScanState::Done;
                        return Ok(None);
                    }
                    Some(b',') => return Err(framing("unexpected ',' before element".to_string())),
                    Some(first) => {
                        let item = self.scan_element(first)?;
                        self.state = ScanState::AfterElement;
                        return Ok(Some(item));
                    }
                    None => return Err(framing("unexpected end of input inside array".to_string())),
                },
                ScanState::AfterElement => match self.next_non_whitespace()? {
                    Some(b',') => self.state = ScanState::BeforeElement,
                    Some(b']') => {
                        self.state = ScanState::Done;
                        return Ok(None);
                    }
                    Some(other) => {
                        return Err(framing(format!(
                            "expected ',' or ']' after element, found '{}'",
                            other as char
                        )))
                    }
                    None => return Err(framing("unexpected end of input inside array".to_string())),
                },
                ScanState::Done => return Ok(None),
            }
        }
    }

    /// Accumulate one balanced element, starting from its first byte
    ///
    /// Tracks brace/bracket depth with string and escape awareness; the
    /// element ends at the first top-level `,` or `]`, which is left
    /// unconsumed for the framing state machine.
    fn scan_element(&mut self, first: u8) -> Result<StreamItem> {
        let mut raw: Vec<u8> = Vec::new();
        let mut depth: u32 = 0;
        let mut in_string = false;
        let mut escaped = false;

        raw.push(first);
        match first {
            b'"' => in_string = true,
            b'{' | b'[' => depth = 1,
            b'}' => return Err(framing("unexpected '}' at start of element".to_string())),
            _ => {}
        }

        loop {
            if depth == 0 && !in_string {
                match self.peek_byte()? {
                    Some(b',') | Some(b']') => break,
                    Some(_) => {}
                    None => {
                        return Err(framing(
                            "unexpected end of input inside array element".to_string(),
                        ))
                    }
                }
            }

            let byte = match self.peek_byte()? {
                Some(byte) => byte,
                None => {
                    return Err(framing(
                        "unexpected end of input inside array element".to_string(),
                    ))
                }
            };
            self.reader.consume(1);
            raw.push(byte);

            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
            } else {
                match byte {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth = depth.checked_sub(1).ok_or_else(|| {
                            framing(format!("unbalanced '{}' in element", byte as char))
                        })?;
                    }
                    _ => {}
                }
            }
        }

        Ok(decode_element(raw))
    }

    fn peek_byte(&mut self) -> std::io::Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    /// Read and consume the next non-whitespace byte
    fn next_non_whitespace(&mut self) -> std::io::Result<Option<u8>> {
        loop {
            match self.peek_byte()? {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => self.reader.consume(1),
                Some(byte) => {
                    self.reader.consume(1);
                    return Ok(Some(byte));
                }
                None => return Ok(None),
            }
        }
    }
}

/// Parse a balanced element into a record, or report why it is not one
fn decode_element(raw: Vec<u8>) -> StreamItem {
    let text = match String::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
            return StreamItem::Malformed {
                raw: lossy,
                error: "invalid UTF-8 in element".to_string(),
            };
        }
    };

    match serde_json::from_str::<serde_json::Value>(text.trim()) {
        Ok(value) => match SourceRecord::from_value(value) {
            Ok(record) => StreamItem::Record(record),
            Err(e) => StreamItem::Malformed {
                raw: text.trim().to_string(),
                error: e.to_string(),
            },
        },
        Err(e) => StreamItem::Malformed {
            raw: text.trim().to_string(),
            error: e.to_string(),
        },
    }
}

fn framing(message: String) -> crate::Error {
    crate::Error::Malformed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(input: &str) -> JsonArrayStream<Cursor<&str>> {
        JsonArrayStream::new(Cursor::new(input))
    }

    fn collect(input: &str) -> Vec<StreamItem> {
        let mut reader = stream(input);
        let mut items = Vec::new();
        while let Some(item) = reader.next_item().expect("Stream should scan") {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_empty_array_yields_nothing() {
        assert!(collect("[]").is_empty());
        assert!(collect("  [ \n ]  ").is_empty());
    }

    #[test]
    fn test_records_decode_one_at_a_time() {
        let items = collect(r#"[{"vehicle_id": "V001"}, {"vehicle_id": "V002"}]"#);
        assert_eq!(items.len(), 2);
        for (item, expected) in items.iter().zip(["V001", "V002"]) {
            match item {
                StreamItem::Record(record) => {
                    assert_eq!(record.str_field("vehicle_id"), Some(expected));
                }
                other => panic!("Expected record, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_nested_structures_stay_balanced() {
        let items = collect(r#"[{"a": {"b": [1, 2, {"c": 3}]}, "d": []}]"#);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], StreamItem::Record(_)));
    }

    #[test]
    fn test_strings_with_brackets_and_escapes() {
        let items = collect(r#"[{"origin": "Dock ]}, \" 7", "destination": "Bay {"}]"#);
        assert_eq!(items.len(), 1);
        match &items[0] {
            StreamItem::Record(record) => {
                assert_eq!(record.str_field("origin"), Some(r#"Dock ]}, " 7"#));
                assert_eq!(record.str_field("destination"), Some("Bay {"));
            }
            other => panic!("Expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_element_does_not_stop_the_scan() {
        let items = collect(r#"[{"a": 1}, {bad json}, {"b": 2}]"#);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], StreamItem::Record(_)));
        assert!(matches!(items[1], StreamItem::Malformed { .. }));
        assert!(matches!(items[2], StreamItem::Record(_)));
    }

    #[test]
    fn test_non_object_element_is_malformed() {
        let items = collect(r#"[42, "loose string", {"a": 1}]"#);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], StreamItem::Malformed { .. }));
        assert!(matches!(items[1], StreamItem::Malformed { .. }));
        assert!(matches!(items[2], StreamItem::Record(_)));
    }

    #[test]
    fn test_truncated_array_is_a_framing_error() {
        let mut reader = stream(r#"[{"a": 1}"#);
        assert!(matches!(
            reader.next_item(),
            Ok(Some(StreamItem::Record(_)))
        ));
        assert!(matches!(
            reader.next_item(),
            Err(crate::Error::Malformed(_))
        ));
    }

    #[test]
    fn test_truncated_element_is_a_framing_error() {
        let mut reader = stream(r#"[{"a": "#);
        assert!(matches!(
            reader.next_item(),
            Err(crate::Error::Malformed(_))
        ));
    }

    #[test]
    fn test_input_without_array_is_rejected() {
        let mut reader = stream(r#"{"a": 1}"#);
        assert!(matches!(
            reader.next_item(),
            Err(crate::Error::Malformed(_))
        ));
    }

    #[test]
    fn test_stream_is_exhausted_after_close() {
        let mut reader = stream(r#"[{"a": 1}] trailing"#);
        assert!(reader.next_item().expect("First item").is_some());
        assert!(reader.next_item().expect("Array end").is_none());
        // Once closed, the stream stays closed
        assert!(reader.next_item().expect("Still closed").is_none());
    }
}
