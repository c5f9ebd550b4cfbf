//! Framing codec for captured payloads.
//!
//! Every frame exchanged between inputs and outputs starts with a single
//! textual header line:
//!
//! ```text
//! <type> <uuid> <nanoseconds>\n
//! <payload bytes...>
//! ```
//!
//! `type` is one ASCII digit, `uuid` 40 lowercase hex characters, and
//! `nanoseconds` the decimal capture timestamp. On disk, frames are joined
//! by [`PAYLOAD_SEPARATOR`]; no escaping is applied, so a payload that
//! happens to contain the separator corrupts subsequent framing.

/// Captured request (a datagram addressed to the listened port).
pub const REQUEST_PAYLOAD: u8 = b'1';
/// Captured response (a datagram leaving the listened port).
pub const RESPONSE_PAYLOAD: u8 = b'2';
/// Response observed during replay.
pub const REPLAYED_RESPONSE_PAYLOAD: u8 = b'3';

/// Separator between frames in capture files: LF, the three
/// see/hear/speak-no-evil monkeys as UTF-8, LF.
pub const PAYLOAD_SEPARATOR: &str = "\n\u{1F435}\u{1F648}\u{1F649}\n";

/// Encodes a frame header. Example: `1 f45590...b3 1231\n`.
pub fn payload_header(payload_type: u8, uuid: &[u8], ts_nanos: u64) -> Vec<u8> {
    let stime = ts_nanos.to_string();
    let mut header = Vec::with_capacity(1 + 1 + uuid.len() + 1 + stime.len() + 1);
    header.push(payload_type);
    header.push(b' ');
    header.extend_from_slice(uuid);
    header.push(b' ');
    header.extend_from_slice(stime.as_bytes());
    header.push(b'\n');
    header
}

/// Returns the payload after the header line. The frame must have been read
/// in full; without any LF the whole input is returned.
pub fn payload_body(payload: &[u8]) -> &[u8] {
    match payload.iter().position(|&b| b == b'\n') {
        Some(header_size) => &payload[header_size + 1..],
        None => payload,
    }
}

/// Returns the header tokens split on spaces. Tolerates a missing LF by
/// tokenizing the whole input.
pub fn payload_meta(payload: &[u8]) -> Vec<&[u8]> {
    let header_size = payload
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(payload.len());
    payload[..header_size].split(|&b| b == b' ').collect()
}

/// True if the frame carries a captured request.
pub fn is_request(payload: &[u8]) -> bool {
    payload.first() == Some(&REQUEST_PAYLOAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let uuid = b"f45590522cd1838b4a0d5c5aab80b77929dea3b3";
        let header = payload_header(REQUEST_PAYLOAD, uuid, 1231);
        assert_eq!(
            header,
            b"1 f45590522cd1838b4a0d5c5aab80b77929dea3b3 1231\n"
        );
        // Exactly one LF, at the end.
        assert_eq!(header.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(header.last(), Some(&b'\n'));
    }

    #[test]
    fn test_meta_round_trip() {
        let uuid = b"f45590522cd1838b4a0d5c5aab80b77929dea3b3";
        let mut frame = payload_header(RESPONSE_PAYLOAD, uuid, 1_700_000_000_000_000_000);
        frame.extend_from_slice(b"payload bytes");

        let meta = payload_meta(&frame);
        assert_eq!(meta.len(), 3);
        assert_eq!(meta[0], b"2");
        assert_eq!(meta[1], uuid.as_slice());
        assert_eq!(meta[2], b"1700000000000000000");
    }

    #[test]
    fn test_body_strips_header() {
        let mut frame = payload_header(REQUEST_PAYLOAD, b"abc", 42);
        frame.extend_from_slice(b"hello");
        assert_eq!(payload_body(&frame), b"hello");
    }

    #[test]
    fn test_body_preserves_payload_newlines() {
        let mut frame = payload_header(REQUEST_PAYLOAD, b"abc", 42);
        frame.extend_from_slice(b"line1\nline2");
        assert_eq!(payload_body(&frame), b"line1\nline2");
    }

    #[test]
    fn test_meta_without_newline_tokenizes_whole_input() {
        let meta = payload_meta(b"1 abc 99");
        assert_eq!(meta, vec![&b"1"[..], &b"abc"[..], &b"99"[..]]);
    }

    #[test]
    fn test_is_request() {
        assert!(is_request(b"1 abc 99\nx"));
        assert!(!is_request(b"2 abc 99\nx"));
        assert!(!is_request(b"3 abc 99\nx"));
        assert!(!is_request(b""));
    }

    #[test]
    fn test_separator_bytes() {
        assert_eq!(
            PAYLOAD_SEPARATOR.as_bytes(),
            b"\n\xF0\x9F\x90\xB5\xF0\x9F\x99\x88\xF0\x9F\x99\x89\n"
        );
    }
}
