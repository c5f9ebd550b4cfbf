//! Parsed UDP datagram with a stable identity.
//!
//! A `UdpMessage` is one captured datagram: the 8-byte UDP header fields
//! plus the owned payload. Its UUID is derived from the capture timestamp
//! and header fields, so the same capture always yields the same identity
//! across restarts.

use sha1::{Digest, Sha1};

/// One captured UDP datagram.
#[derive(Debug, Clone)]
pub struct UdpMessage {
    /// True iff the destination port equals the listened port.
    pub is_incoming: bool,
    /// Capture timestamp in nanoseconds since the epoch.
    pub ts_nanos: u64,
    pub src_port: u16,
    pub dst_port: u16,
    /// UDP length field: header plus payload for a well-formed datagram.
    pub length: u16,
    pub checksum: u16,
    payload: Vec<u8>,
}

impl UdpMessage {
    /// Parses the transport payload of an IP packet (UDP header + data).
    /// Returns `None` when the header is truncated.
    pub fn parse(data: &[u8], ts_nanos: u64) -> Option<UdpMessage> {
        let (header, payload) = etherparse::UdpHeader::from_slice(data).ok()?;
        Some(UdpMessage {
            is_incoming: false,
            ts_nanos,
            src_port: header.source_port,
            dst_port: header.destination_port,
            length: header.length,
            checksum: header.checksum,
            payload: payload.to_vec(),
        })
    }

    /// Deterministic identity: SHA-1 over the base-10 ASCII concatenation of
    /// timestamp, source port, destination port, and UDP length, hex-encoded
    /// to 40 lowercase characters. Distinct datagrams sharing all four
    /// fields within the same nanosecond collide; accepted.
    pub fn uuid(&self) -> String {
        let mut key = String::new();
        key.push_str(&self.ts_nanos.to_string());
        key.push_str(&self.src_port.to_string());
        key.push_str(&self.dst_port.to_string());
        key.push_str(&self.length.to_string());
        hex::encode(Sha1::digest(key.as_bytes()))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a UDP datagram: 8-byte header followed by `payload`.
    fn build_udp_datagram(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let length = (8 + payload.len()) as u16;
        let mut data = Vec::with_capacity(length as usize);
        data.extend_from_slice(&src_port.to_be_bytes());
        data.extend_from_slice(&dst_port.to_be_bytes());
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes()); // checksum
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_parse_valid_datagram() {
        let data = build_udp_datagram(5353, 9000, b"hello");
        let msg = UdpMessage::parse(&data, 123).expect("datagram should parse");
        assert_eq!(msg.src_port, 5353);
        assert_eq!(msg.dst_port, 9000);
        assert_eq!(msg.length, 13);
        assert_eq!(msg.payload(), b"hello");
        assert_eq!(msg.ts_nanos, 123);
        assert!(!msg.is_incoming);
    }

    #[test]
    fn test_parse_length_invariant() {
        let data = build_udp_datagram(1, 2, b"abcdef");
        let msg = UdpMessage::parse(&data, 0).unwrap();
        assert_eq!(msg.length as usize, 8 + msg.payload().len());
    }

    #[test]
    fn test_parse_truncated_header() {
        assert!(UdpMessage::parse(&[0u8; 7], 0).is_none());
        assert!(UdpMessage::parse(&[], 0).is_none());
    }

    #[test]
    fn test_uuid_shape() {
        let data = build_udp_datagram(1000, 2000, b"x");
        let msg = UdpMessage::parse(&data, 1_700_000_000_000_000_000).unwrap();
        let uuid = msg.uuid();
        assert_eq!(uuid.len(), 40);
        assert!(uuid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_uuid_deterministic() {
        let data = build_udp_datagram(1000, 2000, b"payload");
        let a = UdpMessage::parse(&data, 42).unwrap();
        let b = UdpMessage::parse(&data, 42).unwrap();
        assert_eq!(a.uuid(), b.uuid());
    }

    #[test]
    fn test_uuid_differs_when_fields_differ() {
        let base = UdpMessage::parse(&build_udp_datagram(1000, 2000, b"x"), 42).unwrap();
        let other_ts = UdpMessage::parse(&build_udp_datagram(1000, 2000, b"x"), 43).unwrap();
        let other_src = UdpMessage::parse(&build_udp_datagram(1001, 2000, b"x"), 42).unwrap();
        let other_dst = UdpMessage::parse(&build_udp_datagram(1000, 2001, b"x"), 42).unwrap();
        let other_len = UdpMessage::parse(&build_udp_datagram(1000, 2000, b"xy"), 42).unwrap();

        assert_ne!(base.uuid(), other_ts.uuid());
        assert_ne!(base.uuid(), other_src.uuid());
        assert_ne!(base.uuid(), other_dst.uuid());
        assert_ne!(base.uuid(), other_len.uuid());
    }

    #[test]
    fn test_uuid_known_value() {
        // sha1("42100020009") for ts=42, src=1000, dst=2000, length=9.
        let msg = UdpMessage::parse(&build_udp_datagram(1000, 2000, b"p"), 42).unwrap();
        let mut key = Vec::new();
        key.extend_from_slice(b"42");
        key.extend_from_slice(b"1000");
        key.extend_from_slice(b"2000");
        key.extend_from_slice(b"9");
        let expected = hex::encode(Sha1::digest(&key));
        assert_eq!(msg.uuid(), expected);
    }
}
