//! Link-layer stripping and IP header parsing for captured frames.
//!
//! Capture handles deliver raw frames; these functions peel the link-layer
//! header by datalink type and parse the network layer down to the
//! transport payload, rejecting anything truncated or malformed. IPv6
//! extension headers are not walked: datagrams carrying them mis-parse and
//! get dropped downstream.

use pcap::Linktype;

/// Network layer of one captured frame, borrowed from the capture buffer.
pub struct ParsedIp<'a> {
    pub src_ip: &'a [u8],
    pub dst_ip: &'a [u8],
    /// Transport bytes: UDP header plus data.
    pub payload: &'a [u8],
}

/// Bytes of link-layer header to strip for a datalink type, or `None` for
/// unsupported types.
pub fn link_header_len(linktype: Linktype) -> Option<usize> {
    match linktype {
        lt if lt == Linktype::ETHERNET => Some(14),
        lt if lt == Linktype::PPP => Some(1),
        lt if lt == Linktype::FDDI => Some(13),
        lt if lt == Linktype::NULL || lt == Linktype::LOOP => Some(4),
        lt if lt == Linktype::RAW || lt == Linktype::IPV4 => Some(0),
        lt if lt == Linktype::LINUX_SLL => Some(16),
        _ => None,
    }
}

/// Parses an IPv4 or IPv6 header and returns the addresses and transport
/// payload. Returns `None` for truncated or malformed headers.
pub fn parse_ip_payload(data: &[u8]) -> Option<ParsedIp<'_>> {
    if data.is_empty() {
        return None;
    }

    match data[0] >> 4 {
        4 => parse_ipv4(data),
        6 => parse_ipv6(data),
        _ => None,
    }
}

fn parse_ipv4(data: &[u8]) -> Option<ParsedIp<'_>> {
    if data.len() < 20 {
        return None;
    }

    let ihl = ((data[0] & 0x0F) as usize) * 4;
    if ihl < 20 || data.len() < ihl {
        return None; // truncated or malformed header
    }

    let total = u16::from_be_bytes([data[2], data[3]]) as usize;
    if total < 20 || ihl > total {
        return None;
    }
    if data.len() < total {
        return None; // capture shorter than the packet claims
    }
    let data = &data[..total];

    Some(ParsedIp {
        src_ip: &data[12..16],
        dst_ip: &data[16..20],
        payload: &data[ihl..],
    })
}

fn parse_ipv6(data: &[u8]) -> Option<ParsedIp<'_>> {
    if data.len() < 40 {
        return None;
    }

    // Fixed header only; extension headers are not walked.
    Some(ParsedIp {
        src_ip: &data[8..24],
        dst_ip: &data[24..40],
        payload: &data[40..],
    })
}
