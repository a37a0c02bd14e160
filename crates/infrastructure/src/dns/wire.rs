//! DNS wire-format constants and the few header manipulations the UDP core
//! performs on raw datagrams (RFC 1035 §4.1.1).

pub const DNS_HEADER_SIZE: usize = 12;

pub const DNS_OFFSET_FLAGS: usize = 2;
pub const DNS_OFFSET_FLAGS2: usize = 3;

pub const DNS_FLAGS_QR: u8 = 0x80;
pub const DNS_FLAGS_TC: u8 = 0x02;
pub const DNS_FLAGS2_RA: u8 = 0x80;

/// Largest reply a client is assumed to accept without EDNS(0).
pub const DNS_MAX_PACKET_SIZE_UDP_SEND: usize = 512;

/// Largest UDP payload that fits in an IPv4 datagram.
pub const DNS_MAX_PACKET_SIZE_UDP: usize = 65536 - 20 - 8;

/// Query timeout in seconds. Also the ceiling of send retries per request.
pub const DNS_QUERY_TIMEOUT: u8 = 10;

pub const DNS_TYPE_OPT: u16 = 41;

/// Turns a query into a truncated response in place: QR and TC in the first
/// flags byte, RA in the second.
///
/// Returns `false`, leaving the buffer untouched, when it is too short to hold
/// both flags bytes.
pub fn set_truncated(buf: &mut [u8]) -> bool {
    if buf.len() <= DNS_OFFSET_FLAGS2 {
        return false;
    }
    buf[DNS_OFFSET_FLAGS] |= DNS_FLAGS_TC | DNS_FLAGS_QR;
    buf[DNS_OFFSET_FLAGS2] |= DNS_FLAGS2_RA;
    true
}

#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Section counts of a DNS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCounts {
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl HeaderCounts {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < DNS_HEADER_SIZE {
            return None;
        }
        Some(Self {
            qdcount: read_u16(buf, 4)?,
            ancount: read_u16(buf, 6)?,
            nscount: read_u16(buf, 8)?,
            arcount: read_u16(buf, 10)?,
        })
    }
}

/// Returns the offset right after the (possibly compressed) name starting at
/// `pos`.
pub fn skip_name(buf: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *buf.get(pos)? as usize;
        if len == 0 {
            return Some(pos + 1);
        }
        if len & 0xC0 == 0xC0 {
            buf.get(pos + 1)?;
            return Some(pos + 2);
        }
        if len & 0xC0 != 0 {
            return None;
        }
        pos += 1 + len;
    }
}
