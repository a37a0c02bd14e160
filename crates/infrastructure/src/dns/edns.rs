//! EDNS(0) handling applied to client queries before they are forwarded
//! (RFC 6891 §6.1).

use bytes::BytesMut;

use super::wire::{self, HeaderCounts, DNS_HEADER_SIZE, DNS_MAX_PACKET_SIZE_UDP_SEND, DNS_TYPE_OPT};

const OPT_RECORD_LEN: usize = 11;

/// Hook run on every client query before it leaves the proxy.
///
/// Implementations may grow `query` in place up to `capacity` bytes and
/// return the UDP payload size negotiated by the client, or 0 when the client
/// did not advertise one. A failure must leave `query` sendable.
pub trait EdnsSection: Send {
    fn add_section(&self, query: &mut BytesMut, capacity: usize) -> usize;
}

/// Reports the payload size of an existing OPT record, or appends one
/// advertising `payload_size` to queries that have no additional records.
#[derive(Debug, Clone, Copy)]
pub struct OptRecordAppender {
    payload_size: u16,
}

impl OptRecordAppender {
    pub fn new(payload_size: u16) -> Self {
        Self { payload_size }
    }

    fn opt_record(&self) -> [u8; OPT_RECORD_LEN] {
        let size = self.payload_size.to_be_bytes();
        [0x00, 0x00, 41, size[0], size[1], 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    }
}

impl EdnsSection for OptRecordAppender {
    fn add_section(&self, query: &mut BytesMut, capacity: usize) -> usize {
        let Some(counts) = HeaderCounts::parse(query) else {
            return 0;
        };
        if counts.ancount != 0 || counts.nscount != 0 {
            return 0;
        }
        let Some(question_end) = skip_questions(query, counts.qdcount) else {
            return 0;
        };

        if counts.arcount > 0 {
            return find_opt_payload_size(query, question_end, counts.arcount)
                .map(usize::from)
                .unwrap_or(0);
        }

        if usize::from(self.payload_size) <= DNS_MAX_PACKET_SIZE_UDP_SEND
            || question_end != query.len()
            || query.len() + OPT_RECORD_LEN > capacity
        {
            return 0;
        }

        query.extend_from_slice(&self.opt_record());
        wire::write_u16(query, 10, 1);
        0
    }
}

fn skip_questions(buf: &[u8], qdcount: u16) -> Option<usize> {
    let mut pos = DNS_HEADER_SIZE;
    for _ in 0..qdcount {
        pos = wire::skip_name(buf, pos)? + 4;
        if pos > buf.len() {
            return None;
        }
    }
    Some(pos)
}

fn find_opt_payload_size(buf: &[u8], mut pos: usize, arcount: u16) -> Option<u16> {
    for _ in 0..arcount {
        let name_end = wire::skip_name(buf, pos)?;
        let rr_type = wire::read_u16(buf, name_end)?;
        let rr_class = wire::read_u16(buf, name_end + 2)?;
        let rdlen = wire::read_u16(buf, name_end + 8)? as usize;
        if rr_type == DNS_TYPE_OPT {
            return Some(rr_class);
        }
        pos = name_end + 10 + rdlen;
    }
    None
}
