/// Size overhead of wrapping a query in a DNSCrypt envelope.
///
/// Only the sizes are needed by the UDP core to decide whether a query can be
/// forwarded without exceeding the size the client negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeOverhead {
    pub header_size: usize,
    pub max_padding: usize,
}

/// Client magic (8) + client public key (32) + half nonce (12) + MAC (16).
pub const DNSCRYPT_QUERY_HEADER_SIZE: usize = 8 + 32 + 12 + 16;
pub const DNSCRYPT_MAX_PADDING: usize = 256;

impl EnvelopeOverhead {
    pub fn new(header_size: usize, max_padding: usize) -> Self {
        Self {
            header_size,
            max_padding,
        }
    }

    /// Whether a query of `query_len` bytes can be wrapped and still fit in
    /// `permitted` bytes.
    pub fn fits(&self, query_len: usize, permitted: usize) -> bool {
        let max_len = query_len
            .saturating_add(self.max_padding)
            .saturating_add(self.header_size)
            .min(permitted);
        query_len.saturating_add(self.header_size) <= max_len
    }
}

impl Default for EnvelopeOverhead {
    fn default() -> Self {
        Self::new(DNSCRYPT_QUERY_HEADER_SIZE, DNSCRYPT_MAX_PADDING)
    }
}
