use crate::PacketFormat;
use arrayvec::ArrayVec;

/// Timestamp bits extracted from a packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct TsBits {
    pub value: u32,
    pub bits: u8,
    /// Domain of the value; `None` means whatever domain the context
    /// is currently in (base header fields), `Some` is explicit
    /// (Extension 3).
    pub scaled: Option<bool>,
}

/// All bits extracted from one compressed packet, before any W-LSB
/// decoding. Decoding and repair re-run from this record without
/// touching the wire bytes again.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExtractedBits {
    pub format: Option<PacketFormat>,
    /// Sequence number LSBs and their count.
    pub sn: Option<(u32, u8)>,
    pub ts: Option<TsBits>,
    /// IP-ID offset LSBs of the innermost sequential IPv4 header
    /// (16 bits means the full offset).
    pub ip_id: Option<(u32, u8)>,
    /// Full MSN (co_common).
    pub msn16: Option<u16>,
    /// Explicit TTL / hop limit update (co_common).
    pub co_common_ttl: Option<u8>,
    /// Explicit TOS / traffic class update (co_common).
    pub co_common_tos: Option<u8>,
    pub marker: Option<bool>,
    pub crc3: Option<u8>,
    pub crc7: Option<u8>,
    /// Verbatim IP-IDs of random-behavior IPv4 headers, outer first.
    pub rand_ip_ids: ArrayVec<u16, 2>,
    /// Irregular UDP checksum (flows that use checksums carry it in
    /// every packet).
    pub udp_checksum: Option<u16>,
}
