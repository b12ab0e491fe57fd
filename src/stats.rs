/// Running counters of one engine instance.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineStats {
    /// Packets successfully processed.
    pub packets: u64,
    /// Packets rejected with an error.
    pub packets_failed: u64,
    /// Bytes taken in (uncompressed on the compressor, ROHC on the
    /// decompressor).
    pub bytes_in: u64,
    /// Bytes produced.
    pub bytes_out: u64,
    /// IR packets emitted or accepted.
    pub ir_packets: u64,
    /// Dynamic refresh packets (IR-DYN / co_repair).
    pub refresh_packets: u64,
    /// Compressed (CO) packets.
    pub co_packets: u64,
    /// Feedback elements handled.
    pub feedback_elements: u64,
    /// Successful CRC repair attempts (decompressor only).
    pub repairs: u64,
    /// Contexts evicted to make room for new flows.
    pub evictions: u64,
}
