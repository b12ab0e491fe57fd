/// Operating mode of a compressor/decompressor pair (RFC 3095 §4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RohcMode {
    /// No feedback channel; the compressor relies on the optimistic
    /// approach and periodic refreshes.
    #[default]
    Unidirectional,
    /// Feedback is used for recovery (NACKs) and sparse ACKs.
    BidirectionalOptimistic,
    /// Every packet is acknowledged; the compressor can use the
    /// strictest interpretation intervals.
    BidirectionalReliable,
}

impl RohcMode {
    /// Wire value in FEEDBACK-2 mode bits.
    pub fn to_bits(self) -> u8 {
        match self {
            RohcMode::Unidirectional => 1,
            RohcMode::BidirectionalOptimistic => 2,
            RohcMode::BidirectionalReliable => 3,
        }
    }

    /// Decodes FEEDBACK-2 mode bits; 0 is reserved.
    pub fn from_bits(bits: u8) -> Option<RohcMode> {
        match bits & 0b11 {
            1 => Some(RohcMode::Unidirectional),
            2 => Some(RohcMode::BidirectionalOptimistic),
            3 => Some(RohcMode::BidirectionalReliable),
            _ => None,
        }
    }
}
