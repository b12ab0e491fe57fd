use crate::ProfileId;

/// Errors that can occur while decompressing a ROHC packet.
///
/// A failed decompression never modifies the per-flow context beyond the
/// state machine confidence counters; context field updates are
/// transactional on CRC success.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum DecompressError {
    /// The packet is structurally invalid (short buffer, reserved bit
    /// violation, bad chain contents).
    Malformed,

    /// The first post-CID octet is not a known packet type.
    UnknownPacketType {
        /// The offending octet.
        packet_type: u8,
    },

    /// A compressed packet referenced a CID for which no context exists.
    NoContext {
        /// The referenced context id.
        cid: u16,
    },

    /// The context exists but its state does not allow this packet kind
    /// (e.g. a UO-0 while only the static part of the context is valid).
    InsufficientState {
        /// The referenced context id.
        cid: u16,
    },

    /// The CRC carried in the packet did not match the reconstructed
    /// headers and all repair attempts failed.
    BadCrc {
        /// The referenced context id.
        cid: u16,
    },

    /// An IR packet announced a profile that is not enabled.
    ProfileNotEnabled {
        /// The announced profile.
        profile: ProfileId,
    },

    /// The packet is a ROHC segment; segmentation is not supported.
    Segment,

    /// The output buffer is too small for the uncompressed packet.
    OutputTooSmall {
        /// Number of bytes that would have been required.
        required: usize,
        /// Number of bytes available in the output buffer.
        available: usize,
    },
}

impl core::fmt::Display for DecompressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use DecompressError::*;
        match self {
            Malformed => write!(f, "ROHC Decompression Error: Malformed packet."),
            UnknownPacketType { packet_type } => write!(
                f,
                "ROHC Decompression Error: Unknown packet type octet 0x{:02x}.",
                packet_type
            ),
            NoContext { cid } => write!(
                f,
                "ROHC Decompression Error: No context with CID {}.",
                cid
            ),
            InsufficientState { cid } => write!(
                f,
                "ROHC Decompression Error: Context {} has no dynamic state for this packet kind.",
                cid
            ),
            BadCrc { cid } => write!(
                f,
                "ROHC Decompression Error: CRC mismatch on context {} (repairs failed).",
                cid
            ),
            ProfileNotEnabled { profile } => write!(
                f,
                "ROHC Decompression Error: Profile {} is not enabled.",
                profile
            ),
            Segment => write!(
                f,
                "ROHC Decompression Error: ROHC segments are not supported."
            ),
            OutputTooSmall {
                required,
                available,
            } => write!(
                f,
                "ROHC Decompression Error: Output buffer too small ({} byte(s) required, {} available).",
                required, available
            ),
        }
    }
}

impl std::error::Error for DecompressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fmt() {
        assert_eq!(
            "ROHC Decompression Error: Unknown packet type octet 0xf0.",
            format!("{}", DecompressError::UnknownPacketType { packet_type: 0xf0 })
        );
        assert_eq!(
            "ROHC Decompression Error: No context with CID 3.",
            format!("{}", DecompressError::NoContext { cid: 3 })
        );
        assert_eq!(
            "ROHC Decompression Error: CRC mismatch on context 0 (repairs failed).",
            format!("{}", DecompressError::BadCrc { cid: 0 })
        );
    }
}
