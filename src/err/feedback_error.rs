/// Errors that can occur while parsing a feedback element delivered to
/// the compressor.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum FeedbackError {
    /// The feedback element is structurally invalid.
    Malformed,

    /// The feedback element carried a CRC option that did not match.
    BadCrc,

    /// The feedback element referenced a CID with no matching context.
    UnknownCid {
        /// The referenced context id.
        cid: u16,
    },
}

impl core::fmt::Display for FeedbackError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use FeedbackError::*;
        match self {
            Malformed => write!(f, "ROHC Feedback Error: Malformed feedback element."),
            BadCrc => write!(
                f,
                "ROHC Feedback Error: Feedback CRC option mismatch, element dropped."
            ),
            UnknownCid { cid } => {
                write!(f, "ROHC Feedback Error: No context with CID {}.", cid)
            }
        }
    }
}

impl std::error::Error for FeedbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
