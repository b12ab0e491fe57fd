use crate::err::HeaderError;

/// Errors that can occur while compressing a packet.
///
/// A failed compression never modifies the per-flow context; the caller
/// may retry with a larger buffer or hand the packet to another channel.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum CompressError {
    /// The uncompressed packet could not be parsed.
    Header(HeaderError),

    /// No enabled profile accepted the packet (the Uncompressed profile
    /// accepts everything, so this only occurs when it is disabled).
    NoMatchingProfile,

    /// The output buffer is too small for the resulting ROHC packet.
    OutputTooSmall {
        /// Number of bytes that would have been required.
        required: usize,
        /// Number of bytes available in the output buffer.
        available: usize,
    },
}

impl core::fmt::Display for CompressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use CompressError::*;
        match self {
            Header(err) => err.fmt(f),
            NoMatchingProfile => write!(
                f,
                "ROHC Compression Error: No enabled profile matches the packet."
            ),
            OutputTooSmall {
                required,
                available,
            } => write!(
                f,
                "ROHC Compression Error: Output buffer too small ({} byte(s) required, {} available).",
                required, available
            ),
        }
    }
}

impl std::error::Error for CompressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompressError::Header(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HeaderError> for CompressError {
    fn from(err: HeaderError) -> CompressError {
        CompressError::Header(err)
    }
}
