use crate::err::LenError;

/// Errors that can occur while parsing an uncompressed packet into its
/// header model.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum HeaderError {
    /// Not enough data to decode a header.
    Len(LenError),

    /// The IP version nibble was neither 4 nor 6.
    UnsupportedIpVersion {
        /// Value of the version nibble.
        version: u8,
    },

    /// An IPv4 header announced an internet header length below the
    /// minimum of 5 (20 bytes).
    Ipv4IhlTooSmall {
        /// Value of the IHL field.
        ihl: u8,
    },

    /// An IPv4 'total length' field was smaller than the header itself.
    Ipv4TotalLenTooSmall {
        /// Value of the total length field.
        total_len: u16,
    },
}

impl core::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use HeaderError::*;
        match self {
            Len(err) => err.fmt(f),
            UnsupportedIpVersion { version } => write!(
                f,
                "IP Header Error: Unsupported IP version number {} (only 4 & 6 are supported).",
                version
            ),
            Ipv4IhlTooSmall { ihl } => write!(
                f,
                "IPv4 Header Error: The 'internet header length' of {} is smaller than the minimum of 5.",
                ihl
            ),
            Ipv4TotalLenTooSmall { total_len } => write!(
                f,
                "IPv4 Header Error: The 'total length' of {} is smaller than the header itself.",
                total_len
            ),
        }
    }
}

impl std::error::Error for HeaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeaderError::Len(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LenError> for HeaderError {
    fn from(err: LenError) -> HeaderError {
        HeaderError::Len(err)
    }
}
