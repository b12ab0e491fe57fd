use crate::err::Layer;

/// Error when not enough data is available to decode an element (e.g. a
/// slice too small to contain the header that its first bytes announce).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LenError {
    /// Minimum length that would have been required.
    pub required_len: usize,

    /// Actually available length.
    pub len: usize,

    /// Layer in which the length error was encountered.
    pub layer: Layer,
}

impl core::fmt::Display for LenError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: Not enough data to decode '{}'. {} byte(s) would be required, but only {} byte(s) are available.",
            self.layer.error_title(),
            self.layer,
            self.required_len,
            self.len
        )
    }
}

impl std::error::Error for LenError {
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
            "UDP Header Error: Not enough data to decode 'UDP header'. 8 byte(s) would be required, but only 5 byte(s) are available.",
            format!(
                "{}",
                LenError {
                    required_len: 8,
                    len: 5,
                    layer: Layer::UdpHeader,
                }
            )
        );
    }

    #[test]
    fn clone_eq() {
        let err = LenError {
            required_len: 2,
            len: 1,
            layer: Layer::Ipv4Header,
        };
        assert_eq!(err, err.clone());
    }

    #[test]
    fn source() {
        use std::error::Error;
        assert!(LenError {
            required_len: 2,
            len: 1,
            layer: Layer::Ipv4Header,
        }
        .source()
        .is_none());
    }
}
