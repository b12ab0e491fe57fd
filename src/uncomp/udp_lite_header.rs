use crate::err::{HeaderError, Layer, LenError};

/// UDP-Lite header according to RFC 3828.
///
/// Wire-compatible with UDP except that the length field is replaced
/// by the checksum coverage.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct UdpLiteHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Number of leading bytes covered by the checksum; zero means the
    /// whole packet.
    pub checksum_coverage: u16,
    /// Mandatory in UDP-Lite (never zero on valid packets).
    pub checksum: u16,
}

impl UdpLiteHeader {
    /// Serialized size of an UDP-Lite header in bytes.
    pub const LEN: usize = 8;

    /// Reads an UDP-Lite header from the start of the slice.
    pub fn from_slice(slice: &[u8]) -> Result<(UdpLiteHeader, &[u8]), HeaderError> {
        if slice.len() < UdpLiteHeader::LEN {
            return Err(LenError {
                required_len: UdpLiteHeader::LEN,
                len: slice.len(),
                layer: Layer::UdpLiteHeader,
            }
            .into());
        }
        Ok((
            UdpLiteHeader {
                source_port: u16::from_be_bytes([slice[0], slice[1]]),
                destination_port: u16::from_be_bytes([slice[2], slice[3]]),
                checksum_coverage: u16::from_be_bytes([slice[4], slice[5]]),
                checksum: u16::from_be_bytes([slice[6], slice[7]]),
            },
            &slice[UdpLiteHeader::LEN..],
        ))
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let sp = self.source_port.to_be_bytes();
        let dp = self.destination_port.to_be_bytes();
        let cov = self.checksum_coverage.to_be_bytes();
        let checksum = self.checksum.to_be_bytes();
        [sp[0], sp[1], dp[0], dp[1], cov[0], cov[1], checksum[0], checksum[1]]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let header = UdpLiteHeader {
            source_port: 9000,
            destination_port: 9001,
            checksum_coverage: 8,
            checksum: 0x1122,
        };
        let bytes = header.to_bytes();
        let (decoded, rest) = UdpLiteHeader::from_slice(&bytes).unwrap();
        assert_eq!(header, decoded);
        assert_eq!(0, rest.len());
    }
}
