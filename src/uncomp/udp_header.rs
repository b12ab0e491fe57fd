use crate::err::{HeaderError, Layer, LenError};

/// UDP header according to RFC 768.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Length of the packet including the 8 byte UDP header.
    pub length: u16,
    /// Zero when the sender did not compute a checksum.
    pub checksum: u16,
}

impl UdpHeader {
    /// Serialized size of an UDP header in bytes.
    pub const LEN: usize = 8;

    /// Reads an UDP header from the start of the slice.
    pub fn from_slice(slice: &[u8]) -> Result<(UdpHeader, &[u8]), HeaderError> {
        if slice.len() < UdpHeader::LEN {
            return Err(LenError {
                required_len: UdpHeader::LEN,
                len: slice.len(),
                layer: Layer::UdpHeader,
            }
            .into());
        }
        Ok((
            UdpHeader {
                source_port: u16::from_be_bytes([slice[0], slice[1]]),
                destination_port: u16::from_be_bytes([slice[2], slice[3]]),
                length: u16::from_be_bytes([slice[4], slice[5]]),
                checksum: u16::from_be_bytes([slice[6], slice[7]]),
            },
            &slice[UdpHeader::LEN..],
        ))
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let sp = self.source_port.to_be_bytes();
        let dp = self.destination_port.to_be_bytes();
        let len = self.length.to_be_bytes();
        let checksum = self.checksum.to_be_bytes();
        [sp[0], sp[1], dp[0], dp[1], len[0], len[1], checksum[0], checksum[1]]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let header = UdpHeader {
            source_port: 5004,
            destination_port: 5004,
            length: 172,
            checksum: 0xbeef,
        };
        let bytes = header.to_bytes();
        let (decoded, rest) = UdpHeader::from_slice(&bytes).unwrap();
        assert_eq!(header, decoded);
        assert_eq!(0, rest.len());
    }

    #[test]
    fn rejects_short_slice() {
        let bytes = [0u8; 8];
        for len in 0..8 {
            assert_eq!(
                UdpHeader::from_slice(&bytes[..len]),
                Err(HeaderError::Len(LenError {
                    required_len: 8,
                    len,
                    layer: Layer::UdpHeader,
                }))
            );
        }
    }
}
