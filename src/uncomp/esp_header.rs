use crate::err::{HeaderError, Layer, LenError};

/// Leading fields of an ESP header (RFC 4303). Everything behind the
/// sequence number is encrypted payload from the compressor's point of
/// view.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct EspHeader {
    /// Security Parameters Index.
    pub spi: u32,
    pub sequence_number: u32,
}

impl EspHeader {
    /// Serialized size of the cleartext ESP fields in bytes.
    pub const LEN: usize = 8;

    /// Reads the cleartext ESP fields from the start of the slice.
    pub fn from_slice(slice: &[u8]) -> Result<(EspHeader, &[u8]), HeaderError> {
        if slice.len() < EspHeader::LEN {
            return Err(LenError {
                required_len: EspHeader::LEN,
                len: slice.len(),
                layer: Layer::EspHeader,
            }
            .into());
        }
        Ok((
            EspHeader {
                spi: u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]),
                sequence_number: u32::from_be_bytes([slice[4], slice[5], slice[6], slice[7]]),
            },
            &slice[EspHeader::LEN..],
        ))
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let spi = self.spi.to_be_bytes();
        let sn = self.sequence_number.to_be_bytes();
        [spi[0], spi[1], spi[2], spi[3], sn[0], sn[1], sn[2], sn[3]]
    }
}
