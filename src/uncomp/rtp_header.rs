use crate::err::{HeaderError, Layer, LenError};
use arrayvec::ArrayVec;

/// RTP fixed header according to RFC 3550.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RtpHeader {
    /// Version field; 2 for every packet the RTP profile accepts.
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub marker: bool,
    /// Payload type (7 bits).
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    /// Contributing sources. The RTP profile only accepts packets with
    /// an empty list (CSRC list compression is not implemented).
    pub csrc: ArrayVec<u32, 15>,
}

impl Default for RtpHeader {
    fn default() -> RtpHeader {
        RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            marker: false,
            payload_type: 0,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
            csrc: ArrayVec::new(),
        }
    }
}

impl RtpHeader {
    /// Serialized size of the fixed header without CSRC entries.
    pub const BASE_LEN: usize = 12;

    /// Reads an RTP header from the start of the slice.
    pub fn from_slice(slice: &[u8]) -> Result<(RtpHeader, &[u8]), HeaderError> {
        if slice.len() < RtpHeader::BASE_LEN {
            return Err(LenError {
                required_len: RtpHeader::BASE_LEN,
                len: slice.len(),
                layer: Layer::RtpHeader,
            }
            .into());
        }
        let csrc_count = usize::from(slice[0] & 0xf);
        let header_len = RtpHeader::BASE_LEN + csrc_count * 4;
        if slice.len() < header_len {
            return Err(LenError {
                required_len: header_len,
                len: slice.len(),
                layer: Layer::RtpHeader,
            }
            .into());
        }
        let mut csrc = ArrayVec::new();
        for i in 0..csrc_count {
            let at = RtpHeader::BASE_LEN + i * 4;
            csrc.push(u32::from_be_bytes([
                slice[at],
                slice[at + 1],
                slice[at + 2],
                slice[at + 3],
            ]));
        }
        Ok((
            RtpHeader {
                version: slice[0] >> 6,
                padding: slice[0] & 0x20 != 0,
                extension: slice[0] & 0x10 != 0,
                marker: slice[1] & 0x80 != 0,
                payload_type: slice[1] & 0x7f,
                sequence_number: u16::from_be_bytes([slice[2], slice[3]]),
                timestamp: u32::from_be_bytes([slice[4], slice[5], slice[6], slice[7]]),
                ssrc: u32::from_be_bytes([slice[8], slice[9], slice[10], slice[11]]),
                csrc,
            },
            &slice[header_len..],
        ))
    }

    /// Length of the header including CSRC entries.
    #[inline]
    pub fn header_len(&self) -> usize {
        RtpHeader::BASE_LEN + self.csrc.len() * 4
    }

    /// True if the header has the shape the RTP profile can compress.
    #[inline]
    pub fn is_compressible(&self) -> bool {
        self.version == 2 && !self.padding && !self.extension && self.csrc.is_empty()
    }

    /// Serializes the fixed header (CSRC entries excluded; compressed
    /// flows never carry any).
    pub fn to_bytes(&self) -> [u8; 12] {
        let sn = self.sequence_number.to_be_bytes();
        let ts = self.timestamp.to_be_bytes();
        let ssrc = self.ssrc.to_be_bytes();
        [
            (self.version << 6)
                | if self.padding { 0x20 } else { 0 }
                | if self.extension { 0x10 } else { 0 }
                | self.csrc.len() as u8,
            if self.marker { 0x80 } else { 0 } | self.payload_type,
            sn[0],
            sn[1],
            ts[0],
            ts[1],
            ts[2],
            ts[3],
            ssrc[0],
            ssrc[1],
            ssrc[2],
            ssrc[3],
        ]
    }
}
