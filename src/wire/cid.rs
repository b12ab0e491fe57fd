use crate::coding::{sdvl_decode, sdvl_encode};
use crate::err::DecompressError;

/// Add-CID octet pattern (`1110 cccc`); with all CID bits zero it is a
/// padding octet.
pub const ADD_CID_BASE: u8 = 0xe0;

/// Size of the context id space used by an engine pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CidType {
    /// CIDs 0..=15, carried in an Add-CID octet (CID 0 implicit).
    Small,
    /// CIDs 0..=16383, carried self-describing after the type octet.
    Large,
}

impl CidType {
    /// Highest usable context id.
    pub fn max_cid(self) -> u16 {
        match self {
            CidType::Small => 15,
            CidType::Large => 16383,
        }
    }

    /// Number of context ids.
    pub fn cid_space(self) -> usize {
        usize::from(self.max_cid()) + 1
    }
}

/// Inserts the CID encoding into a packet whose first byte is the
/// packet type octet: an Add-CID octet in front (small CIDs > 0), or
/// the self-describing CID behind the type octet (large CIDs).
pub(crate) fn insert_cid(cid_type: CidType, cid: u16, packet: &mut Vec<u8>) {
    match cid_type {
        CidType::Small => {
            if cid != 0 {
                packet.insert(0, ADD_CID_BASE | (cid as u8 & 0xf));
            }
        }
        CidType::Large => {
            let encoded = sdvl_encode(u32::from(cid)).expect("cid fits 14 bits");
            for (i, byte) in encoded.iter().enumerate() {
                packet.insert(1 + i, *byte);
            }
        }
    }
}

/// Number of bytes [`insert_cid`] adds.
pub(crate) fn cid_overhead(cid_type: CidType, cid: u16) -> usize {
    match cid_type {
        CidType::Small => usize::from(cid != 0),
        CidType::Large => {
            if cid < (1 << 7) {
                1
            } else {
                2
            }
        }
    }
}

/// Strips padding and the CID encoding from an incoming packet,
/// returning the context id, the packet type octet and everything
/// behind type octet and CID.
pub(crate) fn split_cid(
    cid_type: CidType,
    data: &[u8],
) -> Result<(u16, u8, &[u8]), DecompressError> {
    // leading padding octets
    let mut data = data;
    while data.first() == Some(&ADD_CID_BASE) {
        data = &data[1..];
    }
    match cid_type {
        CidType::Small => {
            let first = *data.first().ok_or(DecompressError::Malformed)?;
            if first & 0xf0 == ADD_CID_BASE {
                let type_octet = *data.get(1).ok_or(DecompressError::Malformed)?;
                Ok((u16::from(first & 0xf), type_octet, &data[2..]))
            } else {
                Ok((0, first, &data[1..]))
            }
        }
        CidType::Large => {
            let type_octet = *data.first().ok_or(DecompressError::Malformed)?;
            let (cid, used) =
                sdvl_decode(&data[1..]).ok_or(DecompressError::Malformed)?;
            if cid > u32::from(CidType::Large.max_cid()) {
                return Err(DecompressError::Malformed);
            }
            Ok((cid as u16, type_octet, &data[1 + used..]))
        }
    }
}
