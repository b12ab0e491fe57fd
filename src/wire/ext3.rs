use crate::coding::sdvl_encode_forced;
use crate::wire::ReadCursor;

/// Parsed Extension 3: the overflow fields a UOR-2 base header could
/// not fit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Ext3 {
    /// 8 additional sequence number LSBs (below the base header bits).
    pub sn8: Option<u8>,
    /// Timestamp LSBs: value, number of bits (from the SDVL form) and
    /// whether the value is in the scaled domain.
    pub ts: Option<(u32, u8, bool)>,
    /// Full 16 bit IP-ID offset of the innermost sequential IPv4
    /// header.
    pub ip_id_offset: Option<u16>,
}

const EXT3_TAG: u8 = 0b1100_0000;
const EXT3_FLAG_SN: u8 = 0b0010_0000;
const EXT3_FLAG_TS: u8 = 0b0001_0000;
const EXT3_FLAG_TSC: u8 = 0b0000_1000;
const EXT3_FLAG_IP_ID: u8 = 0b0000_0100;

impl Ext3 {
    pub(crate) fn is_empty(&self) -> bool {
        self.sn8.is_none() && self.ts.is_none() && self.ip_id_offset.is_none()
    }

    /// Appends the extension. The timestamp SDVL form is the smallest
    /// one holding the required number of bits, so the parser can
    /// recover the bit count from the form length alone.
    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        let mut flags = EXT3_TAG;
        if self.sn8.is_some() {
            flags |= EXT3_FLAG_SN;
        }
        if let Some((_, _, scaled)) = self.ts {
            flags |= EXT3_FLAG_TS;
            if scaled {
                flags |= EXT3_FLAG_TSC;
            }
        }
        if self.ip_id_offset.is_some() {
            flags |= EXT3_FLAG_IP_ID;
        }
        out.push(flags);
        if let Some(sn8) = self.sn8 {
            out.push(sn8);
        }
        if let Some((value, bits, _)) = self.ts {
            let bytes = match bits {
                0..=7 => 1,
                8..=14 => 2,
                15..=21 => 3,
                _ => 4,
            };
            if let Some(encoded) = sdvl_encode_forced(value, bytes) {
                out.extend_from_slice(&encoded);
            }
        }
        if let Some(offset) = self.ip_id_offset {
            out.extend_from_slice(&offset.to_be_bytes());
        }
    }

    /// Parses an extension, rejecting reserved bit patterns.
    pub(crate) fn parse(cursor: &mut ReadCursor<'_>) -> Option<Ext3> {
        let flags = cursor.u8()?;
        if flags & 0b1100_0000 != EXT3_TAG || flags & 0b0000_0011 != 0 {
            return None;
        }
        if flags & EXT3_FLAG_TS == 0 && flags & EXT3_FLAG_TSC != 0 {
            return None;
        }
        let sn8 = if flags & EXT3_FLAG_SN != 0 {
            Some(cursor.u8()?)
        } else {
            None
        };
        let ts = if flags & EXT3_FLAG_TS != 0 {
            let (value, bits) = cursor.sdvl()?;
            Some((value, bits, flags & EXT3_FLAG_TSC != 0))
        } else {
            None
        };
        let ip_id_offset = if flags & EXT3_FLAG_IP_ID != 0 {
            Some(cursor.u16()?)
        } else {
            None
        };
        Some(Ext3 {
            sn8,
            ts,
            ip_id_offset,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_all_fields() {
        let ext = Ext3 {
            sn8: Some(0x42),
            ts: Some((0x1fff, 14, true)),
            ip_id_offset: Some(0x0102),
        };
        let mut bytes = Vec::new();
        ext.write(&mut bytes);
        let mut cursor = ReadCursor::new(&bytes);
        let parsed = Ext3::parse(&mut cursor).unwrap();
        assert_eq!(ext, parsed);
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn round_trip_single_fields() {
        for ext in [
            Ext3 {
                sn8: Some(7),
                ..Default::default()
            },
            Ext3 {
                ts: Some((100, 7, false)),
                ..Default::default()
            },
            Ext3 {
                ip_id_offset: Some(9),
                ..Default::default()
            },
        ] {
            let mut bytes = Vec::new();
            ext.write(&mut bytes);
            let parsed = Ext3::parse(&mut ReadCursor::new(&bytes)).unwrap();
            assert_eq!(ext, parsed);
        }
    }

    #[test]
    fn ts_bit_count_survives_via_form_length() {
        // 14 bits requested even though the value fits 7
        let ext = Ext3 {
            ts: Some((0x21, 14, false)),
            ..Default::default()
        };
        let mut bytes = Vec::new();
        ext.write(&mut bytes);
        let parsed = Ext3::parse(&mut ReadCursor::new(&bytes)).unwrap();
        assert_eq!(Some((0x21, 14, false)), parsed.ts);
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let mut bytes = Vec::new();
        Ext3 {
            sn8: Some(1),
            ..Default::default()
        }
        .write(&mut bytes);
        bytes[0] |= 0b0000_0001;
        assert!(Ext3::parse(&mut ReadCursor::new(&bytes)).is_none());
    }
}
