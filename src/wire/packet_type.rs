/// Packet kind detected from the first post-CID octet.
///
/// The discriminators form a prefix code: no kind's discriminator is a
/// prefix of another's, so one octet of lookahead is always enough.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketKind {
    /// `0` — UO-0 (ROHCv1) / pt_0_crc3 (ROHCv2).
    Pt0,
    /// `10` — UO-1 family / pt_1 family.
    Pt1,
    /// `110` — UOR-2 family / pt_2 family.
    Pt2,
    /// `1110` — accepted as a CO-COMMON alias on ROHCv2 contexts,
    /// never emitted.
    CoCommonAlias,
    /// `11111010` — CO-COMMON (ROHCv2).
    CoCommon,
    /// `11111011` — CO-REPAIR (ROHCv2).
    CoRepair,
    /// `11111101` — IR.
    Ir,
    /// `11111100` — IR-DYN.
    IrDyn,
    /// `1111111x` — ROHC segment (not supported).
    Segment,
}

/// Packet type octets for emission.
pub(crate) mod type_octet {
    pub const IR: u8 = 0b1111_1101;
    pub const IR_DYN: u8 = 0b1111_1100;
    pub const CO_COMMON: u8 = 0b1111_1010;
    pub const CO_REPAIR: u8 = 0b1111_1011;
}

/// Detects the packet kind from the first post-CID octet. `None` for
/// the reserved discriminator space.
pub fn detect_packet_kind(first: u8) -> Option<PacketKind> {
    match first {
        type_octet::IR => return Some(PacketKind::Ir),
        type_octet::IR_DYN => return Some(PacketKind::IrDyn),
        type_octet::CO_REPAIR => return Some(PacketKind::CoRepair),
        type_octet::CO_COMMON => return Some(PacketKind::CoCommon),
        0xfe | 0xff => return Some(PacketKind::Segment),
        _ => {}
    }
    if first & 0b1000_0000 == 0 {
        Some(PacketKind::Pt0)
    } else if first & 0b0100_0000 == 0 {
        Some(PacketKind::Pt1)
    } else if first & 0b0010_0000 == 0 {
        Some(PacketKind::Pt2)
    } else if first & 0b0001_0000 == 0 {
        Some(PacketKind::CoCommonAlias)
    } else {
        // 0xf0..=0xf9: feedback & reserved space
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exact_discriminators() {
        assert_eq!(Some(PacketKind::Ir), detect_packet_kind(0xfd));
        assert_eq!(Some(PacketKind::IrDyn), detect_packet_kind(0xfc));
        assert_eq!(Some(PacketKind::CoRepair), detect_packet_kind(0xfb));
        assert_eq!(Some(PacketKind::CoCommon), detect_packet_kind(0xfa));
        assert_eq!(Some(PacketKind::Segment), detect_packet_kind(0xfe));
        assert_eq!(Some(PacketKind::Segment), detect_packet_kind(0xff));
    }

    #[test]
    fn prefix_ranges() {
        for byte in 0x00..=0x7f {
            assert_eq!(Some(PacketKind::Pt0), detect_packet_kind(byte));
        }
        for byte in 0x80..=0xbf {
            assert_eq!(Some(PacketKind::Pt1), detect_packet_kind(byte));
        }
        for byte in 0xc0..=0xdf {
            assert_eq!(Some(PacketKind::Pt2), detect_packet_kind(byte));
        }
        for byte in 0xe0..=0xef {
            assert_eq!(Some(PacketKind::CoCommonAlias), detect_packet_kind(byte));
        }
    }

    #[test]
    fn reserved_space_is_unknown() {
        for byte in 0xf0..=0xf9 {
            assert_eq!(None, detect_packet_kind(byte));
        }
    }

    #[test]
    fn every_octet_has_exactly_one_interpretation() {
        // exhaustive: the match arms cover 0..=255 without overlap
        for byte in 0u16..=255 {
            let _ = detect_packet_kind(byte as u8);
        }
    }
}
