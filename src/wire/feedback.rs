use crate::coding::{sdvl_decode, sdvl_encode};
use crate::crc::Crc8;
use crate::err::FeedbackError;
use crate::{CidType, RohcMode, ADD_CID_BASE};

/// Acknowledgement class of a FEEDBACK-2 element.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AckType {
    /// Context is up to date.
    Ack,
    /// Dynamic context damage.
    Nack,
    /// Static context damage.
    StaticNack,
}

impl AckType {
    fn to_bits(self) -> u8 {
        match self {
            AckType::Ack => 0,
            AckType::Nack => 1,
            AckType::StaticNack => 2,
        }
    }

    fn from_bits(bits: u8) -> Option<AckType> {
        match bits & 0b11 {
            0 => Some(AckType::Ack),
            1 => Some(AckType::Nack),
            2 => Some(AckType::StaticNack),
            _ => None,
        }
    }
}

/// FEEDBACK-2 option types.
mod option_type {
    pub const CRC: u8 = 1;
    pub const REJECT: u8 = 2;
    pub const SN_NOT_VALID: u8 = 3;
    pub const SN: u8 = 4;
    pub const CLOCK: u8 = 5;
    pub const JITTER: u8 = 6;
    pub const LOSS: u8 = 7;
}

/// One parsed feedback element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedFeedback {
    /// Context the feedback refers to.
    pub cid: u16,
    pub kind: FeedbackKind,
}

/// Payload of a feedback element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FeedbackKind {
    /// FEEDBACK-1: an acknowledgement carrying sequence number LSBs.
    Ack1 {
        /// 8 least significant bits of the acknowledged sequence
        /// number.
        sn_lsb: u8,
    },
    /// FEEDBACK-2 with options.
    Feedback2 {
        ack_type: AckType,
        /// Mode the decompressor wants the compressor to operate in.
        mode: RohcMode,
        /// Sequence number, extended by SN options.
        sn: u32,
        /// Number of valid bits in `sn` (12 plus 8 per SN option).
        sn_bits: u8,
        /// False if an SN-NOT-VALID option was present.
        sn_valid: bool,
        /// True if a REJECT option was present.
        rejected: bool,
    },
}

/// Splits a transport buffer into feedback elements. Buffers starting
/// with the `11110` feedback discriminator may hold several
/// size-prefixed elements; anything else is one raw element.
pub(crate) fn split_feedback_stream(data: &[u8]) -> Result<Vec<&[u8]>, FeedbackError> {
    let mut elements = Vec::new();
    if data.is_empty() {
        return Ok(elements);
    }
    if data[0] & 0xf8 != 0xf0 {
        elements.push(data);
        return Ok(elements);
    }
    let mut rest = data;
    while !rest.is_empty() {
        if rest[0] & 0xf8 != 0xf0 {
            return Err(FeedbackError::Malformed);
        }
        let code = usize::from(rest[0] & 0x07);
        let (size, start) = if code != 0 {
            (code, 1)
        } else {
            let size = *rest.get(1).ok_or(FeedbackError::Malformed)?;
            (usize::from(size), 2)
        };
        if rest.len() < start + size || size == 0 {
            return Err(FeedbackError::Malformed);
        }
        elements.push(&rest[start..start + size]);
        rest = &rest[start + size..];
    }
    Ok(elements)
}

/// Parses one feedback element (CID prefix included).
pub(crate) fn parse_feedback_element(
    cid_type: CidType,
    element: &[u8],
) -> Result<ParsedFeedback, FeedbackError> {
    let (cid, payload_start) = match cid_type {
        CidType::Small => match element.first() {
            Some(first) if first & 0xf0 == ADD_CID_BASE && element.len() > 1 => {
                (u16::from(first & 0x0f), 1)
            }
            Some(_) => (0, 0),
            None => return Err(FeedbackError::Malformed),
        },
        CidType::Large => {
            let (cid, used) = sdvl_decode(element).ok_or(FeedbackError::Malformed)?;
            if cid > u32::from(CidType::Large.max_cid()) {
                return Err(FeedbackError::Malformed);
            }
            (cid as u16, used)
        }
    };
    let payload = &element[payload_start..];
    match payload.len() {
        0 => Err(FeedbackError::Malformed),
        1 => Ok(ParsedFeedback {
            cid,
            kind: FeedbackKind::Ack1 { sn_lsb: payload[0] },
        }),
        _ => parse_feedback2(cid, element, payload_start),
    }
}

fn parse_feedback2(
    cid: u16,
    element: &[u8],
    payload_start: usize,
) -> Result<ParsedFeedback, FeedbackError> {
    let payload = &element[payload_start..];
    let ack_type =
        AckType::from_bits(payload[0] >> 6).ok_or(FeedbackError::Malformed)?;
    let mode = RohcMode::from_bits((payload[0] >> 4) & 0b11)
        .ok_or(FeedbackError::Malformed)?;
    let mut sn = (u32::from(payload[0] & 0x0f) << 8) | u32::from(payload[1]);
    let mut sn_bits = 12u8;
    let mut sn_valid = true;
    let mut rejected = false;
    let mut crc_opt: Option<(usize, u8)> = None;

    let mut at = 2usize;
    while at < payload.len() {
        let opt = payload[at];
        let opt_type = opt >> 4;
        let opt_len = usize::from(opt & 0x0f);
        at += 1;
        if payload.len() < at + opt_len {
            return Err(FeedbackError::Malformed);
        }
        match opt_type {
            option_type::CRC => {
                if opt_len != 1 {
                    return Err(FeedbackError::Malformed);
                }
                crc_opt = Some((payload_start + at, payload[at]));
            }
            option_type::SN => {
                if opt_len != 1 {
                    return Err(FeedbackError::Malformed);
                }
                sn = (sn << 8) | u32::from(payload[at]);
                sn_bits = sn_bits.saturating_add(8);
            }
            option_type::SN_NOT_VALID => {
                sn_valid = false;
            }
            option_type::REJECT => {
                rejected = true;
            }
            option_type::CLOCK | option_type::JITTER | option_type::LOSS => {}
            _ => return Err(FeedbackError::Malformed),
        }
        at += opt_len;
    }

    if let Some((crc_at, received)) = crc_opt {
        let mut crc = Crc8::new();
        crc = crc.add_slice(&element[..crc_at]);
        crc = crc.add_slice(&[0]);
        let crc = crc.add_slice(&element[crc_at + 1..]).value();
        if crc != received {
            return Err(FeedbackError::BadCrc);
        }
    }

    Ok(ParsedFeedback {
        cid,
        kind: FeedbackKind::Feedback2 {
            ack_type,
            mode,
            sn,
            sn_bits,
            sn_valid,
            rejected,
        },
    })
}

fn push_cid(cid_type: CidType, cid: u16, out: &mut Vec<u8>) {
    match cid_type {
        CidType::Small => {
            if cid != 0 {
                out.push(ADD_CID_BASE | (cid as u8 & 0x0f));
            }
        }
        CidType::Large => {
            if let Some(encoded) = sdvl_encode(u32::from(cid)) {
                out.extend_from_slice(&encoded);
            }
        }
    }
}

/// Builds a FEEDBACK-1 element.
pub(crate) fn build_feedback1(cid_type: CidType, cid: u16, sn_lsb: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    push_cid(cid_type, cid, &mut out);
    out.push(sn_lsb);
    out
}

/// Builds a FEEDBACK-2 element carrying 20 bits of sequence number
/// (12 in the base element, 8 in an SN option) and optionally a CRC
/// option.
pub(crate) fn build_feedback2(
    cid_type: CidType,
    cid: u16,
    ack_type: AckType,
    mode: RohcMode,
    sn: u32,
    with_crc: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    push_cid(cid_type, cid, &mut out);
    out.push((ack_type.to_bits() << 6) | (mode.to_bits() << 4) | ((sn >> 16) as u8 & 0x0f));
    out.push((sn >> 8) as u8);
    out.push((option_type::SN << 4) | 1);
    out.push(sn as u8);
    if with_crc {
        out.push((option_type::CRC << 4) | 1);
        out.push(0);
        let crc = Crc8::new().add_slice(&out).value();
        let last = out.len() - 1;
        out[last] = crc;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn feedback1_round_trip() {
        let element = build_feedback1(CidType::Small, 3, 0x42);
        let parsed = parse_feedback_element(CidType::Small, &element).unwrap();
        assert_eq!(3, parsed.cid);
        assert_eq!(FeedbackKind::Ack1 { sn_lsb: 0x42 }, parsed.kind);
    }

    #[test]
    fn feedback2_round_trip() {
        for with_crc in [false, true] {
            let element = build_feedback2(
                CidType::Small,
                0,
                AckType::Nack,
                RohcMode::BidirectionalOptimistic,
                0x1230,
                with_crc,
            );
            let parsed = parse_feedback_element(CidType::Small, &element).unwrap();
            assert_eq!(0, parsed.cid);
            assert_eq!(
                FeedbackKind::Feedback2 {
                    ack_type: AckType::Nack,
                    mode: RohcMode::BidirectionalOptimistic,
                    sn: 0x1230,
                    sn_bits: 20,
                    sn_valid: true,
                    rejected: false,
                },
                parsed.kind
            );
        }
    }

    #[test]
    fn feedback2_large_cid_round_trip() {
        let element = build_feedback2(
            CidType::Large,
            300,
            AckType::Ack,
            RohcMode::BidirectionalReliable,
            77,
            true,
        );
        let parsed = parse_feedback_element(CidType::Large, &element).unwrap();
        assert_eq!(300, parsed.cid);
        match parsed.kind {
            FeedbackKind::Feedback2 { ack_type, sn, .. } => {
                assert_eq!(AckType::Ack, ack_type);
                assert_eq!(77, sn);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn tampered_crc_is_rejected() {
        let mut element = build_feedback2(
            CidType::Small,
            1,
            AckType::Ack,
            RohcMode::Unidirectional,
            5,
            true,
        );
        element[1] ^= 0x01; // flip a sequence number bit
        assert_eq!(
            Err(FeedbackError::BadCrc),
            parse_feedback_element(CidType::Small, &element)
        );
    }

    #[test]
    fn piggyback_stream_splits() {
        let one = build_feedback1(CidType::Small, 0, 9);
        let two = build_feedback2(
            CidType::Small,
            2,
            AckType::Ack,
            RohcMode::BidirectionalOptimistic,
            1,
            false,
        );
        let mut stream = Vec::new();
        stream.push(0xf0 | one.len() as u8);
        stream.extend_from_slice(&one);
        stream.push(0xf0); // explicit size octet form
        stream.push(two.len() as u8);
        stream.extend_from_slice(&two);
        let elements = split_feedback_stream(&stream).unwrap();
        assert_eq!(2, elements.len());
        assert_eq!(&one[..], elements[0]);
        assert_eq!(&two[..], elements[1]);
    }

    #[test]
    fn raw_element_passes_through() {
        let raw = build_feedback1(CidType::Small, 4, 1);
        let elements = split_feedback_stream(&raw).unwrap();
        assert_eq!(1, elements.len());
        assert_eq!(&raw[..], elements[0]);
    }

    #[test]
    fn truncated_stream_is_malformed() {
        assert_eq!(
            Err(FeedbackError::Malformed),
            split_feedback_stream(&[0xf3, 1, 2])
        );
    }
}
