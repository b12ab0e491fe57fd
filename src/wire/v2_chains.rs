use crate::coding::ReorderRatio;
use crate::crc::Crc3;
use crate::wire::{ChainDynamics, ReadCursor};
use crate::{IpHeader, IpIdBehavior, UncompHeaders};

/// CRC-3 over the decoded control fields of a ROHCv2 context: the
/// reorder ratio, the full master sequence number and the IP-ID
/// behavior of each IPv4 header.
///
/// IPv6 headers are excluded (RFC 5225 erratum 2703); with
/// `compat_pre_erratum` they contribute a zero octet for peers
/// applying the original text.
pub fn control_crc3(
    reorder_ratio: ReorderRatio,
    msn: u16,
    behaviors: &[Option<IpIdBehavior>],
    compat_pre_erratum: bool,
) -> u8 {
    let mut crc = Crc3::new()
        .add_byte(reorder_ratio.to_bits())
        .add_slice(&msn.to_be_bytes());
    for behavior in behaviors {
        match behavior {
            Some(behavior) => {
                crc = crc.add_byte(behavior.to_bits());
            }
            None => {
                if compat_pre_erratum {
                    crc = crc.add_byte(0);
                }
            }
        }
    }
    crc.value()
}

/// Appends the ROHCv2 control block closing a dynamic chain: reorder
/// ratio, MSN, per-IPv4-header behavior octets and the control CRC-3.
pub(crate) fn write_v2_control(
    out: &mut Vec<u8>,
    headers: &UncompHeaders,
    dynamics: &ChainDynamics,
    compat_pre_erratum: bool,
) {
    out.push(dynamics.reorder_ratio.to_bits() << 6);
    let msn = dynamics.msn.unwrap_or(0);
    out.extend_from_slice(&msn.to_be_bytes());
    for (idx, header) in headers.ip.iter().enumerate() {
        if header.is_v4() {
            let behavior = dynamics
                .behaviors
                .get(idx)
                .copied()
                .flatten()
                .unwrap_or(IpIdBehavior::Sequential);
            out.push(behavior.to_bits());
        }
    }
    out.push(control_crc3(
        dynamics.reorder_ratio,
        msn,
        &dynamics.behaviors,
        compat_pre_erratum,
    ));
}

/// Parses and verifies a ROHCv2 control block. The parsed behaviors
/// and MSN land in `dynamics`. `None` on reserved bit violations or a
/// control CRC mismatch.
pub(crate) fn parse_v2_control(
    cursor: &mut ReadCursor<'_>,
    headers: &UncompHeaders,
    dynamics: &mut ChainDynamics,
    compat_pre_erratum: bool,
) -> Option<()> {
    let rr_octet = cursor.u8()?;
    if rr_octet & 0b0011_1111 != 0 {
        return None;
    }
    dynamics.reorder_ratio = ReorderRatio::from_bits(rr_octet >> 6);
    let msn = cursor.u16()?;
    dynamics.msn = Some(msn);
    // the base chain already pushed one (possibly placeholder) entry
    // per header; replace the IPv4 ones with the control values
    for (idx, header) in headers.ip.iter().enumerate() {
        if header.is_v4() {
            let behavior = IpIdBehavior::from_bits(cursor.u8()? & 0b11);
            if let Some(slot) = dynamics.behaviors.get_mut(idx) {
                *slot = Some(behavior);
            }
        }
    }
    let crc_octet = cursor.u8()?;
    if crc_octet & 0b1111_1000 != 0 {
        return None;
    }
    let expected = control_crc3(
        dynamics.reorder_ratio,
        msn,
        &dynamics.behaviors,
        compat_pre_erratum,
    );
    if expected != crc_octet {
        return None;
    }
    Some(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ip_number, Ipv4Header, Ipv6Header};
    use arrayvec::ArrayVec;

    fn v4_headers() -> UncompHeaders {
        let mut ip = ArrayVec::new();
        ip.push(IpHeader::V4(Ipv4Header {
            protocol: ip_number::UDP,
            ..Default::default()
        }));
        UncompHeaders {
            ip,
            transport: None,
            rtp: None,
            header_len: 20,
        }
    }

    #[test]
    fn crc_covers_all_inputs() {
        let base = control_crc3(
            ReorderRatio::Half,
            0x1234,
            &[Some(IpIdBehavior::SequentialSwapped)],
            false,
        );
        // changing any input changes the value
        assert_ne!(
            base,
            control_crc3(
                ReorderRatio::None,
                0x1234,
                &[Some(IpIdBehavior::SequentialSwapped)],
                false,
            )
        );
        assert_ne!(
            base,
            control_crc3(
                ReorderRatio::Half,
                0x1235,
                &[Some(IpIdBehavior::SequentialSwapped)],
                false,
            )
        );
        assert_ne!(
            base,
            control_crc3(ReorderRatio::Half, 0x1234, &[Some(IpIdBehavior::Zero)], false)
        );
    }

    #[test]
    fn ipv6_headers_are_excluded_by_default() {
        let with_v6 = control_crc3(
            ReorderRatio::None,
            7,
            &[Some(IpIdBehavior::Sequential), None],
            false,
        );
        let without_v6 = control_crc3(
            ReorderRatio::None,
            7,
            &[Some(IpIdBehavior::Sequential)],
            false,
        );
        assert_eq!(with_v6, without_v6);
        // the compatibility flag restores pre-erratum coverage
        let compat = control_crc3(
            ReorderRatio::None,
            7,
            &[Some(IpIdBehavior::Sequential), None],
            true,
        );
        assert_ne!(with_v6, compat);
    }

    #[test]
    fn control_block_round_trip() {
        let headers = v4_headers();
        let mut dynamics = ChainDynamics::default();
        dynamics.behaviors.push(Some(IpIdBehavior::Sequential));
        dynamics.msn = Some(0x0102);
        dynamics.reorder_ratio = ReorderRatio::Quarter;
        let mut out = Vec::new();
        write_v2_control(&mut out, &headers, &dynamics, false);

        let mut parsed = ChainDynamics::default();
        parsed.behaviors.push(Some(IpIdBehavior::Random)); // placeholder
        let mut cursor = ReadCursor::new(&out);
        parse_v2_control(&mut cursor, &headers, &mut parsed, false).unwrap();
        assert!(cursor.remaining().is_empty());
        assert_eq!(Some(0x0102), parsed.msn);
        assert_eq!(ReorderRatio::Quarter, parsed.reorder_ratio);
        assert_eq!(Some(IpIdBehavior::Sequential), parsed.behaviors[0]);
    }

    #[test]
    fn tampered_control_block_fails_crc() {
        let headers = v4_headers();
        let mut dynamics = ChainDynamics::default();
        dynamics.behaviors.push(Some(IpIdBehavior::Sequential));
        dynamics.msn = Some(0x0102);
        let mut out = Vec::new();
        write_v2_control(&mut out, &headers, &dynamics, false);
        out[2] ^= 0x01; // msn low byte
        let mut parsed = ChainDynamics::default();
        parsed.behaviors.push(None);
        let mut cursor = ReadCursor::new(&out);
        assert!(parse_v2_control(&mut cursor, &headers, &mut parsed, false).is_none());
    }

    #[test]
    fn mixed_chain_has_v6_placeholder() {
        let mut headers = v4_headers();
        headers.ip.push(IpHeader::V6(Ipv6Header::default()));
        let mut dynamics = ChainDynamics::default();
        dynamics.behaviors.push(Some(IpIdBehavior::Sequential));
        dynamics.behaviors.push(None);
        dynamics.msn = Some(1);
        let mut out = Vec::new();
        write_v2_control(&mut out, &headers, &dynamics, false);
        // rr + msn(2) + one behavior octet + crc
        assert_eq!(5, out.len());
    }
}
