use crate::coding::{sdvl_encode, ReorderRatio};
use crate::wire::{parse_v2_control, write_v2_control, ReadCursor};
use crate::{
    ip_number, EspHeader, IpHeader, IpIdBehavior, Ipv4Header, Ipv6Header, ProfileId, RtpHeader,
    TransportHeader, UdpHeader, UdpLiteHeader, UncompHeaders,
};
use arrayvec::ArrayVec;

/// Everything a dynamic chain carries beyond the header fields
/// themselves: the announced IP-ID behaviors, the master sequence
/// number of generated-MSN profiles, the RTP timestamp stride and the
/// ROHCv2 reorder ratio.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChainDynamics {
    /// One entry per IP header; `None` for IPv6.
    pub behaviors: ArrayVec<Option<IpIdBehavior>, 2>,
    pub msn: Option<u16>,
    pub ts_stride: Option<u32>,
    pub reorder_ratio: ReorderRatio,
}

const IP_TAG_V4: u8 = 0x40;
const IP_TAG_V6: u8 = 0x60;

const DYN_FLAG_NBO: u8 = 0b0001_0000;
const DYN_FLAG_RND: u8 = 0b0000_1000;
const DYN_FLAG_DF: u8 = 0b0000_0100;
const DYN_FLAG_SID: u8 = 0b0000_0010;

/// Appends the static chain of `profile` for the given headers.
pub(crate) fn write_static_chain(out: &mut Vec<u8>, profile: ProfileId, headers: &UncompHeaders) {
    if profile == ProfileId::UNCOMPRESSED {
        return;
    }
    for header in &headers.ip {
        match header {
            IpHeader::V4(v4) => {
                out.push(IP_TAG_V4);
                out.push(v4.protocol);
                out.extend_from_slice(&v4.source);
                out.extend_from_slice(&v4.destination);
            }
            IpHeader::V6(v6) => {
                out.push(IP_TAG_V6);
                out.push(v6.next_header);
                out.push((v6.flow_label >> 16) as u8 & 0x0f);
                out.push((v6.flow_label >> 8) as u8);
                out.push(v6.flow_label as u8);
                out.extend_from_slice(&v6.source);
                out.extend_from_slice(&v6.destination);
            }
        }
    }
    match &headers.transport {
        Some(TransportHeader::Udp(udp)) => {
            out.extend_from_slice(&udp.source_port.to_be_bytes());
            out.extend_from_slice(&udp.destination_port.to_be_bytes());
        }
        Some(TransportHeader::UdpLite(udp_lite)) => {
            out.extend_from_slice(&udp_lite.source_port.to_be_bytes());
            out.extend_from_slice(&udp_lite.destination_port.to_be_bytes());
        }
        Some(TransportHeader::Esp(esp)) => {
            out.extend_from_slice(&esp.spi.to_be_bytes());
        }
        None => {}
    }
    if let Some(rtp) = &headers.rtp {
        out.extend_from_slice(&rtp.ssrc.to_be_bytes());
    }
}

/// Parses the static chain of `profile` into a header skeleton with
/// all dynamic fields zeroed.
pub(crate) fn parse_static_chain(
    cursor: &mut ReadCursor<'_>,
    profile: ProfileId,
) -> Option<UncompHeaders> {
    let mut ip: ArrayVec<IpHeader, 2> = ArrayVec::new();
    if profile != ProfileId::UNCOMPRESSED {
        loop {
            let tag = cursor.u8()?;
            let header = match tag {
                IP_TAG_V4 => {
                    let protocol = cursor.u8()?;
                    let mut v4 = Ipv4Header {
                        protocol,
                        ..Default::default()
                    };
                    v4.source.copy_from_slice(cursor.take(4)?);
                    v4.destination.copy_from_slice(cursor.take(4)?);
                    IpHeader::V4(v4)
                }
                IP_TAG_V6 => {
                    let next_header = cursor.u8()?;
                    let flow_label = (u32::from(cursor.u8()? & 0x0f) << 16)
                        | (u32::from(cursor.u8()?) << 8)
                        | u32::from(cursor.u8()?);
                    let mut v6 = Ipv6Header {
                        next_header,
                        flow_label,
                        ..Default::default()
                    };
                    v6.source.copy_from_slice(cursor.take(16)?);
                    v6.destination.copy_from_slice(cursor.take(16)?);
                    IpHeader::V6(v6)
                }
                _ => return None,
            };
            let tunneled = matches!(header.next_protocol(), ip_number::IPIP | ip_number::IPV6);
            ip.push(header);
            if !tunneled || ip.is_full() {
                break;
            }
        }
    }

    let transport = if profile == ProfileId::UDP
        || profile == ProfileId::UDP_V2
        || profile == ProfileId::RTP
    {
        Some(TransportHeader::Udp(UdpHeader {
            source_port: cursor.u16()?,
            destination_port: cursor.u16()?,
            ..Default::default()
        }))
    } else if profile == ProfileId::UDP_LITE {
        Some(TransportHeader::UdpLite(UdpLiteHeader {
            source_port: cursor.u16()?,
            destination_port: cursor.u16()?,
            ..Default::default()
        }))
    } else if profile == ProfileId::ESP {
        Some(TransportHeader::Esp(EspHeader {
            spi: cursor.u32()?,
            ..Default::default()
        }))
    } else {
        None
    };

    let rtp = if profile == ProfileId::RTP {
        Some(RtpHeader {
            ssrc: cursor.u32()?,
            ..Default::default()
        })
    } else {
        None
    };

    Some(UncompHeaders {
        ip,
        transport,
        rtp,
        header_len: 0,
    })
}

/// Appends the dynamic chain of `profile`.
pub(crate) fn write_dynamic_chain(
    out: &mut Vec<u8>,
    profile: ProfileId,
    headers: &UncompHeaders,
    dynamics: &ChainDynamics,
    compat_pre_erratum: bool,
) {
    if profile == ProfileId::UNCOMPRESSED {
        return;
    }
    for (idx, header) in headers.ip.iter().enumerate() {
        match header {
            IpHeader::V4(v4) => {
                let behavior = dynamics
                    .behaviors
                    .get(idx)
                    .copied()
                    .flatten()
                    .unwrap_or(IpIdBehavior::Sequential);
                out.push((v4.dscp << 2) | v4.ecn);
                out.push(v4.time_to_live);
                out.extend_from_slice(&v4.identification.to_be_bytes());
                let mut flags = 0u8;
                if behavior != IpIdBehavior::SequentialSwapped {
                    flags |= DYN_FLAG_NBO;
                }
                if behavior == IpIdBehavior::Random {
                    flags |= DYN_FLAG_RND;
                }
                if behavior == IpIdBehavior::Zero {
                    flags |= DYN_FLAG_SID;
                }
                if v4.dont_fragment {
                    flags |= DYN_FLAG_DF;
                }
                out.push(flags);
            }
            IpHeader::V6(v6) => {
                out.push(v6.traffic_class);
                out.push(v6.hop_limit);
            }
        }
    }
    match &headers.transport {
        Some(TransportHeader::Udp(udp)) => {
            out.extend_from_slice(&udp.checksum.to_be_bytes());
        }
        Some(TransportHeader::UdpLite(udp_lite)) => {
            out.extend_from_slice(&udp_lite.checksum_coverage.to_be_bytes());
            out.extend_from_slice(&udp_lite.checksum.to_be_bytes());
        }
        Some(TransportHeader::Esp(esp)) => {
            out.extend_from_slice(&esp.sequence_number.to_be_bytes());
        }
        None => {}
    }
    if let Some(rtp) = &headers.rtp {
        let mut flags = 0u8;
        if rtp.marker {
            flags |= 0b0000_0100;
        }
        if dynamics.ts_stride.is_some() {
            flags |= 0b0000_0001;
        }
        out.push(flags);
        out.push(rtp.payload_type);
        out.extend_from_slice(&rtp.sequence_number.to_be_bytes());
        out.extend_from_slice(&rtp.timestamp.to_be_bytes());
        if let Some(stride) = dynamics.ts_stride {
            if let Some(encoded) = sdvl_encode(stride) {
                out.extend_from_slice(&encoded);
            }
        }
    }
    if profile.is_v2() {
        write_v2_control(out, headers, dynamics, compat_pre_erratum);
    } else if profile.generates_msn() {
        out.extend_from_slice(&dynamics.msn.unwrap_or(0).to_be_bytes());
    }
}

/// Parses the dynamic chain of `profile`, filling the dynamic fields
/// of the header skeleton. `None` on truncation, reserved-bit
/// violations or a ROHCv2 control CRC mismatch.
pub(crate) fn parse_dynamic_chain(
    cursor: &mut ReadCursor<'_>,
    profile: ProfileId,
    headers: &mut UncompHeaders,
    compat_pre_erratum: bool,
) -> Option<ChainDynamics> {
    let mut dynamics = ChainDynamics::default();
    if profile == ProfileId::UNCOMPRESSED {
        return Some(dynamics);
    }
    for header in headers.ip.iter_mut() {
        match header {
            IpHeader::V4(v4) => {
                let tos = cursor.u8()?;
                v4.dscp = tos >> 2;
                v4.ecn = tos & 0b11;
                v4.time_to_live = cursor.u8()?;
                v4.identification = cursor.u16()?;
                let flags = cursor.u8()?;
                if flags & !(DYN_FLAG_NBO | DYN_FLAG_RND | DYN_FLAG_DF | DYN_FLAG_SID) != 0 {
                    return None;
                }
                v4.dont_fragment = flags & DYN_FLAG_DF != 0;
                let behavior = if flags & DYN_FLAG_SID != 0 {
                    IpIdBehavior::Zero
                } else if flags & DYN_FLAG_RND != 0 {
                    IpIdBehavior::Random
                } else if flags & DYN_FLAG_NBO != 0 {
                    IpIdBehavior::Sequential
                } else {
                    IpIdBehavior::SequentialSwapped
                };
                dynamics.behaviors.push(Some(behavior));
            }
            IpHeader::V6(v6) => {
                v6.traffic_class = cursor.u8()?;
                v6.hop_limit = cursor.u8()?;
                dynamics.behaviors.push(None);
            }
        }
    }
    match &mut headers.transport {
        Some(TransportHeader::Udp(udp)) => {
            udp.checksum = cursor.u16()?;
        }
        Some(TransportHeader::UdpLite(udp_lite)) => {
            udp_lite.checksum_coverage = cursor.u16()?;
            udp_lite.checksum = cursor.u16()?;
        }
        Some(TransportHeader::Esp(esp)) => {
            esp.sequence_number = cursor.u32()?;
        }
        None => {}
    }
    if let Some(rtp) = &mut headers.rtp {
        let flags = cursor.u8()?;
        if flags & !0b0000_0101 != 0 {
            return None;
        }
        rtp.marker = flags & 0b0000_0100 != 0;
        let pt = cursor.u8()?;
        if pt & 0x80 != 0 {
            return None;
        }
        rtp.payload_type = pt;
        rtp.sequence_number = cursor.u16()?;
        rtp.timestamp = cursor.u32()?;
        if flags & 0b0000_0001 != 0 {
            let (stride, _) = cursor.sdvl()?;
            if stride == 0 {
                return None;
            }
            dynamics.ts_stride = Some(stride);
        }
    }
    if profile.is_v2() {
        parse_v2_control(cursor, headers, &mut dynamics, compat_pre_erratum)?;
    } else if profile.generates_msn() {
        dynamics.msn = Some(cursor.u16()?);
    }
    Some(dynamics)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::ReadCursor;

    fn rtp_headers() -> UncompHeaders {
        let mut v4 = Ipv4Header {
            total_len: 40 + 160,
            identification: 42,
            dont_fragment: true,
            time_to_live: 64,
            protocol: ip_number::UDP,
            source: [192, 0, 2, 1],
            destination: [192, 0, 2, 2],
            ..Default::default()
        };
        v4.header_checksum = v4.calc_header_checksum();
        let mut ip = ArrayVec::new();
        ip.push(IpHeader::V4(v4));
        UncompHeaders {
            ip,
            transport: Some(TransportHeader::Udp(UdpHeader {
                source_port: 5004,
                destination_port: 5004,
                length: 180,
                checksum: 0x1a2b,
            })),
            rtp: Some(RtpHeader {
                marker: false,
                payload_type: 0,
                sequence_number: 1,
                timestamp: 160,
                ssrc: 0xdeadbeef,
                ..Default::default()
            }),
            header_len: 40,
        }
    }

    #[test]
    fn rtp_static_chain_round_trip() {
        let headers = rtp_headers();
        let mut chain = Vec::new();
        write_static_chain(&mut chain, ProfileId::RTP, &headers);
        let mut cursor = ReadCursor::new(&chain);
        let parsed = parse_static_chain(&mut cursor, ProfileId::RTP).unwrap();
        assert!(cursor.remaining().is_empty());
        assert_eq!(headers.ip[0].as_v4().unwrap().source, parsed.ip[0].as_v4().unwrap().source);
        assert_eq!(headers.udp().unwrap().source_port, parsed.udp().unwrap().source_port);
        assert_eq!(0xdeadbeef, parsed.rtp.as_ref().unwrap().ssrc);
    }

    #[test]
    fn rtp_dynamic_chain_round_trip() {
        let headers = rtp_headers();
        let mut dynamics = ChainDynamics::default();
        dynamics.behaviors.push(Some(IpIdBehavior::Sequential));
        dynamics.ts_stride = Some(160);
        let mut chain = Vec::new();
        write_dynamic_chain(&mut chain, ProfileId::RTP, &headers, &dynamics, false);

        let mut skeleton = {
            let mut s = Vec::new();
            write_static_chain(&mut s, ProfileId::RTP, &headers);
            let mut cursor = ReadCursor::new(&s);
            parse_static_chain(&mut cursor, ProfileId::RTP).unwrap()
        };
        let mut cursor = ReadCursor::new(&chain);
        let parsed =
            parse_dynamic_chain(&mut cursor, ProfileId::RTP, &mut skeleton, false).unwrap();
        assert!(cursor.remaining().is_empty());
        assert_eq!(Some(160), parsed.ts_stride);
        assert_eq!(Some(IpIdBehavior::Sequential), parsed.behaviors[0]);
        assert_eq!(42, skeleton.ip[0].as_v4().unwrap().identification);
        assert_eq!(64, skeleton.ip[0].as_v4().unwrap().time_to_live);
        assert_eq!(0x1a2b, skeleton.udp().unwrap().checksum);
        assert_eq!(160, skeleton.rtp.as_ref().unwrap().timestamp);
        assert_eq!(1, skeleton.rtp.as_ref().unwrap().sequence_number);
    }

    #[test]
    fn udp_profile_carries_msn() {
        let mut headers = rtp_headers();
        headers.rtp = None;
        let mut dynamics = ChainDynamics::default();
        dynamics.behaviors.push(Some(IpIdBehavior::Sequential));
        dynamics.msn = Some(0xabcd);
        let mut chain = Vec::new();
        write_dynamic_chain(&mut chain, ProfileId::UDP, &headers, &dynamics, false);

        let mut skeleton = {
            let mut s = Vec::new();
            write_static_chain(&mut s, ProfileId::UDP, &headers);
            let mut cursor = ReadCursor::new(&s);
            parse_static_chain(&mut cursor, ProfileId::UDP).unwrap()
        };
        let mut cursor = ReadCursor::new(&chain);
        let parsed =
            parse_dynamic_chain(&mut cursor, ProfileId::UDP, &mut skeleton, false).unwrap();
        assert_eq!(Some(0xabcd), parsed.msn);
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn truncated_chain_is_rejected() {
        let headers = rtp_headers();
        let mut chain = Vec::new();
        write_static_chain(&mut chain, ProfileId::RTP, &headers);
        for len in 0..chain.len() {
            let mut cursor = ReadCursor::new(&chain[..len]);
            assert!(parse_static_chain(&mut cursor, ProfileId::RTP).is_none());
        }
    }

    #[test]
    fn reserved_dynamic_flag_bits_are_rejected() {
        let headers = rtp_headers();
        let mut dynamics = ChainDynamics::default();
        dynamics.behaviors.push(Some(IpIdBehavior::Sequential));
        let mut chain = Vec::new();
        write_dynamic_chain(&mut chain, ProfileId::UDP, &headers, &dynamics, false);
        chain[4] |= 0b1000_0000; // reserved bit in the IPv4 flags octet
        let mut skeleton = {
            let mut s = Vec::new();
            write_static_chain(&mut s, ProfileId::UDP, &headers);
            let mut cursor = ReadCursor::new(&s);
            parse_static_chain(&mut cursor, ProfileId::UDP).unwrap()
        };
        let mut cursor = ReadCursor::new(&chain);
        assert!(parse_dynamic_chain(&mut cursor, ProfileId::UDP, &mut skeleton, false).is_none());
    }
}
