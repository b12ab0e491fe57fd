use crate::err::HeaderError;
use crate::{
    ip_number, EspHeader, IpHeader, Ipv4Header, Ipv6Header, RtpHeader, UdpHeader, UdpLiteHeader,
};
use arrayvec::ArrayVec;

/// Transport header behind the IP chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportHeader {
    Udp(UdpHeader),
    UdpLite(UdpLiteHeader),
    Esp(EspHeader),
}

impl TransportHeader {
    #[inline]
    pub fn serialized_len(&self) -> usize {
        match self {
            TransportHeader::Udp(_) => UdpHeader::LEN,
            TransportHeader::UdpLite(_) => UdpLiteHeader::LEN,
            TransportHeader::Esp(_) => EspHeader::LEN,
        }
    }
}

/// All headers of one uncompressed packet, parsed from the IP layer
/// downwards.
///
/// The RTP header is only attached once the engine has classified the
/// UDP payload as RTP (RTP detection is a caller-supplied predicate).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UncompHeaders {
    /// IP header chain, outermost first. At most one tunnel level.
    pub ip: ArrayVec<IpHeader, 2>,
    pub transport: Option<TransportHeader>,
    pub rtp: Option<RtpHeader>,
    /// Offset of the payload in the original packet (includes skipped
    /// IPv4 options and CSRC entries, which are parsed but not
    /// modeled).
    pub header_len: usize,
}

impl UncompHeaders {
    /// Parses the IP chain and the transport header. Anything that is
    /// neither UDP, UDP-Lite nor ESP is left as opaque payload.
    pub fn from_slice(packet: &[u8]) -> Result<UncompHeaders, HeaderError> {
        let mut ip = ArrayVec::<IpHeader, 2>::new();
        let (outer, mut rest) = IpHeader::from_slice(packet)?;
        let mut protocol = outer.next_protocol();
        ip.push(outer);

        if matches!(protocol, ip_number::IPIP | ip_number::IPV6) {
            let (inner, inner_rest) = IpHeader::from_slice(rest)?;
            protocol = inner.next_protocol();
            rest = inner_rest;
            ip.push(inner);
        }

        let transport = match protocol {
            ip_number::UDP => {
                let (udp, udp_rest) = UdpHeader::from_slice(rest)?;
                rest = udp_rest;
                Some(TransportHeader::Udp(udp))
            }
            ip_number::UDP_LITE => {
                let (udp_lite, rest2) = UdpLiteHeader::from_slice(rest)?;
                rest = rest2;
                Some(TransportHeader::UdpLite(udp_lite))
            }
            ip_number::ESP => {
                let (esp, rest2) = EspHeader::from_slice(rest)?;
                rest = rest2;
                Some(TransportHeader::Esp(esp))
            }
            _ => None,
        };

        Ok(UncompHeaders {
            ip,
            transport,
            rtp: None,
            header_len: packet.len() - rest.len(),
        })
    }

    /// Parses and attaches the RTP header at the current payload
    /// offset. Only called after the RTP detection predicate matched.
    pub fn attach_rtp(&mut self, packet: &[u8]) -> Result<(), HeaderError> {
        let (rtp, rest) = RtpHeader::from_slice(&packet[self.header_len..])?;
        self.header_len = packet.len() - rest.len();
        self.rtp = Some(rtp);
        Ok(())
    }

    /// The innermost IP header (the one directly above the transport).
    #[inline]
    pub fn innermost_ip(&self) -> &IpHeader {
        self.ip.last().expect("chain holds at least one header")
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        match &self.transport {
            Some(TransportHeader::Udp(udp)) => Some(udp),
            _ => None,
        }
    }

    /// True if every IPv4 header in the chain can be reconstructed
    /// (no options, not fragmented).
    pub fn ip_chain_compressible(&self) -> bool {
        self.ip.iter().all(|h| match h {
            IpHeader::V4(v4) => v4.options_len == 0 && !v4.is_fragmenting(),
            IpHeader::V6(_) => true,
        })
    }

    /// Length of the reconstructed header block.
    pub fn serialized_len(&self) -> usize {
        let mut len = 0;
        for header in &self.ip {
            len += header.serialized_len();
        }
        if let Some(transport) = &self.transport {
            len += transport.serialized_len();
        }
        if self.rtp.is_some() {
            len += RtpHeader::BASE_LEN;
        }
        len
    }

    /// Serializes all headers into `out` (which must hold at least
    /// [`UncompHeaders::serialized_len`] bytes) and returns the number
    /// of bytes written.
    pub fn write_into(&self, out: &mut [u8]) -> usize {
        let mut pos = 0;
        for header in &self.ip {
            match header {
                IpHeader::V4(v4) => {
                    out[pos..pos + 20].copy_from_slice(&v4.to_bytes());
                    pos += 20;
                }
                IpHeader::V6(v6) => {
                    out[pos..pos + 40].copy_from_slice(&v6.to_bytes());
                    pos += 40;
                }
            }
        }
        match &self.transport {
            Some(TransportHeader::Udp(udp)) => {
                out[pos..pos + 8].copy_from_slice(&udp.to_bytes());
                pos += 8;
            }
            Some(TransportHeader::UdpLite(udp_lite)) => {
                out[pos..pos + 8].copy_from_slice(&udp_lite.to_bytes());
                pos += 8;
            }
            Some(TransportHeader::Esp(esp)) => {
                out[pos..pos + 8].copy_from_slice(&esp.to_bytes());
                pos += 8;
            }
            None => {}
        }
        if let Some(rtp) = &self.rtp {
            out[pos..pos + 12].copy_from_slice(&rtp.to_bytes());
            pos += 12;
        }
        pos
    }

    /// Rewrites every length field (and dependent IPv4 checksum) for a
    /// payload of `payload_len` bytes behind the headers. Used when
    /// reconstructing packets, where lengths are inferred rather than
    /// transmitted.
    pub fn set_payload_len(&mut self, payload_len: usize) {
        let mut below = payload_len;
        if self.rtp.is_some() {
            below += RtpHeader::BASE_LEN;
        }
        if let Some(transport) = &mut self.transport {
            match transport {
                TransportHeader::Udp(udp) => {
                    below += UdpHeader::LEN;
                    udp.length = below as u16;
                }
                TransportHeader::UdpLite(_) => {
                    // the coverage field is not a length, carried as-is
                    below += UdpLiteHeader::LEN;
                }
                TransportHeader::Esp(_) => {
                    below += EspHeader::LEN;
                }
            }
        }
        for header in self.ip.iter_mut().rev() {
            match header {
                IpHeader::V4(v4) => {
                    below += Ipv4Header::BASE_LEN;
                    v4.total_len = below as u16;
                    v4.header_checksum = v4.calc_header_checksum();
                }
                IpHeader::V6(v6) => {
                    v6.payload_length = below as u16;
                    below += Ipv6Header::LEN;
                }
            }
        }
    }
}
