use crate::{TransportHeader, UncompHeaders};

/// ROHC profile identifier.
///
/// The constants cover the RFC 3095 (ROHCv1) and RFC 5225 (ROHCv2)
/// registrations relevant to this library; [`ProfileId::is_implemented`]
/// tells which of them the engines actually speak.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileId(pub u16);

impl ProfileId {
    /// No compression; packets pass through with CID framing only.
    pub const UNCOMPRESSED: ProfileId = ProfileId(0x0000);
    /// RTP/UDP/IP.
    pub const RTP: ProfileId = ProfileId(0x0001);
    /// UDP/IP.
    pub const UDP: ProfileId = ProfileId(0x0002);
    /// ESP/IP.
    pub const ESP: ProfileId = ProfileId(0x0003);
    /// IP-only.
    pub const IP: ProfileId = ProfileId(0x0004);
    /// TCP/IP (not implemented).
    pub const TCP: ProfileId = ProfileId(0x0006);
    /// UDP-Lite/IP.
    pub const UDP_LITE: ProfileId = ProfileId(0x0008);
    /// ROHCv2 RTP/UDP/IP (not implemented, see DESIGN notes).
    pub const RTP_V2: ProfileId = ProfileId(0x0101);
    /// ROHCv2 UDP/IP.
    pub const UDP_V2: ProfileId = ProfileId(0x0102);
    /// ROHCv2 ESP/IP (not implemented).
    pub const ESP_V2: ProfileId = ProfileId(0x0103);
    /// ROHCv2 IP-only.
    pub const IP_V2: ProfileId = ProfileId(0x0104);

    /// Profiles in match precedence order: most specific first, with
    /// the Uncompressed profile as the unconditional fallback.
    pub const PRECEDENCE: [ProfileId; 8] = [
        ProfileId::RTP,
        ProfileId::UDP_V2,
        ProfileId::UDP,
        ProfileId::ESP,
        ProfileId::UDP_LITE,
        ProfileId::IP_V2,
        ProfileId::IP,
        ProfileId::UNCOMPRESSED,
    ];

    /// True for the profiles this library implements.
    pub fn is_implemented(self) -> bool {
        matches!(self.0, 0x0000 | 0x0001 | 0x0002 | 0x0003 | 0x0004 | 0x0008 | 0x0102 | 0x0104)
    }

    /// True for RFC 5225 (ROHCv2) profiles.
    #[inline]
    pub fn is_v2(self) -> bool {
        self.0 & 0xff00 == 0x0100
    }

    /// True for profiles whose master sequence number is generated by
    /// the compressor (no transported sequence number to reuse).
    pub fn generates_msn(self) -> bool {
        matches!(self.0, 0x0002 | 0x0008 | 0x0004 | 0x0102 | 0x0104)
    }

    /// Match predicate on a parsed uncompressed packet. RTP
    /// classification (which needs the caller-supplied detector) is
    /// checked by the compressor before this predicate.
    pub fn matches(self, headers: &UncompHeaders) -> bool {
        if self == ProfileId::UNCOMPRESSED {
            return true;
        }
        if !headers.ip_chain_compressible() {
            return false;
        }
        if self == ProfileId::IP || self == ProfileId::IP_V2 {
            true
        } else if self == ProfileId::UDP || self == ProfileId::UDP_V2 {
            matches!(headers.transport, Some(TransportHeader::Udp(_)))
        } else if self == ProfileId::UDP_LITE {
            matches!(headers.transport, Some(TransportHeader::UdpLite(_)))
        } else if self == ProfileId::ESP {
            matches!(headers.transport, Some(TransportHeader::Esp(_)))
        } else if self == ProfileId::RTP {
            matches!(headers.transport, Some(TransportHeader::Udp(_)))
                && headers.rtp.as_ref().map(|r| r.is_compressible()).unwrap_or(false)
        } else {
            false
        }
    }
}

impl core::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self.0 {
            0x0000 => "Uncompressed",
            0x0001 => "RTP/UDP/IP",
            0x0002 => "UDP/IP",
            0x0003 => "ESP/IP",
            0x0004 => "IP-only",
            0x0006 => "TCP/IP",
            0x0008 => "UDP-Lite/IP",
            0x0101 => "ROHCv2 RTP/UDP/IP",
            0x0102 => "ROHCv2 UDP/IP",
            0x0103 => "ROHCv2 ESP/IP",
            0x0104 => "ROHCv2 IP-only",
            _ => "unknown",
        };
        write!(f, "0x{:04x} ({})", self.0, name)
    }
}
