use crate::{Ipv4Header, Ipv6Header};
use crate::err::HeaderError;

/// Either kind of IP header in the (possibly tunneled) header chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IpHeader {
    V4(Ipv4Header),
    V6(Ipv6Header),
}

impl IpHeader {
    /// Reads an IPv4 or IPv6 header depending on the version nibble.
    pub fn from_slice(slice: &[u8]) -> Result<(IpHeader, &[u8]), HeaderError> {
        match slice.first().map(|b| b >> 4) {
            Some(4) => {
                let (header, rest) = Ipv4Header::from_slice(slice)?;
                Ok((IpHeader::V4(header), rest))
            }
            _ => {
                // version 6 & len/version errors handled by the v6 parse
                let (header, rest) = Ipv6Header::from_slice(slice)?;
                Ok((IpHeader::V6(header), rest))
            }
        }
    }

    /// IP protocol number of whatever follows this header.
    #[inline]
    pub fn next_protocol(&self) -> u8 {
        match self {
            IpHeader::V4(h) => h.protocol,
            IpHeader::V6(h) => h.next_header,
        }
    }

    /// On-wire length of this header.
    #[inline]
    pub fn header_len(&self) -> usize {
        match self {
            IpHeader::V4(h) => h.header_len(),
            IpHeader::V6(h) => h.header_len(),
        }
    }

    /// On-wire length of the reconstructed (option-less) form.
    #[inline]
    pub fn serialized_len(&self) -> usize {
        match self {
            IpHeader::V4(_) => Ipv4Header::BASE_LEN,
            IpHeader::V6(_) => Ipv6Header::LEN,
        }
    }

    #[inline]
    pub fn is_v4(&self) -> bool {
        matches!(self, IpHeader::V4(_))
    }

    pub fn as_v4(&self) -> Option<&Ipv4Header> {
        match self {
            IpHeader::V4(h) => Some(h),
            IpHeader::V6(_) => None,
        }
    }

    pub fn as_v4_mut(&mut self) -> Option<&mut Ipv4Header> {
        match self {
            IpHeader::V4(h) => Some(h),
            IpHeader::V6(_) => None,
        }
    }
}
