/// Layers on which an error can occur.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Layer {
    /// Error occurred while parsing or serializing an IPv4 header.
    Ipv4Header,
    /// Error occurred while parsing or serializing an IPv6 header.
    Ipv6Header,
    /// Error occurred while parsing or serializing an UDP header.
    UdpHeader,
    /// Error occurred while parsing or serializing an UDP-Lite header.
    UdpLiteHeader,
    /// Error occurred while parsing or serializing an RTP header.
    RtpHeader,
    /// Error occurred while parsing or serializing an ESP header.
    EspHeader,
    /// Error occurred while parsing a ROHC packet (compressed side).
    RohcPacket,
    /// Error occurred while parsing a ROHC feedback element.
    Feedback,
}

impl Layer {
    /// String in the `"<...> Error"` title format.
    pub fn error_title(&self) -> &'static str {
        use Layer::*;
        match self {
            Ipv4Header => "IPv4 Header Error",
            Ipv6Header => "IPv6 Header Error",
            UdpHeader => "UDP Header Error",
            UdpLiteHeader => "UDP-Lite Header Error",
            RtpHeader => "RTP Header Error",
            EspHeader => "ESP Header Error",
            RohcPacket => "ROHC Packet Error",
            Feedback => "ROHC Feedback Error",
        }
    }
}

impl core::fmt::Display for Layer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use Layer::*;
        match self {
            Ipv4Header => write!(f, "IPv4 header"),
            Ipv6Header => write!(f, "IPv6 header"),
            UdpHeader => write!(f, "UDP header"),
            UdpLiteHeader => write!(f, "UDP-Lite header"),
            RtpHeader => write!(f, "RTP header"),
            EspHeader => write!(f, "ESP header"),
            RohcPacket => write!(f, "ROHC packet"),
            Feedback => write!(f, "ROHC feedback"),
        }
    }
}
