//! Model of the uncompressed headers the engines operate on: parsed
//! header structs plus the [`UncompHeaders`] bundle describing one
//! fully assembled packet from the IP layer downwards.

mod ipv4_header;
pub use ipv4_header::*;

mod ipv6_header;
pub use ipv6_header::*;

mod ip_header;
pub use ip_header::*;

mod udp_header;
pub use udp_header::*;

mod udp_lite_header;
pub use udp_lite_header::*;

mod rtp_header;
pub use rtp_header::*;

mod esp_header;
pub use esp_header::*;

mod headers;
pub use headers::*;

/// IP protocol numbers relevant for header compression.
pub mod ip_number {
    /// IPv4 encapsulation (IP-in-IP tunnel).
    pub const IPIP: u8 = 4;
    /// UDP.
    pub const UDP: u8 = 17;
    /// IPv6 encapsulation.
    pub const IPV6: u8 = 41;
    /// Encapsulating Security Payload.
    pub const ESP: u8 = 50;
    /// UDP-Lite.
    pub const UDP_LITE: u8 = 136;
}
