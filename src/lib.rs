//! A library implementing Robust Header Compression (ROHC, RFC 3095 &
//! RFC 5225) for IP, UDP, ESP, UDP-Lite and RTP headers.
//!
//! ROHC shrinks the 40+ bytes of IP/UDP/RTP headers down to a few
//! bytes on links where header overhead dominates the payload. The
//! crate provides the two halves of the scheme:
//!
//! * [`Compressor`] — classifies uncompressed packets into profiles,
//!   tracks per-flow contexts and emits the smallest ROHC packet that
//!   still lets the peer converge.
//! * [`Decompressor`] — parses ROHC packets, reconstructs the original
//!   headers byte for byte and guards every context update with the
//!   packet CRC.
//!
//! Both engines are plain state machines: no I/O, no threads, no
//! internal timers. Buffers and (for time-based refreshes) wall-clock
//! timestamps come from the caller, feedback bytes are moved between
//! the engines by whatever return channel the transport offers.
//!
//! # Example
//!
//! ```
//! use rohcomp::{CidType, Compressor, Decompressor, ProfileId, RohcMode};
//!
//! // toy generator for the compressor's unpredictable fields
//! let mut seed = 0x1234_5678u32;
//! let rng = move || {
//!     seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
//!     seed
//! };
//!
//! let mut compressor = Compressor::new(CidType::Small, 4, rng).unwrap();
//! compressor.enable_profiles(&[ProfileId::UDP]).unwrap();
//! let mut decompressor =
//!     Decompressor::new(CidType::Small, 4, RohcMode::Unidirectional).unwrap();
//! decompressor.enable_profiles(&[ProfileId::UDP]).unwrap();
//!
//! // a small IPv4/UDP packet
//! let packet = {
//!     let payload = [0x11u8, 0x22, 0x33, 0x44];
//!     let mut ip = rohcomp::Ipv4Header {
//!         total_len: (20 + 8 + payload.len()) as u16,
//!         identification: 1,
//!         dont_fragment: true,
//!         time_to_live: 64,
//!         protocol: rohcomp::ip_number::UDP,
//!         source: [192, 0, 2, 1],
//!         destination: [192, 0, 2, 2],
//!         ..Default::default()
//!     };
//!     ip.header_checksum = ip.calc_header_checksum();
//!     let udp = rohcomp::UdpHeader {
//!         source_port: 4000,
//!         destination_port: 4001,
//!         length: (8 + payload.len()) as u16,
//!         checksum: 0,
//!     };
//!     let mut packet = Vec::new();
//!     packet.extend_from_slice(&ip.to_bytes());
//!     packet.extend_from_slice(&udp.to_bytes());
//!     packet.extend_from_slice(&payload);
//!     packet
//! };
//!
//! let mut rohc = [0u8; 128];
//! let mut restored = [0u8; 128];
//! let compressed = compressor.compress(&packet, 0, &mut rohc).unwrap();
//! let restored_meta = decompressor
//!     .decompress(&rohc[..compressed.len], &mut restored)
//!     .unwrap();
//! assert_eq!(&packet[..], &restored[..restored_meta.len]);
//! ```
//!
//! # References
//! * RObust Header Compression (ROHC): Framework and four profiles
//!   [RFC 3095](https://datatracker.ietf.org/doc/html/rfc3095)
//! * The ROHC Framework [RFC 5795](https://datatracker.ietf.org/doc/html/rfc5795)
//! * RObust Header Compression Version 2 (ROHCv2)
//!   [RFC 5225](https://datatracker.ietf.org/doc/html/rfc5225)

/// Module containing error types that can be triggered.
pub mod err;

/// CRC calculators used by ROHC packets.
pub mod crc;

/// W-LSB and self-describing variable-length codecs.
pub mod coding;

mod uncomp;
pub use crate::uncomp::*;

mod wire;
pub use crate::wire::*;

mod mode;
pub use crate::mode::*;

mod features;
pub use crate::features::*;

mod stats;
pub use crate::stats::*;

mod context_table;

mod comp;
pub use crate::comp::{
    CompressedPacket, Compressor, CompressorState, IpIdBehavior, PacketFormat, RtpDetector,
    FO_REFRESH_PACKETS, IR_REFRESH_MILLIS, IR_REFRESH_PACKETS, MAX_FO_COUNT, MAX_IR_COUNT,
};

mod decomp;
pub use crate::decomp::{DecompressedPacket, Decompressor, DecompressorState};
