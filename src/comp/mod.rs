//! The compressor engine: per-flow contexts, field-change analysis,
//! packet-type decision and packet emission.

mod ip_id;
pub use ip_id::IpIdBehavior;
pub(crate) use ip_id::{swap16, IpIdState};

mod ts_stride;
pub(crate) use ts_stride::*;

mod context;
pub use context::{
    CompressorState, FO_REFRESH_PACKETS, IR_REFRESH_MILLIS, IR_REFRESH_PACKETS, MAX_FO_COUNT,
    MAX_IR_COUNT,
};
pub(crate) use context::*;

mod decision;
pub use decision::PacketFormat;
pub(crate) use decision::*;

mod packet_writer;
pub(crate) use packet_writer::*;

mod compressor;
pub use compressor::*;
