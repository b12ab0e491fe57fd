//! The decompressor engine: packet parsing into staged bits, W-LSB
//! decoding against per-flow contexts, CRC-gated context updates and
//! feedback generation.

mod bits;
pub(crate) use bits::*;

mod packet_reader;
pub(crate) use packet_reader::*;

mod context;
pub use context::DecompressorState;
pub(crate) use context::*;

mod decompressor;
pub use decompressor::*;
