//! Shared wire elements of ROHC packets: CID prefixes, packet type
//! discriminators, the profile registry, feedback elements and the
//! static/dynamic chains used by initialization packets.

mod cursor;
pub(crate) use cursor::*;

mod cid;
pub use cid::*;

mod packet_type;
pub use packet_type::*;

mod profile_id;
pub use profile_id::*;

mod feedback;
pub use feedback::*;

mod chains;
pub(crate) use chains::*;

mod ext3;
pub(crate) use ext3::*;

mod v2_chains;
pub use v2_chains::control_crc3;
pub(crate) use v2_chains::*;
