//! Error types that can be triggered during compression, decompression,
//! feedback handling and engine configuration.

mod layer;
pub use layer::*;

mod len_error;
pub use len_error::*;

mod header_error;
pub use header_error::*;

mod config_error;
pub use config_error::*;

mod compress_error;
pub use compress_error::*;

mod decompress_error;
pub use decompress_error::*;

mod feedback_error;
pub use feedback_error::*;
