mod wlsb;
pub use wlsb::*;

mod sdvl;
pub use sdvl::*;
