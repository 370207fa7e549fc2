mod layout;
pub(crate) use layout::*;
mod bitmap;
pub(crate) use bitmap::*;

mod engine;
pub use engine::*;
