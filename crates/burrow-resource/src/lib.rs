pub mod decoder;
pub mod pack;

pub use decoder::*;
pub use pack::*;
