pub mod adapter;
pub mod codec;
pub mod connection;
pub mod frame;
pub mod header;
pub mod packets;
pub mod pool;

pub use adapter::*;
pub use codec::*;
pub use connection::{Connection, ConnectionReader, ConnectionWriter};
pub use frame::*;
pub use header::*;
pub use packets::*;
pub use pool::*;
