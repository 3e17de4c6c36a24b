pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod stage;

pub use client::{ClientPackHandler, DownloadFilter};
pub use config::SessionConfig;
pub use error::TransferError;
pub use server::ServerPackHandler;
pub use session::{join, serve, supported_protocol, Outgoing};
pub use stage::{ClientStage, ServerStage};
