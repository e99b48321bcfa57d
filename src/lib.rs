pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod presentation;
pub mod session;
pub mod store;
pub mod types;
pub mod webhook;

pub use error::WahaError;
pub use gateway::{HttpGateway, SessionGateway};
pub use session::{SessionEvent, SessionManager, SessionOptions, SessionSnapshot};
pub use store::{ConfigStore, FileStore, GatewayConfig, MemoryStore};
pub use types::{ClinicIdentity, Me, Session, SessionStatus};

#[cfg(test)]
pub mod testing;
