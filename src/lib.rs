//! Hatz chat 与 App Builder API 客户端

pub mod apps;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod stream;
pub mod types;

pub use client::HatzClient;
pub use config::{ClientConfig, build_client};
pub use error::HatzError;
pub use session::{LoadedApp, Session};
pub use stream::{CancelFlag, TokenStream};
pub use types::*;
