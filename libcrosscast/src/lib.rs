//! Crosscast - connect social accounts once, publish everywhere
//!
//! The library holds the whole pipeline: OAuth account connection with
//! encrypted token storage, per-platform adapters, and concurrent
//! multi-platform publishing. The `cast-server` and `cast-accounts`
//! binaries are thin layers over it.

pub mod cipher;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod platforms;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use cipher::SecretCipher;
pub use config::Config;
pub use db::Database;
pub use dispatcher::Dispatcher;
pub use error::{CrosscastError, Result};
pub use oauth::{OAuthController, OAuthState};
pub use platforms::{AdapterRegistry, PlatformAdapter};
pub use server::AppState;
pub use types::{AccountSummary, ConnectedAccount, Platform, PostContent, PublishResult};
