//! # employee_auth - JWT auth core for the employee manager
//!
//! Stateless token issuance and verification with role claims, plus a small
//! gateway that checks credentials against a pluggable user store. Sync, no
//! async runtime.
//!
//! ## Features
//!
//! - `http` - minimal login/register/me HTTP server via tiny_http

pub mod auth;
pub mod clock;
pub mod config;
pub mod store;
pub mod types;

#[cfg(feature = "http")]
pub mod server;

// Re-export commonly used types
pub use auth::{AuthGateway, SigningAlgorithm, TokenCodec, TokenError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use store::{InMemoryUserStore, UserStore};
pub use types::*;

#[cfg(feature = "http")]
pub use server::AuthServer;
