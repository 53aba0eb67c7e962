//! Core Types
//!
//! Identity types and the error taxonomy shared by the codec and gateway.

mod error;
mod principal;

pub use error::*;
pub use principal::*;
