//! Authentication
//!
//! Token issuance/verification, password hashing and the login gateway.

mod gateway;
mod jwt;
mod password;

pub use gateway::AuthGateway;
pub use jwt::{Claims, ROLE_DELIMITER, SigningAlgorithm, TokenCodec, TokenError, extract_bearer};
pub use password::{PasswordError, hash_password, verify_password};
