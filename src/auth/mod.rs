//! Authentication: password hashing and the JWT token contract.

pub mod jwt;
pub mod password;

use thiserror::Error;

pub use jwt::{AccessClaims, RefreshClaims, TokenIssuer, TokenPair};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Email is already registered")]
    EmailTaken,
    #[error("Admin access required")]
    Forbidden,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}
