//! `blogline-auth` — authentication primitives (tokens, passwords).
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod password;
pub mod token;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::PasswordError;
pub use token::{Hs256Jwt, IssuedToken, JwtValidator, TokenIssueError, TokenIssuer};
