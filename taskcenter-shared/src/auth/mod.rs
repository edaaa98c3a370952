/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id key derivation and the `CryptoHelper` seam
/// - [`code`]: URL-safe single-use codes for email links
/// - [`jwt`]: Session token issue and validation
/// - [`context`]: Bearer header to `AuthContext` conversion
///
/// # Security Notes
///
/// - **Passwords**: raw Argon2id keys with per-record parameters, re-derived
///   lazily when the configured parameters change
/// - **Sessions**: HS256 JWTs with separate access and refresh token types

pub mod code;
pub mod context;
pub mod jwt;
pub mod password;
