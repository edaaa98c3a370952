//! # Task Center Shared Library
//!
//! This crate contains the types and utilities used by both the central
//! account directory and the regional task-center backends.
//!
//! ## Module Organization
//!
//! - `models`: Accounts, users, orgs, credentials, region-local members and activity
//! - `auth`: Key derivation, random codes, JWT sessions and request auth context
//! - `validation`: Name, password and email rules
//! - `db`: PostgreSQL pool management and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod validation;

/// Current version of the Task Center shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
