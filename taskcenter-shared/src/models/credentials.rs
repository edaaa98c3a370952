/// Password records
///
/// A user's password is stored as a raw argon2id derived key together with
/// its salt and the parameters used to derive it. Keeping the parameters next
/// to the hash lets the configured strength change over time: a record
/// derived under older parameters is re-derived on the next successful login.
///
/// # Database Schema
///
/// ```sql
/// CREATE TABLE pwd_infos (
///     id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
///     salt BYTEA NOT NULL,
///     hash BYTEA NOT NULL,
///     m_cost INTEGER NOT NULL,
///     t_cost INTEGER NOT NULL,
///     p_cost INTEGER NOT NULL,
///     key_len INTEGER NOT NULL
/// );
/// ```

use serde::{Deserialize, Serialize};

/// Argon2id cost factors and output length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,

    /// Number of passes
    pub t_cost: u32,

    /// Degree of parallelism
    pub p_cost: u32,

    /// Derived key length in bytes
    pub key_len: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
            key_len: 32,
        }
    }
}

/// Stored credential for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwdInfo {
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    pub params: KdfParams,
}

impl PwdInfo {
    /// Whether this record must be re-derived to meet the current settings
    pub fn needs_upgrade(&self, current: &KdfParams, salt_len: usize) -> bool {
        self.params != *current || self.salt.len() < salt_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(params: KdfParams, salt_len: usize) -> PwdInfo {
        PwdInfo {
            salt: vec![7; salt_len],
            hash: vec![1; params.key_len as usize],
            params,
        }
    }

    #[test]
    fn test_up_to_date_record_needs_no_upgrade() {
        let params = KdfParams::default();
        assert!(!record(params, 64).needs_upgrade(&params, 64));
    }

    #[test]
    fn test_changed_params_need_upgrade() {
        let old = KdfParams {
            t_cost: 1,
            ..KdfParams::default()
        };
        assert!(record(old, 64).needs_upgrade(&KdfParams::default(), 64));
    }

    #[test]
    fn test_short_salt_needs_upgrade() {
        let params = KdfParams::default();
        assert!(record(params, 16).needs_upgrade(&params, 64));
    }
}
