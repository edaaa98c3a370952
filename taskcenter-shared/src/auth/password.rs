/// Password key derivation using Argon2id
///
/// Unlike a self-describing PHC string, each credential here is a raw derived
/// key stored next to its salt and `KdfParams`. The directory compares
/// derived keys and decides on its own when a record should be re-derived
/// under stronger parameters.
///
/// The `CryptoHelper` trait is the seam the directory depends on; `Argon2Crypto`
/// is the production implementation.
///
/// # Example
///
/// ```
/// use taskcenter_shared::auth::password::{new_pwd_info, verify_pwd, Argon2Crypto};
/// use taskcenter_shared::models::credentials::KdfParams;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let crypto = Argon2Crypto;
/// let params = KdfParams { m_cost: 8, t_cost: 1, p_cost: 1, key_len: 32 };
///
/// let info = new_pwd_info(&crypto, "P@ss-W0rd", 16, params)?;
/// assert!(verify_pwd(&crypto, "P@ss-W0rd", &info)?);
/// assert!(!verify_pwd(&crypto, "wrong", &info)?);
/// # Ok(())
/// # }
/// ```

use crate::auth::code::generate_url_safe_code;
use crate::models::credentials::{KdfParams, PwdInfo};
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use rand::{rngs::OsRng, RngCore};

/// Error type for crypto operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key derivation parameters were rejected
    #[error("Invalid key derivation parameters: {0}")]
    InvalidParams(String),

    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    DeriveError(String),

    /// The system random source failed
    #[error("Random generation failed: {0}")]
    RandomError(String),
}

/// Random material and key derivation used by the directory
pub trait CryptoHelper: Send + Sync {
    /// Returns `len` bytes from a cryptographically secure source
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, CryptoError>;

    /// Returns a URL-safe random string of `len` characters
    fn url_safe_string(&self, len: usize) -> Result<String, CryptoError>;

    /// Derives a key from `pwd` and `salt` with the given parameters
    fn derive_key(&self, pwd: &[u8], salt: &[u8], params: &KdfParams) -> Result<Vec<u8>, CryptoError>;
}

/// Argon2id implementation of `CryptoHelper`
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Crypto;

impl CryptoHelper for Argon2Crypto {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomError(e.to_string()))?;
        Ok(bytes)
    }

    fn url_safe_string(&self, len: usize) -> Result<String, CryptoError> {
        Ok(generate_url_safe_code(len))
    }

    fn derive_key(&self, pwd: &[u8], salt: &[u8], params: &KdfParams) -> Result<Vec<u8>, CryptoError> {
        derive_argon2id_key(pwd, salt, params)
    }
}

/// Derives a raw Argon2id key
///
/// # Errors
///
/// Returns `CryptoError::InvalidParams` if argon2 rejects the parameters (for
/// example `m_cost < 8 * p_cost`) and `CryptoError::DeriveError` if the salt is
/// too short or derivation fails.
pub fn derive_argon2id_key(pwd: &[u8], salt: &[u8], params: &KdfParams) -> Result<Vec<u8>, CryptoError> {
    let argon_params = ParamsBuilder::new()
        .m_cost(params.m_cost)
        .t_cost(params.t_cost)
        .p_cost(params.p_cost)
        .output_len(params.key_len as usize)
        .build()
        .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = vec![0u8; params.key_len as usize];
    argon2
        .hash_password_into(pwd, salt, &mut key)
        .map_err(|e| CryptoError::DeriveError(e.to_string()))?;

    Ok(key)
}

/// Creates a credential record for `pwd` with a fresh salt
pub fn new_pwd_info(
    crypto: &dyn CryptoHelper,
    pwd: &str,
    salt_len: usize,
    params: KdfParams,
) -> Result<PwdInfo, CryptoError> {
    let salt = crypto.random_bytes(salt_len)?;
    let hash = crypto.derive_key(pwd.as_bytes(), &salt, &params)?;
    Ok(PwdInfo { salt, hash, params })
}

/// Checks `pwd` against a stored record using the record's own parameters
pub fn verify_pwd(crypto: &dyn CryptoHelper, pwd: &str, info: &PwdInfo) -> Result<bool, CryptoError> {
    let attempt = crypto.derive_key(pwd.as_bytes(), &info.salt, &info.params)?;
    Ok(attempt == info.hash)
}
