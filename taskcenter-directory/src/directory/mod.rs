/// The account directory
///
/// `AccountDirectoryApi` owns users, orgs, credentials and the membership
/// index, and drives the region calls that keep each task center in step
/// with the directory. Workflows that touch both sides order their steps so
/// any interruption leaves the remaining work visible in the directory's own
/// records (an org or user whose shard is still `-1`).
///
/// - `account`: registration, activation, credentials and the caller's own user
/// - `org`: org lifecycle, membership and lookups
/// - `error`: `DirectoryError` and its kinds

pub mod account;
pub mod error;
pub mod org;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskcenter_region::{InternalRegionApi, RegionFailure, RegionOutcome};
use taskcenter_shared::auth::password::{new_pwd_info, CryptoError, CryptoHelper};
use taskcenter_shared::models::account::{FullUserInfo, Org};
use taskcenter_shared::models::credentials::{KdfParams, PwdInfo};
use taskcenter_shared::validation::{PatternError, StringRule};
use tracing::warn;
use uuid::Uuid;

use crate::mailer::{LinkMailer, MailerError};
use crate::store::{Store, StoreError};

pub use error::{DirectoryError, DirectoryResult, ErrorKind, ErrorRef};
pub use org::NewMember;

use error::internal;

/// Page size for loops over a user's orgs
const CASCADE_PAGE_SIZE: u64 = 100;

/// Tunable directory rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub name_min_chars: usize,
    pub name_max_chars: usize,
    pub name_regex_matchers: Vec<String>,
    pub pwd_min_chars: usize,
    pub pwd_max_chars: usize,
    pub pwd_regex_matchers: Vec<String>,
    /// Upper bound for ids in one bulk request
    pub max_process_entity_count: usize,
    pub max_search_limit: u64,
    pub crypto_code_len: usize,
    pub salt_len: usize,
    /// Parameters for newly derived credentials
    pub kdf: KdfParams,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            name_min_chars: 3,
            name_max_chars: 50,
            name_regex_matchers: Vec::new(),
            pwd_min_chars: 8,
            pwd_max_chars: 200,
            pwd_regex_matchers: Vec::new(),
            max_process_entity_count: 100,
            max_search_limit: 100,
            crypto_code_len: 100,
            salt_len: 64,
            kdf: KdfParams::default(),
        }
    }
}

pub struct AccountDirectoryApi {
    store: Arc<dyn Store>,
    regions: Arc<dyn InternalRegionApi>,
    mailer: Arc<dyn LinkMailer>,
    crypto: Arc<dyn CryptoHelper>,
    settings: DirectorySettings,
    name_rule: StringRule,
    search_rule: StringRule,
    pwd_rule: StringRule,
}

impl AccountDirectoryApi {
    /// # Errors
    ///
    /// Returns the compile error of the first invalid name or password pattern
    pub fn new(
        store: Arc<dyn Store>,
        regions: Arc<dyn InternalRegionApi>,
        mailer: Arc<dyn LinkMailer>,
        crypto: Arc<dyn CryptoHelper>,
        settings: DirectorySettings,
    ) -> Result<Self, PatternError> {
        let name_rule = StringRule::new(
            "name",
            settings.name_min_chars,
            settings.name_max_chars,
            &settings.name_regex_matchers,
        )?;
        let pwd_rule = StringRule::new(
            "password",
            settings.pwd_min_chars,
            settings.pwd_max_chars,
            &settings.pwd_regex_matchers,
        )?;
        let search_rule = name_rule.renamed("search");

        Ok(Self {
            store,
            regions,
            mailer,
            crypto,
            settings,
            name_rule,
            search_rule,
            pwd_rule,
        })
    }

    pub fn settings(&self) -> &DirectorySettings {
        &self.settings
    }

    /// Region names, sorted
    pub fn get_regions(&self) -> Vec<String> {
        self.regions.get_regions()
    }

    fn require_known_region(&self, region: &str) -> DirectoryResult<()> {
        if self.regions.is_valid_region(region) {
            Ok(())
        } else {
            Err(DirectoryError::NoSuchRegion)
        }
    }

    /// For records that already live in a region
    fn require_region_still_exists(&self, region: &str) -> DirectoryResult<()> {
        if self.regions.is_valid_region(region) {
            Ok(())
        } else {
            warn!(region, "Account refers to a region that no longer exists");
            Err(DirectoryError::RegionGone)
        }
    }

    fn require_bulk_size(&self, len: usize) -> DirectoryResult<()> {
        if len > self.settings.max_process_entity_count {
            Err(DirectoryError::MaxEntityCountExceeded)
        } else {
            Ok(())
        }
    }

    fn clamp_limit(&self, limit: u64) -> u64 {
        if limit == 0 || limit > self.settings.max_search_limit {
            self.settings.max_search_limit
        } else {
            limit
        }
    }

    fn new_code(&self) -> DirectoryResult<String> {
        Ok(self.crypto.url_safe_string(self.settings.crypto_code_len)?)
    }

    fn new_pwd_info(&self, pwd: &str) -> DirectoryResult<PwdInfo> {
        Ok(new_pwd_info(
            self.crypto.as_ref(),
            pwd,
            self.settings.salt_len,
            self.settings.kdf,
        )?)
    }

    async fn get_user(&self, id: Uuid) -> DirectoryResult<FullUserInfo> {
        self.store
            .get_user_by_id(id)
            .await?
            .ok_or(DirectoryError::NoSuchUser)
    }

    /// Loads an org whose task center exists in a live region
    async fn get_provisioned_org(&self, id: Uuid) -> DirectoryResult<Org> {
        let org = self.store.get_org(id).await?.ok_or(DirectoryError::NoSuchOrg)?;
        if !org.is_provisioned() {
            return Err(DirectoryError::OrgNotProvisioned);
        }
        self.require_region_still_exists(&org.region)?;
        Ok(org)
    }

    /// Fails if another account already holds `name` (case-insensitive)
    async fn require_name_available(&self, name: &str, own_id: Option<Uuid>) -> DirectoryResult<()> {
        match self.store.get_account_by_name(name).await? {
            Some(existing) if Some(existing.id) != own_id => Err(DirectoryError::NameAlreadyInUse),
            _ => Ok(()),
        }
    }
}

/// Internal failures first, then caller-facing rejections
fn region_outcome<T>(outcome: RegionOutcome<T>) -> DirectoryResult<T> {
    match outcome.into_result() {
        Err(failure) => Err(failure.into()),
        Ok(Err(rejection)) => {
            warn!(%rejection, "Region rejected the call");
            Err(DirectoryError::Rejected(rejection))
        }
        Ok(Ok(value)) => Ok(value),
    }
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NameTaken => DirectoryError::NameAlreadyInUse,
            StoreError::EmailTaken => DirectoryError::EmailAlreadyInUse,
            StoreError::Database(e) => internal("Directory store failure", e),
        }
    }
}

impl From<RegionFailure> for DirectoryError {
    fn from(err: RegionFailure) -> Self {
        internal("Region call failed", err)
    }
}

impl From<MailerError> for DirectoryError {
    fn from(err: MailerError) -> Self {
        internal("Notification failed", err)
    }
}

impl From<CryptoError> for DirectoryError {
    fn from(err: CryptoError) -> Self {
        internal("Crypto failure", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogLinkMailer;
    use crate::store::MemStore;
    use taskcenter_region::{InternalRegionClient, RegionRejection};
    use taskcenter_shared::auth::password::Argon2Crypto;

    fn api(settings: DirectorySettings) -> Result<AccountDirectoryApi, PatternError> {
        AccountDirectoryApi::new(
            Arc::new(MemStore::new()),
            Arc::new(InternalRegionClient::in_memory([("us", 1)], 100)),
            Arc::new(LogLinkMailer),
            Arc::new(Argon2Crypto),
            settings,
        )
    }

    #[test]
    fn test_invalid_pattern_fails_construction() {
        let settings = DirectorySettings {
            pwd_regex_matchers: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(api(settings).is_err());
    }

    #[test]
    fn test_limit_clamping() {
        let api = api(DirectorySettings::default()).unwrap();
        assert_eq!(api.clamp_limit(0), 100);
        assert_eq!(api.clamp_limit(10), 10);
        assert_eq!(api.clamp_limit(101), 100);
    }

    #[test]
    fn test_failed_outcome_dominates() {
        let failed: RegionOutcome<()> = RegionOutcome::Failed(RegionFailure::InvalidRegion("mars".to_string()));
        let err = region_outcome(failed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(!err.to_string().contains("mars"));

        let rejected: RegionOutcome<()> = RegionOutcome::Rejected(RegionRejection::ZeroOwnerCount);
        assert!(matches!(
            region_outcome(rejected),
            Err(DirectoryError::Rejected(RegionRejection::ZeroOwnerCount))
        ));
    }

    #[test]
    fn test_store_conflicts_are_not_internal() {
        assert!(matches!(
            DirectoryError::from(StoreError::NameTaken),
            DirectoryError::NameAlreadyInUse
        ));
        assert!(matches!(
            DirectoryError::from(StoreError::EmailTaken),
            DirectoryError::EmailAlreadyInUse
        ));
    }
}
