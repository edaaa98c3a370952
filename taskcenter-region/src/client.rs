/// Routing from region names to regional implementations
///
/// The directory talks to task centers only through [`InternalRegionApi`].
/// [`InternalRegionClient`] is the in-process implementation: it resolves the
/// region of an account and forwards to that region's [`RegionPrivateApi`].
/// An unknown region is an internal failure at this layer, since callers are
/// expected to have validated the region already.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use taskcenter_shared::models::account::Account;
use taskcenter_shared::models::member::{AccountMember, AddMember};
use tracing::debug;
use uuid::Uuid;

use crate::error::{RegionFailure, RegionOutcome};
use crate::private::RegionPrivateApi;
use crate::store::{MemShardStore, ShardStore};

/// Task center operations, addressed by region
///
/// Calls that take an `&Account` use its region, shard and id; the account
/// must be provisioned.
#[async_trait]
pub trait InternalRegionApi: Send + Sync {
    fn is_valid_region(&self, region: &str) -> bool;

    /// Region names, sorted
    fn get_regions(&self) -> Vec<String>;

    /// Provisions a user's personal task center, owned by the user
    async fn create_personal_task_center(
        &self,
        region: &str,
        user_id: Uuid,
        user_name: &str,
    ) -> Result<i32, RegionFailure>;

    async fn create_org_task_center(
        &self,
        region: &str,
        org_id: Uuid,
        owner_id: Uuid,
        owner_name: &str,
    ) -> Result<i32, RegionFailure>;

    async fn delete_task_center(&self, account: &Account, actor: Uuid) -> RegionOutcome<()>;

    async fn add_members(&self, account: &Account, actor: Uuid, members: Vec<AddMember>) -> RegionOutcome<()>;

    async fn remove_members(&self, account: &Account, actor: Uuid, members: Vec<Uuid>) -> RegionOutcome<()>;

    async fn set_member_deleted(&self, account: &Account, member: Uuid) -> Result<(), RegionFailure>;

    async fn rename_member(&self, account: &Account, member: Uuid, new_name: &str) -> Result<(), RegionFailure>;

    async fn member_is_only_account_owner(&self, account: &Account, member: Uuid) -> Result<bool, RegionFailure>;

    async fn member_is_account_owner(&self, account: &Account, member: Uuid) -> Result<bool, RegionFailure>;

    async fn get_members(
        &self,
        account: &Account,
        actor: Uuid,
        offset: u64,
        limit: u64,
    ) -> RegionOutcome<(Vec<AccountMember>, u64)>;
}

pub struct InternalRegionClient {
    regions: HashMap<String, Arc<RegionPrivateApi>>,
}

impl InternalRegionClient {
    pub fn new(apis: impl IntoIterator<Item = RegionPrivateApi>) -> Self {
        let regions = apis
            .into_iter()
            .map(|api| (api.region().to_string(), Arc::new(api)))
            .collect();
        Self { regions }
    }

    /// Builds a client whose regions are backed by in-memory shards
    pub fn in_memory<'a>(
        regions: impl IntoIterator<Item = (&'a str, usize)>,
        max_process_entity_count: usize,
    ) -> Self {
        Self::new(regions.into_iter().map(|(name, shards)| {
            let store: Arc<dyn ShardStore> = Arc::new(MemShardStore::new(shards));
            RegionPrivateApi::new(name, store, max_process_entity_count)
        }))
    }

    fn route(&self, region: &str) -> Result<&RegionPrivateApi, RegionFailure> {
        debug!(region, "Routing region call");
        self.regions
            .get(region)
            .map(|api| api.as_ref())
            .ok_or_else(|| RegionFailure::InvalidRegion(region.to_string()))
    }
}

#[async_trait]
impl InternalRegionApi for InternalRegionClient {
    fn is_valid_region(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    fn get_regions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.keys().cloned().collect();
        names.sort();
        names
    }

    async fn create_personal_task_center(
        &self,
        region: &str,
        user_id: Uuid,
        user_name: &str,
    ) -> Result<i32, RegionFailure> {
        self.route(region)?.create_account(user_id, user_id, user_name).await
    }

    async fn create_org_task_center(
        &self,
        region: &str,
        org_id: Uuid,
        owner_id: Uuid,
        owner_name: &str,
    ) -> Result<i32, RegionFailure> {
        self.route(region)?.create_account(org_id, owner_id, owner_name).await
    }

    async fn delete_task_center(&self, account: &Account, actor: Uuid) -> RegionOutcome<()> {
        match self.route(&account.region) {
            Ok(api) => api.delete_account(account.shard, account.id, actor).await,
            Err(failure) => failure.into(),
        }
    }

    async fn add_members(&self, account: &Account, actor: Uuid, members: Vec<AddMember>) -> RegionOutcome<()> {
        match self.route(&account.region) {
            Ok(api) => api.add_members(account.shard, account.id, actor, members).await,
            Err(failure) => failure.into(),
        }
    }

    async fn remove_members(&self, account: &Account, actor: Uuid, members: Vec<Uuid>) -> RegionOutcome<()> {
        match self.route(&account.region) {
            Ok(api) => api.remove_members(account.shard, account.id, actor, members).await,
            Err(failure) => failure.into(),
        }
    }

    async fn set_member_deleted(&self, account: &Account, member: Uuid) -> Result<(), RegionFailure> {
        self.route(&account.region)?
            .set_member_deleted(account.shard, account.id, member)
            .await
    }

    async fn rename_member(&self, account: &Account, member: Uuid, new_name: &str) -> Result<(), RegionFailure> {
        self.route(&account.region)?
            .rename_member(account.shard, account.id, member, new_name)
            .await
    }

    async fn member_is_only_account_owner(&self, account: &Account, member: Uuid) -> Result<bool, RegionFailure> {
        self.route(&account.region)?
            .member_is_only_account_owner(account.shard, account.id, member)
            .await
    }

    async fn member_is_account_owner(&self, account: &Account, member: Uuid) -> Result<bool, RegionFailure> {
        self.route(&account.region)?
            .member_is_account_owner(account.shard, account.id, member)
            .await
    }

    async fn get_members(
        &self,
        account: &Account,
        actor: Uuid,
        offset: u64,
        limit: u64,
    ) -> RegionOutcome<(Vec<AccountMember>, u64)> {
        match self.route(&account.region) {
            Ok(api) => api.get_members(account.shard, account.id, actor, offset, limit).await,
            Err(failure) => failure.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegionRejection;

    fn client() -> InternalRegionClient {
        InternalRegionClient::in_memory([("us", 2), ("eu", 1)], 100)
    }

    #[test]
    fn test_region_lookup() {
        let client = client();
        assert!(client.is_valid_region("us"));
        assert!(!client.is_valid_region("US"));
        assert_eq!(client.get_regions(), vec!["eu".to_string(), "us".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_region_is_a_failure_not_a_rejection() {
        let client = client();
        let mut org = Account::new_org(Uuid::new_v4(), "org".to_string(), "mars".to_string());
        org.shard = 0;

        assert!(matches!(
            client.create_org_task_center("mars", org.id, Uuid::new_v4(), "ali").await,
            Err(RegionFailure::InvalidRegion(_))
        ));
        assert!(matches!(
            client.delete_task_center(&org, Uuid::new_v4()).await,
            RegionOutcome::Failed(RegionFailure::InvalidRegion(_))
        ));
    }

    #[tokio::test]
    async fn test_routes_to_the_account_region() {
        let client = client();
        let owner = Uuid::new_v4();
        let mut org = Account::new_org(Uuid::new_v4(), "org".to_string(), "eu".to_string());
        org.shard = client.create_org_task_center("eu", org.id, owner, "ali").await.unwrap();
        assert_eq!(org.shard, 0);

        assert!(client.member_is_only_account_owner(&org, owner).await.unwrap());
        assert!(matches!(
            client.remove_members(&org, owner, vec![owner]).await,
            RegionOutcome::Rejected(RegionRejection::ZeroOwnerCount)
        ));

        // The same account id is unknown in another region
        let mut elsewhere = org.clone();
        elsewhere.region = "us".to_string();
        assert!(matches!(
            client.get_members(&elsewhere, owner, 0, 10).await,
            RegionOutcome::Failed(RegionFailure::Store(_))
        ));
    }
}
