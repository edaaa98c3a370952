/// Per-shard persistence for task center accounts, members and activity
///
/// Every call is addressed by an opaque shard index that was chosen when the
/// account was created. Shards are independent: no call spans two of them.
///
/// - [`memory::MemShardStore`]: in-process shards behind one `RwLock`
/// - [`postgres::PgShardStore`]: one PostgreSQL pool per shard

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use taskcenter_shared::models::activity::Activity;
use taskcenter_shared::models::member::{AccountMember, AccountRole, AddMember};
use uuid::Uuid;

use crate::error::{RegionRejection, ShardStoreError};

pub use memory::MemShardStore;
pub use postgres::PgShardStore;

pub type ShardResult<T> = Result<T, ShardStoreError>;

#[async_trait]
pub trait ShardStore: Send + Sync {
    /// Number of shards; valid indexes are `0..shard_count()`
    fn shard_count(&self) -> usize;

    /// Inserts the account together with its first member
    async fn create_account(&self, shard: i32, account: Uuid, owner: &AccountMember) -> ShardResult<()>;

    /// Removes the account with every member and activity row
    async fn delete_account(&self, shard: i32, account: Uuid) -> ShardResult<()>;

    async fn get_active_member(
        &self,
        shard: i32,
        account: Uuid,
        member: Uuid,
    ) -> ShardResult<Option<AccountMember>>;

    /// Ids from `ids` that exist on the account and are active
    async fn active_member_ids(&self, shard: i32, account: Uuid, ids: &[Uuid]) -> ShardResult<Vec<Uuid>>;

    /// Ids from `ids` that exist on the account but are inactive
    async fn inactive_member_ids(&self, shard: i32, account: Uuid, ids: &[Uuid]) -> ShardResult<Vec<Uuid>>;

    /// Inserts brand-new member rows
    async fn add_members(&self, shard: i32, account: Uuid, members: &[AccountMember]) -> ShardResult<()>;

    /// Overwrites name and role of inactive rows and marks them active
    async fn update_members_and_set_active(
        &self,
        shard: i32,
        account: Uuid,
        members: &[AddMember],
    ) -> ShardResult<()>;

    async fn total_owner_count(&self, shard: i32, account: Uuid) -> ShardResult<u64>;

    /// Applies [`removal_verdict`] to the account's current rows and, when
    /// it passes, marks `ids` inactive. Check and write are one step per
    /// account, so concurrent removals are decided one after the other.
    ///
    /// Returns the ids that were active before.
    async fn deactivate_members(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        ids: &[Uuid],
    ) -> ShardResult<Result<Vec<Uuid>, RegionRejection>>;

    async fn set_member_deleted(&self, shard: i32, account: Uuid, member: Uuid) -> ShardResult<()>;

    async fn rename_member(&self, shard: i32, account: Uuid, member: Uuid, name: &str) -> ShardResult<()>;

    /// Active members ordered by name, plus the total active count
    async fn get_members(
        &self,
        shard: i32,
        account: Uuid,
        offset: u64,
        limit: u64,
    ) -> ShardResult<(Vec<AccountMember>, u64)>;

    async fn log_activities(&self, shard: i32, activities: &[Activity]) -> ShardResult<()>;

    /// Most recent activity first
    async fn get_activities(&self, shard: i32, account: Uuid, limit: u64) -> ShardResult<Vec<Activity>>;
}

/// Removal rules over one consistent view of an account
///
/// `ids` must be free of duplicates. `owners_in_set` counts the active
/// owners among them.
pub fn removal_verdict(
    actor: Uuid,
    actor_role: Option<AccountRole>,
    ids: &[Uuid],
    total_owners: u64,
    owners_in_set: u64,
) -> Result<(), RegionRejection> {
    match actor_role {
        Some(AccountRole::Owner) if total_owners <= owners_in_set => Err(RegionRejection::ZeroOwnerCount),
        Some(AccountRole::Owner) => Ok(()),
        Some(AccountRole::Admin) if owners_in_set > 0 => Err(RegionRejection::InsufficientPermission),
        Some(AccountRole::Admin) => Ok(()),
        _ if ids.len() == 1 && ids[0] == actor => Ok(()),
        _ => Err(RegionRejection::InsufficientPermission),
    }
}
