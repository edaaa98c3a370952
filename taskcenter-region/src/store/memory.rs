/// In-memory shard store
///
/// All shards live behind a single `RwLock`. Rows are cloned on the way in and
/// on the way out, so callers never share state with the store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use taskcenter_shared::models::activity::Activity;
use taskcenter_shared::models::member::{AccountMember, AddMember};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{removal_verdict, ShardResult, ShardStore};
use crate::error::{RegionRejection, ShardStoreError};

#[derive(Debug, Default)]
struct AccountData {
    members: HashMap<Uuid, AccountMember>,
    activities: Vec<Activity>,
}

#[derive(Debug, Default)]
struct Shard {
    accounts: HashMap<Uuid, AccountData>,
}

#[derive(Debug)]
pub struct MemShardStore {
    shard_count: usize,
    shards: RwLock<Vec<Shard>>,
}

impl MemShardStore {
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count).map(|_| Shard::default()).collect();
        Self {
            shard_count,
            shards: RwLock::new(shards),
        }
    }
}

fn shard_index(shards_len: usize, shard: i32) -> ShardResult<usize> {
    usize::try_from(shard)
        .ok()
        .filter(|idx| *idx < shards_len)
        .ok_or(ShardStoreError::InvalidShard(shard))
}

fn account_ref<'a>(shards: &'a [Shard], shard: i32, account: Uuid) -> ShardResult<&'a AccountData> {
    let idx = shard_index(shards.len(), shard)?;
    shards[idx]
        .accounts
        .get(&account)
        .ok_or(ShardStoreError::AccountNotFound(account))
}

fn account_mut<'a>(shards: &'a mut [Shard], shard: i32, account: Uuid) -> ShardResult<&'a mut AccountData> {
    let idx = shard_index(shards.len(), shard)?;
    shards[idx]
        .accounts
        .get_mut(&account)
        .ok_or(ShardStoreError::AccountNotFound(account))
}

#[async_trait]
impl ShardStore for MemShardStore {
    fn shard_count(&self) -> usize {
        self.shard_count
    }

    async fn create_account(&self, shard: i32, account: Uuid, owner: &AccountMember) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        let idx = shard_index(shards.len(), shard)?;
        let accounts = &mut shards[idx].accounts;
        if accounts.contains_key(&account) {
            return Err(ShardStoreError::AccountExists(account));
        }

        let mut data = AccountData::default();
        data.members.insert(owner.id, owner.clone());
        accounts.insert(account, data);
        debug!(shard, account = %account, "Created shard account");
        Ok(())
    }

    async fn delete_account(&self, shard: i32, account: Uuid) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        let idx = shard_index(shards.len(), shard)?;
        shards[idx].accounts.remove(&account);
        Ok(())
    }

    async fn get_active_member(
        &self,
        shard: i32,
        account: Uuid,
        member: Uuid,
    ) -> ShardResult<Option<AccountMember>> {
        let shards = self.shards.read().await;
        let data = account_ref(&shards, shard, account)?;
        Ok(data.members.get(&member).filter(|m| m.is_active).cloned())
    }

    async fn active_member_ids(&self, shard: i32, account: Uuid, ids: &[Uuid]) -> ShardResult<Vec<Uuid>> {
        let shards = self.shards.read().await;
        let data = account_ref(&shards, shard, account)?;
        Ok(ids
            .iter()
            .filter(|id| data.members.get(id).map(|m| m.is_active).unwrap_or(false))
            .copied()
            .collect())
    }

    async fn inactive_member_ids(&self, shard: i32, account: Uuid, ids: &[Uuid]) -> ShardResult<Vec<Uuid>> {
        let shards = self.shards.read().await;
        let data = account_ref(&shards, shard, account)?;
        Ok(ids
            .iter()
            .filter(|id| data.members.get(id).map(|m| !m.is_active).unwrap_or(false))
            .copied()
            .collect())
    }

    async fn add_members(&self, shard: i32, account: Uuid, members: &[AccountMember]) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        let data = account_mut(&mut shards, shard, account)?;
        for member in members {
            data.members.entry(member.id).or_insert_with(|| member.clone());
        }
        Ok(())
    }

    async fn update_members_and_set_active(
        &self,
        shard: i32,
        account: Uuid,
        members: &[AddMember],
    ) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        let data = account_mut(&mut shards, shard, account)?;
        for update in members {
            if let Some(row) = data.members.get_mut(&update.id).filter(|row| !row.is_active) {
                row.name = update.name.clone();
                row.role = update.role;
                row.is_active = true;
            }
        }
        Ok(())
    }

    async fn total_owner_count(&self, shard: i32, account: Uuid) -> ShardResult<u64> {
        let shards = self.shards.read().await;
        let data = account_ref(&shards, shard, account)?;
        Ok(data.members.values().filter(|m| m.is_active_owner()).count() as u64)
    }

    async fn deactivate_members(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        ids: &[Uuid],
    ) -> ShardResult<Result<Vec<Uuid>, RegionRejection>> {
        let mut shards = self.shards.write().await;
        let data = account_mut(&mut shards, shard, account)?;

        let actor_role = data.members.get(&actor).filter(|m| m.is_active).map(|m| m.role);
        let total = data.members.values().filter(|m| m.is_active_owner()).count() as u64;
        let set: HashSet<&Uuid> = ids.iter().collect();
        let in_set = set
            .iter()
            .filter(|id| data.members.get(**id).map(|m| m.is_active_owner()).unwrap_or(false))
            .count() as u64;
        if let Err(rejection) = removal_verdict(actor, actor_role, ids, total, in_set) {
            return Ok(Err(rejection));
        }

        let mut changed = Vec::new();
        for id in ids {
            if let Some(row) = data.members.get_mut(id) {
                if row.is_active {
                    row.is_active = false;
                    changed.push(*id);
                }
            }
        }
        Ok(Ok(changed))
    }

    async fn set_member_deleted(&self, shard: i32, account: Uuid, member: Uuid) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        let data = account_mut(&mut shards, shard, account)?;
        if let Some(row) = data.members.get_mut(&member) {
            row.is_active = false;
            row.is_deleted = true;
        }
        Ok(())
    }

    async fn rename_member(&self, shard: i32, account: Uuid, member: Uuid, name: &str) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        let data = account_mut(&mut shards, shard, account)?;
        if let Some(row) = data.members.get_mut(&member) {
            row.name = name.to_string();
        }
        Ok(())
    }

    async fn get_members(
        &self,
        shard: i32,
        account: Uuid,
        offset: u64,
        limit: u64,
    ) -> ShardResult<(Vec<AccountMember>, u64)> {
        let shards = self.shards.read().await;
        let data = account_ref(&shards, shard, account)?;
        let mut active: Vec<&AccountMember> = data.members.values().filter(|m| m.is_active).collect();
        active.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));

        let total = active.len() as u64;
        let page = active
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn log_activities(&self, shard: i32, activities: &[Activity]) -> ShardResult<()> {
        let mut shards = self.shards.write().await;
        for activity in activities {
            let data = account_mut(&mut shards, shard, activity.account)?;
            data.activities.push(activity.clone());
        }
        Ok(())
    }

    async fn get_activities(&self, shard: i32, account: Uuid, limit: u64) -> ShardResult<Vec<Activity>> {
        let shards = self.shards.read().await;
        let data = account_ref(&shards, shard, account)?;
        Ok(data
            .activities
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
