/// Region-local membership operations
///
/// `RegionPrivateApi` is the only writer of a region's member rows. It
/// enforces the role rules and the owner invariant: every account keeps at
/// least one active owner after any member change. Deleting the account
/// itself is the only way to drop below one.
///
/// Removal rules by actor role:
///
/// | actor | may remove |
/// |---|---|
/// | owner | anyone, while at least one owner remains |
/// | admin | anyone who is not an owner |
/// | other / non-member | only themselves |

use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use taskcenter_shared::models::activity::{Activity, ACTION_ADDED, ACTION_REMOVED};
use taskcenter_shared::models::member::{AccountMember, AccountRole, AddMember};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RegionFailure, RegionOutcome, RegionRejection, ShardStoreError};
use crate::store::ShardStore;

type Checked<T> = Result<Result<T, RegionRejection>, ShardStoreError>;

pub struct RegionPrivateApi {
    region: String,
    store: Arc<dyn ShardStore>,
    max_process_entity_count: usize,
}

impl RegionPrivateApi {
    pub fn new(region: impl Into<String>, store: Arc<dyn ShardStore>, max_process_entity_count: usize) -> Self {
        Self {
            region: region.into(),
            store,
            max_process_entity_count,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Creates an account on a random shard, seeded with one active owner
    ///
    /// Returns the shard the account was placed on.
    pub async fn create_account(&self, id: Uuid, owner_id: Uuid, owner_name: &str) -> Result<i32, RegionFailure> {
        let shard_count = self.store.shard_count();
        if shard_count == 0 {
            return Err(RegionFailure::NoShards(self.region.clone()));
        }
        let shard = rand::thread_rng().gen_range(0..shard_count) as i32;

        let owner = AccountMember::new(owner_id, owner_name.to_string(), AccountRole::Owner);
        self.store.create_account(shard, id, &owner).await?;
        self.store
            .log_activities(shard, &[Activity::account_created(id, owner_id)])
            .await?;

        info!(region = %self.region, shard, account = %id, owner = %owner_id, "Task center created");
        Ok(shard)
    }

    /// Deletes the account and everything on it
    ///
    /// Anyone but the account itself must be an owner.
    pub async fn delete_account(&self, shard: i32, account: Uuid, actor: Uuid) -> RegionOutcome<()> {
        self.delete_account_checked(shard, account, actor).await.into()
    }

    async fn delete_account_checked(&self, shard: i32, account: Uuid, actor: Uuid) -> Checked<()> {
        if actor != account {
            let role = self.active_role(shard, account, actor).await?;
            if role != Some(AccountRole::Owner) {
                return Ok(Err(RegionRejection::InsufficientPermission));
            }
        }

        self.store.delete_account(shard, account).await?;
        info!(region = %self.region, shard, account = %account, actor = %actor, "Task center deleted");
        Ok(Ok(()))
    }

    /// Adds new members and reactivates previously removed ones
    ///
    /// Members that are already active are left as they are, so re-adding
    /// an owner never demotes them.
    pub async fn add_members(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        members: Vec<AddMember>,
    ) -> RegionOutcome<()> {
        self.add_members_checked(shard, account, actor, members).await.into()
    }

    async fn add_members_checked(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        members: Vec<AddMember>,
    ) -> Checked<()> {
        if account == actor {
            return Ok(Err(RegionRejection::InvalidOperation));
        }
        if members.len() > self.max_process_entity_count {
            return Ok(Err(RegionRejection::MaxEntityCountExceeded));
        }
        if members.is_empty() {
            return Ok(Ok(()));
        }

        let actor_role = match self.active_role(shard, account, actor).await? {
            Some(role) if role.can_manage_members() => role,
            _ => return Ok(Err(RegionRejection::InsufficientPermission)),
        };
        if !actor_role.is_owner() && members.iter().any(|m| m.role.is_owner()) {
            warn!(region = %self.region, account = %account, actor = %actor, "Non-owner tried to grant ownership");
            return Ok(Err(RegionRejection::InsufficientPermission));
        }

        let mut seen = HashSet::new();
        let members: Vec<AddMember> = members.into_iter().filter(|m| seen.insert(m.id)).collect();
        let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();

        let active: HashSet<Uuid> = self.store.active_member_ids(shard, account, &ids).await?.into_iter().collect();
        let inactive: HashSet<Uuid> = self.store.inactive_member_ids(shard, account, &ids).await?.into_iter().collect();

        let mut reactivate = Vec::new();
        let mut insert = Vec::new();
        for member in members {
            if active.contains(&member.id) {
                continue;
            }
            if inactive.contains(&member.id) {
                reactivate.push(member);
            } else {
                insert.push(AccountMember::new(member.id, member.name, member.role));
            }
        }

        if !reactivate.is_empty() {
            self.store.update_members_and_set_active(shard, account, &reactivate).await?;
        }
        if !insert.is_empty() {
            self.store.add_members(shard, account, &insert).await?;
        }

        let affected: Vec<(Uuid, String)> = reactivate
            .iter()
            .map(|m| (m.id, m.name.clone()))
            .chain(insert.iter().map(|m| (m.id, m.name.clone())))
            .collect();
        self.log_member_batch(shard, account, actor, &affected, ACTION_ADDED).await?;

        debug!(
            region = %self.region,
            account = %account,
            reactivated = reactivate.len(),
            inserted = insert.len(),
            "Members added"
        );
        Ok(Ok(()))
    }

    /// Soft-deletes members, subject to the removal rules above
    pub async fn remove_members(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        members: Vec<Uuid>,
    ) -> RegionOutcome<()> {
        self.remove_members_checked(shard, account, actor, members).await.into()
    }

    async fn remove_members_checked(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        members: Vec<Uuid>,
    ) -> Checked<()> {
        if account == actor || members.contains(&account) {
            return Ok(Err(RegionRejection::InvalidOperation));
        }
        if members.len() > self.max_process_entity_count {
            return Ok(Err(RegionRejection::MaxEntityCountExceeded));
        }

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = members.into_iter().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Ok(Ok(()));
        }

        let removed = match self.store.deactivate_members(shard, account, actor, &ids).await? {
            Ok(removed) => removed,
            Err(rejection) => {
                if rejection.is_invariant_violation() {
                    warn!(region = %self.region, account = %account, actor = %actor, "Removal would leave no owner");
                }
                return Ok(Err(rejection));
            }
        };
        let affected: Vec<(Uuid, String)> = removed.into_iter().map(|id| (id, String::new())).collect();
        self.log_member_batch(shard, account, actor, &affected, ACTION_REMOVED).await?;

        debug!(region = %self.region, account = %account, removed = affected.len(), "Members removed");
        Ok(Ok(()))
    }

    /// Marks a member whose user account is being deleted
    pub async fn set_member_deleted(&self, shard: i32, account: Uuid, member: Uuid) -> Result<(), RegionFailure> {
        self.store.set_member_deleted(shard, account, member).await?;
        Ok(())
    }

    pub async fn rename_member(
        &self,
        shard: i32,
        account: Uuid,
        member: Uuid,
        new_name: &str,
    ) -> Result<(), RegionFailure> {
        self.store.rename_member(shard, account, member, new_name).await?;
        Ok(())
    }

    /// True when `member` is the account itself or its sole active owner
    pub async fn member_is_only_account_owner(
        &self,
        shard: i32,
        account: Uuid,
        member: Uuid,
    ) -> Result<bool, RegionFailure> {
        if member == account {
            return Ok(true);
        }
        if self.active_role(shard, account, member).await? != Some(AccountRole::Owner) {
            return Ok(false);
        }
        Ok(self.store.total_owner_count(shard, account).await? == 1)
    }

    /// True when `member` is the account itself or one of its active owners
    pub async fn member_is_account_owner(
        &self,
        shard: i32,
        account: Uuid,
        member: Uuid,
    ) -> Result<bool, RegionFailure> {
        if member == account {
            return Ok(true);
        }
        Ok(self.active_role(shard, account, member).await? == Some(AccountRole::Owner))
    }

    /// Lists active members; the actor must be one of them
    pub async fn get_members(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        offset: u64,
        limit: u64,
    ) -> RegionOutcome<(Vec<AccountMember>, u64)> {
        self.get_members_checked(shard, account, actor, offset, limit).await.into()
    }

    async fn get_members_checked(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        offset: u64,
        limit: u64,
    ) -> Checked<(Vec<AccountMember>, u64)> {
        if actor != account && self.active_role(shard, account, actor).await?.is_none() {
            return Ok(Err(RegionRejection::InsufficientPermission));
        }
        Ok(Ok(self.store.get_members(shard, account, offset, limit).await?))
    }

    pub async fn get_activities(&self, shard: i32, account: Uuid, limit: u64) -> Result<Vec<Activity>, RegionFailure> {
        Ok(self.store.get_activities(shard, account, limit).await?)
    }

    async fn active_role(&self, shard: i32, account: Uuid, member: Uuid) -> Result<Option<AccountRole>, ShardStoreError> {
        Ok(self
            .store
            .get_active_member(shard, account, member)
            .await?
            .map(|m| m.role))
    }

    async fn log_member_batch(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        affected: &[(Uuid, String)],
        action: &str,
    ) -> Result<(), ShardStoreError> {
        if affected.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = affected.iter().map(|(id, _)| *id).collect();
        let mut activities = Activity::member_batch(account, actor, &ids, action);
        for (activity, (_, name)) in activities.iter_mut().zip(affected) {
            activity.item_name = name.clone();
        }
        self.store.log_activities(shard, &activities).await
    }
}
