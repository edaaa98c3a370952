/// PostgreSQL shard store
///
/// Each shard is its own database with its own pool; the shard index is the
/// position of its pool in the vector handed to [`PgShardStore::new`].

use async_trait::async_trait;
use sqlx::PgPool;
use taskcenter_shared::models::activity::Activity;
use taskcenter_shared::models::member::{AccountMember, AccountRole, AddMember};
use tracing::debug;
use uuid::Uuid;

use super::{removal_verdict, ShardResult, ShardStore};
use crate::error::{RegionRejection, ShardStoreError};

const MEMBER_COLUMNS: &str = "id, name, role, is_active, is_deleted";

#[derive(Debug, Clone)]
pub struct PgShardStore {
    pools: Vec<PgPool>,
}

impl PgShardStore {
    pub fn new(pools: Vec<PgPool>) -> Self {
        Self { pools }
    }

    fn pool(&self, shard: i32) -> ShardResult<&PgPool> {
        usize::try_from(shard)
            .ok()
            .and_then(|idx| self.pools.get(idx))
            .ok_or(ShardStoreError::InvalidShard(shard))
    }
}

#[async_trait]
impl ShardStore for PgShardStore {
    fn shard_count(&self) -> usize {
        self.pools.len()
    }

    async fn create_account(&self, shard: i32, account: Uuid, owner: &AccountMember) -> ShardResult<()> {
        let mut tx = self.pool(shard)?.begin().await?;

        let inserted = sqlx::query("INSERT INTO shard_accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(account)
            .execute(&mut *tx)
            .await?;
        if inserted.rows_affected() == 0 {
            return Err(ShardStoreError::AccountExists(account));
        }

        sqlx::query(
            "INSERT INTO account_members (account, id, name, role, is_active, is_deleted)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(account)
        .bind(owner.id)
        .bind(&owner.name)
        .bind(owner.role)
        .bind(owner.is_active)
        .bind(owner.is_deleted)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(shard, account = %account, "Created shard account");
        Ok(())
    }

    async fn delete_account(&self, shard: i32, account: Uuid) -> ShardResult<()> {
        // members and activities cascade
        sqlx::query("DELETE FROM shard_accounts WHERE id = $1")
            .bind(account)
            .execute(self.pool(shard)?)
            .await?;
        Ok(())
    }

    async fn get_active_member(
        &self,
        shard: i32,
        account: Uuid,
        member: Uuid,
    ) -> ShardResult<Option<AccountMember>> {
        let row = sqlx::query_as::<_, AccountMember>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM account_members
             WHERE account = $1 AND id = $2 AND is_active = TRUE"
        ))
        .bind(account)
        .bind(member)
        .fetch_optional(self.pool(shard)?)
        .await?;
        Ok(row)
    }

    async fn active_member_ids(&self, shard: i32, account: Uuid, ids: &[Uuid]) -> ShardResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM account_members
             WHERE account = $1 AND id = ANY($2) AND is_active = TRUE",
        )
        .bind(account)
        .bind(ids)
        .fetch_all(self.pool(shard)?)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn inactive_member_ids(&self, shard: i32, account: Uuid, ids: &[Uuid]) -> ShardResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM account_members
             WHERE account = $1 AND id = ANY($2) AND is_active = FALSE",
        )
        .bind(account)
        .bind(ids)
        .fetch_all(self.pool(shard)?)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn add_members(&self, shard: i32, account: Uuid, members: &[AccountMember]) -> ShardResult<()> {
        let mut tx = self.pool(shard)?.begin().await?;
        for member in members {
            sqlx::query(
                "INSERT INTO account_members (account, id, name, role, is_active, is_deleted)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (account, id) DO NOTHING",
            )
            .bind(account)
            .bind(member.id)
            .bind(&member.name)
            .bind(member.role)
            .bind(member.is_active)
            .bind(member.is_deleted)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_members_and_set_active(
        &self,
        shard: i32,
        account: Uuid,
        members: &[AddMember],
    ) -> ShardResult<()> {
        let mut tx = self.pool(shard)?.begin().await?;
        for member in members {
            sqlx::query(
                "UPDATE account_members SET name = $3, role = $4, is_active = TRUE
                 WHERE account = $1 AND id = $2 AND is_active = FALSE",
            )
            .bind(account)
            .bind(member.id)
            .bind(&member.name)
            .bind(member.role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn total_owner_count(&self, shard: i32, account: Uuid) -> ShardResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM account_members
             WHERE account = $1 AND is_active = TRUE AND role = 0",
        )
        .bind(account)
        .fetch_one(self.pool(shard)?)
        .await?;
        Ok(count as u64)
    }

    async fn deactivate_members(
        &self,
        shard: i32,
        account: Uuid,
        actor: Uuid,
        ids: &[Uuid],
    ) -> ShardResult<Result<Vec<Uuid>, RegionRejection>> {
        let mut tx = self.pool(shard)?.begin().await?;

        // Serializes member removals on this account until commit
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM shard_accounts WHERE id = $1 FOR UPDATE")
            .bind(account)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(ShardStoreError::AccountNotFound(account));
        }

        let actor_role: Option<AccountRole> = sqlx::query_scalar(
            "SELECT role FROM account_members
             WHERE account = $1 AND id = $2 AND is_active = TRUE",
        )
        .bind(account)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?;

        let (total, in_set): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE id = ANY($2))
             FROM account_members
             WHERE account = $1 AND is_active = TRUE AND role = 0",
        )
        .bind(account)
        .bind(ids)
        .fetch_one(&mut *tx)
        .await?;

        if let Err(rejection) = removal_verdict(actor, actor_role, ids, total as u64, in_set as u64) {
            tx.rollback().await?;
            return Ok(Err(rejection));
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE account_members SET is_active = FALSE
             WHERE account = $1 AND id = ANY($2) AND is_active = TRUE
             RETURNING id",
        )
        .bind(account)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Ok(rows.into_iter().map(|(id,)| id).collect()))
    }

    async fn set_member_deleted(&self, shard: i32, account: Uuid, member: Uuid) -> ShardResult<()> {
        sqlx::query(
            "UPDATE account_members SET is_active = FALSE, is_deleted = TRUE
             WHERE account = $1 AND id = $2",
        )
        .bind(account)
        .bind(member)
        .execute(self.pool(shard)?)
        .await?;
        Ok(())
    }

    async fn rename_member(&self, shard: i32, account: Uuid, member: Uuid, name: &str) -> ShardResult<()> {
        sqlx::query("UPDATE account_members SET name = $3 WHERE account = $1 AND id = $2")
            .bind(account)
            .bind(member)
            .bind(name)
            .execute(self.pool(shard)?)
            .await?;
        Ok(())
    }

    async fn get_members(
        &self,
        shard: i32,
        account: Uuid,
        offset: u64,
        limit: u64,
    ) -> ShardResult<(Vec<AccountMember>, u64)> {
        let pool = self.pool(shard)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM account_members WHERE account = $1 AND is_active = TRUE",
        )
        .bind(account)
        .fetch_one(pool)
        .await?;

        let members = sqlx::query_as::<_, AccountMember>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM account_members
             WHERE account = $1 AND is_active = TRUE
             ORDER BY LOWER(name), id
             OFFSET $2 LIMIT $3"
        ))
        .bind(account)
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

        Ok((members, total as u64))
    }

    async fn log_activities(&self, shard: i32, activities: &[Activity]) -> ShardResult<()> {
        let mut tx = self.pool(shard)?.begin().await?;
        for activity in activities {
            sqlx::query(
                "INSERT INTO account_activities
                    (account, occurred_on, member, item, item_type, item_name, action, new_value)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(activity.account)
            .bind(activity.occurred_on)
            .bind(activity.member)
            .bind(activity.item)
            .bind(&activity.item_type)
            .bind(&activity.item_name)
            .bind(&activity.action)
            .bind(&activity.new_value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_activities(&self, shard: i32, account: Uuid, limit: u64) -> ShardResult<Vec<Activity>> {
        let rows = sqlx::query_as::<_, Activity>(
            "SELECT account, occurred_on, member, item, item_type, item_name, action, new_value
             FROM account_activities
             WHERE account = $1
             ORDER BY occurred_on DESC
             LIMIT $2",
        )
        .bind(account)
        .bind(limit as i64)
        .fetch_all(self.pool(shard)?)
        .await?;
        Ok(rows)
    }
}
