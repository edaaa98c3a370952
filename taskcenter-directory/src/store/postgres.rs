/// PostgreSQL directory store
///
/// Name and email uniqueness are enforced by unique indexes; violations are
/// mapped back to [`StoreError::NameTaken`] and [`StoreError::EmailTaken`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use taskcenter_shared::models::account::{Account, FullUserInfo, Org, User};
use taskcenter_shared::models::credentials::{KdfParams, PwdInfo};
use tracing::debug;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, UserCode};

const NAME_INDEX: &str = "idx_accounts_name_lower";
const EMAIL_INDEX: &str = "idx_users_email";

const ACCOUNT_COLUMNS: &str = "a.id, a.name, a.region, a.new_region, a.shard, a.is_user, a.created";

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    region: String,
    new_region: Option<String>,
    shard: i32,
    is_user: bool,
    created: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            name: row.name,
            region: row.region,
            new_region: row.new_region,
            shard: row.shard,
            is_user: row.is_user,
            created: row.created,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    #[sqlx(flatten)]
    account: AccountRow,
    email: String,
    new_email: Option<String>,
    activation_code: Option<String>,
    activated: Option<DateTime<Utc>>,
    new_email_confirmation_code: Option<String>,
    reset_pwd_code: Option<String>,
}

impl From<UserRow> for FullUserInfo {
    fn from(row: UserRow) -> Self {
        FullUserInfo {
            user: User {
                account: row.account.into(),
                email: row.email,
                new_email: row.new_email,
            },
            activation_code: row.activation_code,
            activated: row.activated,
            new_email_confirmation_code: row.new_email_confirmation_code,
            reset_pwd_code: row.reset_pwd_code,
        }
    }
}

#[derive(Debug, FromRow)]
struct PwdRow {
    salt: Vec<u8>,
    hash: Vec<u8>,
    m_cost: i32,
    t_cost: i32,
    p_cost: i32,
    key_len: i32,
}

impl From<PwdRow> for PwdInfo {
    fn from(row: PwdRow) -> Self {
        PwdInfo {
            salt: row.salt,
            hash: row.hash,
            params: KdfParams {
                m_cost: row.m_cost as u32,
                t_cost: row.t_cost as u32,
                p_cost: row.p_cost as u32,
                key_len: row.key_len as u32,
            },
        }
    }
}

fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some(NAME_INDEX) => return StoreError::NameTaken,
            Some(EMAIL_INDEX) => return StoreError::EmailTaken,
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn user_query(filter: &str) -> String {
    format!(
        "SELECT {ACCOUNT_COLUMNS}, u.email, u.new_email, u.activation_code, u.activated,
                u.new_email_confirmation_code, u.reset_pwd_code
         FROM accounts a JOIN users u ON u.id = a.id
         WHERE {filter}"
    )
}

/// Escapes LIKE wildcards so user input only ever matches literally
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{}%", escaped.to_lowercase())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_account(tx: &mut Transaction<'_, Postgres>, account: &Account) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO accounts (id, name, region, new_region, shard, is_user, created)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.region)
        .bind(&account.new_region)
        .bind(account.shard)
        .bind(account.is_user)
        .bind(account.created)
        .execute(&mut **tx)
        .await
        .map_err(map_unique)?;
        Ok(())
    }

    async fn update_account(tx: &mut Transaction<'_, Postgres>, account: &Account) -> StoreResult<()> {
        sqlx::query(
            "UPDATE accounts SET name = $2, region = $3, new_region = $4, shard = $5
             WHERE id = $1",
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.region)
        .bind(&account.new_region)
        .bind(account.shard)
        .execute(&mut **tx)
        .await
        .map_err(map_unique)?;
        Ok(())
    }

    async fn search(&self, prefix: &str, limit: u64, is_user: bool) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a
             WHERE a.is_user = $1 AND LOWER(a.name) LIKE $2
             ORDER BY LOWER(a.name), a.id
             LIMIT $3"
        ))
        .bind(is_user)
        .bind(like_prefix(prefix))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn get_accounts(&self, ids: &[Uuid], is_user: bool) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.is_user = $1 AND a.id = ANY($2)"
        ))
        .bind(is_user)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_account_by_name(&self, name: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE LOWER(a.name) = LOWER($1)"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn create_user(&self, user: &FullUserInfo, pwd: &PwdInfo) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_account(&mut tx, user.account()).await?;

        sqlx::query(
            "INSERT INTO users (id, email, new_email, activation_code, activated,
                                new_email_confirmation_code, reset_pwd_code)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id())
        .bind(user.email())
        .bind(&user.user.new_email)
        .bind(&user.activation_code)
        .bind(user.activated)
        .bind(&user.new_email_confirmation_code)
        .bind(&user.reset_pwd_code)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        sqlx::query(
            "INSERT INTO pwd_infos (id, salt, hash, m_cost, t_cost, p_cost, key_len)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id())
        .bind(&pwd.salt)
        .bind(&pwd.hash)
        .bind(pwd.params.m_cost as i32)
        .bind(pwd.params.t_cost as i32)
        .bind(pwd.params.p_cost as i32)
        .bind(pwd.params.key_len as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = %user.id(), "Stored user");
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<FullUserInfo>> {
        let row = sqlx::query_as::<_, UserRow>(&user_query("a.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(FullUserInfo::from))
    }

    async fn get_user_by_name(&self, name: &str) -> StoreResult<Option<FullUserInfo>> {
        let row = sqlx::query_as::<_, UserRow>(&user_query("LOWER(a.name) = LOWER($1)"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(FullUserInfo::from))
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<FullUserInfo>> {
        let row = sqlx::query_as::<_, UserRow>(&user_query("u.email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(FullUserInfo::from))
    }

    async fn update_user(&self, user: &FullUserInfo) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::update_account(&mut tx, user.account()).await?;

        sqlx::query(
            "UPDATE users SET email = $2, new_email = $3, activation_code = $4, activated = $5,
                              new_email_confirmation_code = $6, reset_pwd_code = $7
             WHERE id = $1",
        )
        .bind(user.id())
        .bind(user.email())
        .bind(&user.user.new_email)
        .bind(&user.activation_code)
        .bind(user.activated)
        .bind(&user.new_email_confirmation_code)
        .bind(&user.reset_pwd_code)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        tx.commit().await?;
        Ok(())
    }

    async fn claim_code(&self, email: &str, kind: UserCode, code: &str) -> StoreResult<Option<FullUserInfo>> {
        let (filter, clear) = match kind {
            UserCode::Activation => (
                "u.email = $1 AND u.activation_code = $2",
                "UPDATE users SET activation_code = NULL WHERE id = $1",
            ),
            UserCode::ResetPwd => (
                "u.email = $1 AND u.reset_pwd_code = $2",
                "UPDATE users SET reset_pwd_code = NULL, activation_code = NULL WHERE id = $1",
            ),
        };

        // A waiting claimant re-evaluates the filter once the lock holder
        // commits, and then finds nothing.
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, UserRow>(&format!("{} FOR UPDATE OF u", user_query(filter)))
            .bind(email)
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(prior) = row.map(FullUserInfo::from) else {
            return Ok(None);
        };

        sqlx::query(clear).bind(prior.id()).execute(&mut *tx).await?;
        tx.commit().await?;
        debug!(user_id = %prior.id(), ?kind, "Claimed code");
        Ok(Some(prior))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        // users, pwd_infos and memberships cascade from accounts
        sqlx::query("DELETE FROM accounts WHERE id = $1 AND is_user = TRUE")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_pwd_info(&self, id: Uuid) -> StoreResult<Option<PwdInfo>> {
        let row = sqlx::query_as::<_, PwdRow>(
            "SELECT salt, hash, m_cost, t_cost, p_cost, key_len FROM pwd_infos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PwdInfo::from))
    }

    async fn update_pwd_info(&self, id: Uuid, pwd: &PwdInfo) -> StoreResult<()> {
        sqlx::query(
            "UPDATE pwd_infos SET salt = $2, hash = $3, m_cost = $4, t_cost = $5, p_cost = $6, key_len = $7
             WHERE id = $1",
        )
        .bind(id)
        .bind(&pwd.salt)
        .bind(&pwd.hash)
        .bind(pwd.params.m_cost as i32)
        .bind(pwd.params.t_cost as i32)
        .bind(pwd.params.p_cost as i32)
        .bind(pwd.params.key_len as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
        self.get_accounts(ids, true).await
    }

    async fn search_users(&self, prefix: &str, limit: u64) -> StoreResult<Vec<Account>> {
        self.search(prefix, limit, true).await
    }

    async fn create_org_and_membership(&self, org: &Org, owner: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_account(&mut tx, org).await?;
        sqlx::query("INSERT INTO memberships (org, member) VALUES ($1, $2)")
            .bind(org.id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_org(&self, id: Uuid) -> StoreResult<Option<Org>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.id = $1 AND a.is_user = FALSE"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn get_orgs(&self, ids: &[Uuid]) -> StoreResult<Vec<Org>> {
        self.get_accounts(ids, false).await
    }

    async fn update_org(&self, org: &Org) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::update_account(&mut tx, org).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_org(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM accounts WHERE id = $1 AND is_user = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_orgs(&self, prefix: &str, limit: u64) -> StoreResult<Vec<Org>> {
        self.search(prefix, limit, false).await
    }

    async fn get_users_orgs(&self, user: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Org>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE member = $1")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a
             JOIN memberships m ON m.org = a.id
             WHERE m.member = $1
             ORDER BY LOWER(a.name), a.id
             OFFSET $2 LIMIT $3"
        ))
        .bind(user)
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Account::from).collect(), total as u64))
    }

    async fn has_membership(&self, org: Uuid, member: Uuid) -> StoreResult<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM memberships WHERE org = $1 AND member = $2)")
                .bind(org)
                .bind(member)
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }

    async fn membership_count(&self, org: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE org = $1")
            .bind(org)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn create_memberships(&self, org: Uuid, members: &[Uuid]) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO memberships (org, member)
             SELECT $1, member FROM UNNEST($2::uuid[]) AS member
             ON CONFLICT DO NOTHING",
        )
        .bind(org)
        .bind(members)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_memberships(&self, org: Uuid, members: &[Uuid]) -> StoreResult<()> {
        sqlx::query("DELETE FROM memberships WHERE org = $1 AND member = ANY($2)")
            .bind(org)
            .bind(members)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("Ali"), "ali%");
        assert_eq!(like_prefix("a_%"), "a\\_\\%%");
    }
}
