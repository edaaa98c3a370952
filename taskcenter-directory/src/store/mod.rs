/// Central directory persistence
///
/// Users and orgs share one account table and one case-insensitive name
/// namespace. The membership index only records which users belong to which
/// orgs; roles live in the region that hosts the org.
///
/// - [`memory::MemStore`]: all state behind one `RwLock`, copy-in/copy-out
/// - [`postgres::PgStore`]: sqlx over the directory migrations

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use taskcenter_shared::models::account::{Account, FullUserInfo, Org};
use taskcenter_shared::models::credentials::PwdInfo;
use uuid::Uuid;

pub use memory::MemStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Name already in use")]
    NameTaken,

    #[error("Email already in use")]
    EmailTaken,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Single-use codes mailed to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCode {
    Activation,
    ResetPwd,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Case-insensitive lookup across users and orgs
    async fn get_account_by_name(&self, name: &str) -> StoreResult<Option<Account>>;

    /// Inserts the user and its credentials; fails on a taken name or email
    async fn create_user(&self, user: &FullUserInfo, pwd: &PwdInfo) -> StoreResult<()>;

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<FullUserInfo>>;

    /// Case-insensitive
    async fn get_user_by_name(&self, name: &str) -> StoreResult<Option<FullUserInfo>>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<FullUserInfo>>;

    async fn update_user(&self, user: &FullUserInfo) -> StoreResult<()>;

    /// Consumes `code` for the user behind `email` in one step and returns the
    /// user as it was before. `None` when the code does not match. A reset
    /// code also consumes a pending activation code, so of two racing callers
    /// only one ever sees the activation.
    async fn claim_code(&self, email: &str, kind: UserCode, code: &str) -> StoreResult<Option<FullUserInfo>>;

    /// Removes the user, its credentials and its membership rows
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn get_pwd_info(&self, id: Uuid) -> StoreResult<Option<PwdInfo>>;

    async fn update_pwd_info(&self, id: Uuid, pwd: &PwdInfo) -> StoreResult<()>;

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>>;

    /// Users whose name starts with `prefix` (case-insensitive), ordered by name
    async fn search_users(&self, prefix: &str, limit: u64) -> StoreResult<Vec<Account>>;

    /// Inserts the org together with the owner's membership row
    async fn create_org_and_membership(&self, org: &Org, owner: Uuid) -> StoreResult<()>;

    async fn get_org(&self, id: Uuid) -> StoreResult<Option<Org>>;

    async fn get_orgs(&self, ids: &[Uuid]) -> StoreResult<Vec<Org>>;

    async fn update_org(&self, org: &Org) -> StoreResult<()>;

    /// Removes the org and all of its membership rows
    async fn delete_org(&self, id: Uuid) -> StoreResult<()>;

    async fn search_orgs(&self, prefix: &str, limit: u64) -> StoreResult<Vec<Org>>;

    /// Orgs `user` belongs to, ordered by name, plus the total count
    async fn get_users_orgs(&self, user: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Org>, u64)>;

    async fn has_membership(&self, org: Uuid, member: Uuid) -> StoreResult<bool>;

    async fn membership_count(&self, org: Uuid) -> StoreResult<u64>;

    async fn create_memberships(&self, org: Uuid, members: &[Uuid]) -> StoreResult<()>;

    async fn delete_memberships(&self, org: Uuid, members: &[Uuid]) -> StoreResult<()>;
}
