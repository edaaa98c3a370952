/// Data model for the Task Center directory and regions
///
/// # Models
///
/// - `account`: Accounts (users and orgs) as recorded by the central directory
/// - `credentials`: Per-user password records and the key derivation parameters behind them
/// - `member`: Region-local account members and their roles
/// - `activity`: Append-only activity rows written by region-local mutations
///
/// # Example
///
/// ```
/// use taskcenter_shared::models::account::{Account, UNPROVISIONED_SHARD};
/// use uuid::Uuid;
///
/// let org = Account::new_org(Uuid::new_v4(), "acme".to_string(), "us".to_string());
/// assert_eq!(org.shard, UNPROVISIONED_SHARD);
/// assert!(!org.is_user);
/// ```

pub mod account;
pub mod activity;
pub mod credentials;
pub mod member;
