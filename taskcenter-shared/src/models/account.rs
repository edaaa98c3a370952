/// Account models for the central directory
///
/// Users and orgs share one record shape (`Account`) and one name namespace.
/// A user additionally carries an email address and the single-use codes that
/// drive its lifecycle (`FullUserInfo`).
///
/// # Database Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY,
///     name TEXT NOT NULL,
///     region TEXT NOT NULL,
///     new_region TEXT,
///     shard INTEGER NOT NULL DEFAULT -1,
///     is_user BOOLEAN NOT NULL,
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX idx_accounts_name_lower ON accounts (LOWER(name));
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
///     email TEXT NOT NULL UNIQUE,
///     new_email TEXT,
///     activation_code TEXT,
///     activated TIMESTAMPTZ,
///     new_email_confirmation_code TEXT,
///     reset_pwd_code TEXT
/// );
/// ```
///
/// # Lifecycle
///
/// ```text
/// register ──> unactivated (activation_code set, shard = -1)
///                 │
///                 └─ activate / set new pwd from reset ──> activated (code cleared, shard assigned)
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shard value of an account whose task center has not been provisioned yet
pub const UNPROVISIONED_SHARD: i32 = -1;

/// An account, either a user or an org
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique identifier, generated once
    pub id: Uuid,

    /// Display name, unique case-insensitively across users and orgs
    pub name: String,

    /// Region hosting the account's task center
    pub region: String,

    /// Target region of a pending migration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_region: Option<String>,

    /// Shard index within the region, or `UNPROVISIONED_SHARD`
    pub shard: i32,

    /// Whether this account is a user (as opposed to an org)
    pub is_user: bool,

    /// When the account was created
    pub created: DateTime<Utc>,
}

/// Orgs use the plain account record with `is_user == false`
pub type Org = Account;

impl Account {
    /// Creates a user account record in the unprovisioned state
    pub fn new_user(id: Uuid, name: String, region: String) -> Self {
        Self::new(id, name, region, true)
    }

    /// Creates an org account record in the unprovisioned state
    pub fn new_org(id: Uuid, name: String, region: String) -> Self {
        Self::new(id, name, region, false)
    }

    fn new(id: Uuid, name: String, region: String, is_user: bool) -> Self {
        Self {
            id,
            name,
            region,
            new_region: None,
            shard: UNPROVISIONED_SHARD,
            is_user,
            created: Utc::now(),
        }
    }

    /// Whether the account's task center exists in its region
    pub fn is_provisioned(&self) -> bool {
        self.shard != UNPROVISIONED_SHARD
    }

    /// Whether the account is moving to another region
    pub fn is_migrating(&self) -> bool {
        self.new_region.is_some()
    }
}

/// A user as seen by the user themselves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub account: Account,

    /// Confirmed email address
    pub email: String,

    /// Email address awaiting confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_email: Option<String>,
}

/// Directory-internal user record
///
/// The optional fields double as state flags: a present `activation_code`
/// means the user has not activated yet, a present `reset_pwd_code` means a
/// password reset is outstanding, and so on. Each code is single-use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullUserInfo {
    pub user: User,
    pub activation_code: Option<String>,
    pub activated: Option<DateTime<Utc>>,
    pub new_email_confirmation_code: Option<String>,
    pub reset_pwd_code: Option<String>,
}

impl FullUserInfo {
    /// Creates a freshly registered, unactivated user
    pub fn new_registered(
        id: Uuid,
        name: String,
        email: String,
        region: String,
        activation_code: String,
    ) -> Self {
        Self {
            user: User {
                account: Account::new_user(id, name, region),
                email,
                new_email: None,
            },
            activation_code: Some(activation_code),
            activated: None,
            new_email_confirmation_code: None,
            reset_pwd_code: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.user.account.id
    }

    pub fn name(&self) -> &str {
        &self.user.account.name
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }

    pub fn account(&self) -> &Account {
        &self.user.account
    }

    pub fn is_activated(&self) -> bool {
        self.activated.is_some()
    }

    /// Marks the user activated on the given shard and consumes the activation code
    pub fn mark_activated(&mut self, shard: i32) {
        self.user.account.shard = shard;
        self.activation_code = None;
        self.activated = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accounts_are_unprovisioned() {
        let user = Account::new_user(Uuid::new_v4(), "ali".to_string(), "us".to_string());
        let org = Account::new_org(Uuid::new_v4(), "acme".to_string(), "us".to_string());

        assert!(user.is_user);
        assert!(!org.is_user);
        assert!(!user.is_provisioned());
        assert!(!org.is_provisioned());
        assert!(!org.is_migrating());
    }

    #[test]
    fn test_mark_activated_consumes_code() {
        let mut user = FullUserInfo::new_registered(
            Uuid::new_v4(),
            "ali".to_string(),
            "ali@x.com".to_string(),
            "us".to_string(),
            "code".to_string(),
        );
        assert!(!user.is_activated());

        user.mark_activated(3);

        assert!(user.is_activated());
        assert!(user.activation_code.is_none());
        assert_eq!(user.account().shard, 3);
    }

    #[test]
    fn test_user_serializes_flat_without_codes() {
        let info = FullUserInfo::new_registered(
            Uuid::new_v4(),
            "ali".to_string(),
            "ali@x.com".to_string(),
            "us".to_string(),
            "secret-code".to_string(),
        );

        let json = serde_json::to_value(&info.user).unwrap();
        assert_eq!(json["name"], "ali");
        assert_eq!(json["email"], "ali@x.com");
        assert_eq!(json["shard"], -1);
        assert!(json.get("newEmail").is_none());
        assert!(!json.to_string().contains("secret-code"));
    }
}
