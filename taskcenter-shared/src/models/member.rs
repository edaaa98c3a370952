/// Region-local account members
///
/// Every task center keeps its own member list, with a denormalized copy of
/// each member's name. Removal is a soft delete: the row stays with
/// `is_active = false` so a later re-add can reactivate it.
///
/// # Database Schema
///
/// ```sql
/// CREATE TABLE account_members (
///     account UUID NOT NULL,
///     id UUID NOT NULL,
///     name TEXT NOT NULL,
///     role SMALLINT NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
///     PRIMARY KEY (account, id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a member within an account
///
/// Stored as its discriminant. Lower values carry more privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Full control, including over other owners
    Owner = 0,

    /// Manages members, but cannot grant or remove ownership
    Admin = 1,

    /// Works on every project of the account
    MemberOfAllProjects = 2,

    /// Works only on projects they were added to
    MemberOfOnlySpecificProjects = 3,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Owner => "owner",
            AccountRole::Admin => "admin",
            AccountRole::MemberOfAllProjects => "member_of_all_projects",
            AccountRole::MemberOfOnlySpecificProjects => "member_of_only_specific_projects",
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, AccountRole::Owner)
    }

    /// Owners and admins may add and remove members
    pub fn can_manage_members(&self) -> bool {
        matches!(self, AccountRole::Owner | AccountRole::Admin)
    }
}

impl TryFrom<i16> for AccountRole {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AccountRole::Owner),
            1 => Ok(AccountRole::Admin),
            2 => Ok(AccountRole::MemberOfAllProjects),
            3 => Ok(AccountRole::MemberOfOnlySpecificProjects),
            other => Err(other),
        }
    }
}

/// A member row of one account on one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountMember {
    pub id: Uuid,
    pub name: String,
    pub role: AccountRole,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl AccountMember {
    /// Creates an active member
    pub fn new(id: Uuid, name: String, role: AccountRole) -> Self {
        Self {
            id,
            name,
            role,
            is_active: true,
            is_deleted: false,
        }
    }

    /// Whether this member counts toward the owner invariant
    pub fn is_active_owner(&self) -> bool {
        self.is_active && self.role.is_owner()
    }
}

/// Input for adding (or reactivating) a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMember {
    pub id: Uuid,
    pub name: String,
    pub role: AccountRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(AccountRole::Owner.can_manage_members());
        assert!(AccountRole::Admin.can_manage_members());
        assert!(!AccountRole::MemberOfAllProjects.can_manage_members());
        assert!(!AccountRole::MemberOfOnlySpecificProjects.can_manage_members());
        assert!(AccountRole::Owner.is_owner());
        assert!(!AccountRole::Admin.is_owner());
    }

    #[test]
    fn test_role_discriminants_round_trip() {
        for role in [
            AccountRole::Owner,
            AccountRole::Admin,
            AccountRole::MemberOfAllProjects,
            AccountRole::MemberOfOnlySpecificProjects,
        ] {
            assert_eq!(AccountRole::try_from(role as i16), Ok(role));
        }
        assert_eq!(AccountRole::try_from(9), Err(9));
    }

    #[test]
    fn test_inactive_owner_does_not_count() {
        let mut member = AccountMember::new(Uuid::new_v4(), "ali".to_string(), AccountRole::Owner);
        assert!(member.is_active_owner());

        member.is_active = false;
        assert!(!member.is_active_owner());
    }
}
