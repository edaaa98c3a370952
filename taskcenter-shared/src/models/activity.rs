/// Append-only activity log rows written by region-local mutations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ITEM_TYPE_ACCOUNT: &str = "account";
pub const ITEM_TYPE_MEMBER: &str = "member";

pub const ACTION_CREATED: &str = "created";
pub const ACTION_ADDED: &str = "added";
pub const ACTION_REMOVED: &str = "removed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub account: Uuid,
    pub occurred_on: DateTime<Utc>,
    /// Member who performed the action
    pub member: Uuid,
    pub item: Uuid,
    pub item_type: String,
    pub item_name: String,
    pub action: String,
    pub new_value: Option<String>,
}

impl Activity {
    pub fn account_created(account: Uuid, actor: Uuid) -> Self {
        Self {
            account,
            occurred_on: Utc::now(),
            member: actor,
            item: account,
            item_type: ITEM_TYPE_ACCOUNT.to_string(),
            item_name: String::new(),
            action: ACTION_CREATED.to_string(),
            new_value: None,
        }
    }

    /// One row per affected member, all stamped with the same time
    pub fn member_batch(account: Uuid, actor: Uuid, members: &[Uuid], action: &str) -> Vec<Self> {
        let occurred_on = Utc::now();
        members
            .iter()
            .map(|member| Self {
                account,
                occurred_on,
                member: actor,
                item: *member,
                item_type: ITEM_TYPE_MEMBER.to_string(),
                item_name: String::new(),
                action: action.to_string(),
                new_value: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_batch_shares_timestamp() {
        let account = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let members = [Uuid::new_v4(), Uuid::new_v4()];

        let rows = Activity::member_batch(account, actor, &members, ACTION_REMOVED);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].occurred_on, rows[1].occurred_on);
        assert!(rows.iter().all(|r| r.member == actor && r.item_type == ITEM_TYPE_MEMBER));
        assert_eq!(rows[1].item, members[1]);
    }
}
