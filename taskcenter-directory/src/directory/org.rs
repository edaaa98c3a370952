/// Org lifecycle and membership
///
/// The directory keeps only the org record and the membership index. Roles,
/// permissions and the owner invariant are decided by the region, and the
/// index follows only after the region has accepted a change.

use serde::Deserialize;
use taskcenter_shared::models::account::{Account, Org};
use taskcenter_shared::models::member::{AccountMember, AccountRole, AddMember};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::ErrorRef;
use super::{region_outcome, AccountDirectoryApi, DirectoryError, DirectoryResult};

/// A member to add, by user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NewMember {
    pub id: Uuid,
    pub role: AccountRole,
}

impl AccountDirectoryApi {
    /// Creates the org and its task center, returning the org
    ///
    /// The org is stored unprovisioned before the region is called. If the
    /// region fails the record is removed again.
    pub async fn create_org(&self, my_id: Uuid, name: &str, region: &str) -> DirectoryResult<Org> {
        let name = name.trim();
        self.name_rule.validate(name)?;
        self.require_known_region(region)?;
        self.require_name_available(name, None).await?;
        let owner = self.get_user(my_id).await?;

        let mut org = Account::new_org(Uuid::new_v4(), name.to_string(), region.to_string());
        self.store.create_org_and_membership(&org, my_id).await?;

        let shard = match self
            .regions
            .create_org_task_center(region, org.id, my_id, owner.name())
            .await
        {
            Ok(shard) => shard,
            Err(failure) => {
                let reference = ErrorRef::new();
                error!(error_ref = %reference, org_id = %org.id, region, error = %failure, "Org task center creation failed");
                return Err(self.compensate_org_creation(&org, reference).await);
            }
        };

        org.shard = shard;
        self.store.update_org(&org).await?;

        info!(org_id = %org.id, owner = %my_id, region, shard, "Org created");
        Ok(org)
    }

    async fn compensate_org_creation(&self, org: &Org, reference: ErrorRef) -> DirectoryError {
        match self.store.delete_org(org.id).await {
            Ok(()) => {
                warn!(error_ref = %reference, org_id = %org.id, "Removed pending org");
                DirectoryError::Infrastructure(reference)
            }
            Err(err) => {
                error!(error_ref = %reference, org_id = %org.id, error = %err, "Failed to remove pending org");
                DirectoryError::CompensationFailed(reference)
            }
        }
    }

    /// Deletes the task center first, then the directory record
    ///
    /// A pending org has no task center and no roles yet, so any member may
    /// remove its record.
    pub async fn delete_org(&self, my_id: Uuid, org_id: Uuid) -> DirectoryResult<()> {
        let org = self.store.get_org(org_id).await?.ok_or(DirectoryError::NoSuchOrg)?;
        if !org.is_provisioned() {
            if !self.store.has_membership(org.id, my_id).await? {
                return Err(DirectoryError::InsufficientPermission);
            }
            self.store.delete_org(org.id).await?;
            info!(org_id = %org.id, actor = %my_id, "Pending org deleted");
            return Ok(());
        }

        self.require_region_still_exists(&org.region)?;
        region_outcome(self.regions.delete_task_center(&org, my_id).await)?;
        self.store.delete_org(org.id).await?;

        info!(org_id = %org.id, actor = %my_id, "Org deleted");
        Ok(())
    }

    pub async fn add_members(&self, my_id: Uuid, org_id: Uuid, members: &[NewMember]) -> DirectoryResult<()> {
        if org_id == my_id {
            return Err(DirectoryError::InvalidOperation);
        }
        self.require_bulk_size(members.len())?;
        let org = self.get_provisioned_org(org_id).await?;

        let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
        let users = self.store.get_users(&ids).await?;
        let resolved: Vec<AddMember> = members
            .iter()
            .filter_map(|m| {
                users.iter().find(|u| u.id == m.id).map(|u| AddMember {
                    id: u.id,
                    name: u.name.clone(),
                    role: m.role,
                })
            })
            .collect();
        if resolved.is_empty() {
            return Ok(());
        }

        let resolved_ids: Vec<Uuid> = resolved.iter().map(|m| m.id).collect();
        region_outcome(self.regions.add_members(&org, my_id, resolved).await)?;
        self.store.create_memberships(org.id, &resolved_ids).await?;

        info!(org_id = %org.id, actor = %my_id, count = resolved_ids.len(), "Members added");
        Ok(())
    }

    pub async fn remove_members(&self, my_id: Uuid, org_id: Uuid, ids: &[Uuid]) -> DirectoryResult<()> {
        if org_id == my_id {
            return Err(DirectoryError::InvalidOperation);
        }
        self.require_bulk_size(ids.len())?;
        let org = self.get_provisioned_org(org_id).await?;

        region_outcome(self.regions.remove_members(&org, my_id, ids.to_vec()).await)?;
        self.store.delete_memberships(org.id, ids).await?;

        info!(org_id = %org.id, actor = %my_id, count = ids.len(), "Members removed");
        Ok(())
    }

    /// Owners only
    pub async fn rename_org(&self, my_id: Uuid, org_id: Uuid, new_name: &str) -> DirectoryResult<()> {
        let new_name = new_name.trim();
        self.name_rule.validate(new_name)?;
        let mut org = self.get_provisioned_org(org_id).await?;
        self.require_name_available(new_name, Some(org.id)).await?;

        if !self.regions.member_is_account_owner(&org, my_id).await? {
            return Err(DirectoryError::InsufficientPermission);
        }

        org.name = new_name.to_string();
        self.store.update_org(&org).await?;
        Ok(())
    }

    pub async fn get_orgs(&self, ids: &[Uuid]) -> DirectoryResult<Vec<Org>> {
        self.require_bulk_size(ids.len())?;
        Ok(self.store.get_orgs(ids).await?)
    }

    pub async fn search_orgs(&self, search: &str, limit: u64) -> DirectoryResult<Vec<Org>> {
        let search = search.trim();
        self.search_rule.validate(search)?;
        Ok(self.store.search_orgs(search, self.clamp_limit(limit)).await?)
    }

    /// The orgs the caller belongs to, with the total count
    pub async fn get_my_orgs(&self, my_id: Uuid, offset: u64, limit: u64) -> DirectoryResult<(Vec<Org>, u64)> {
        Ok(self
            .store
            .get_users_orgs(my_id, offset, self.clamp_limit(limit))
            .await?)
    }

    pub async fn get_org_members(
        &self,
        my_id: Uuid,
        org_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> DirectoryResult<(Vec<AccountMember>, u64)> {
        let org = self.get_provisioned_org(org_id).await?;
        region_outcome(
            self.regions
                .get_members(&org, my_id, offset, self.clamp_limit(limit))
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_deserializes_snake_case_role() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"id":"{id}","role":"member_of_all_projects"}}"#);
        let member: NewMember = serde_json::from_str(&json).unwrap();
        assert_eq!(member.id, id);
        assert_eq!(member.role, AccountRole::MemberOfAllProjects);
    }
}
