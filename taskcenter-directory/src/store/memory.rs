/// In-memory directory store
///
/// Used by tests and by the `memory` store backend. Every record passes in
/// and out by clone.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use taskcenter_shared::models::account::{Account, FullUserInfo, Org};
use taskcenter_shared::models::credentials::PwdInfo;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, UserCode};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, FullUserInfo>,
    orgs: HashMap<Uuid, Org>,
    pwd_infos: HashMap<Uuid, PwdInfo>,
    // (org, member)
    memberships: HashSet<(Uuid, Uuid)>,
}

impl State {
    fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.users
            .values()
            .map(|u| u.account())
            .chain(self.orgs.values())
    }

    fn name_taken_by_other(&self, name: &str, id: Uuid) -> bool {
        let lower = name.to_lowercase();
        self.accounts().any(|a| a.id != id && a.name.to_lowercase() == lower)
    }

    fn email_taken_by_other(&self, email: &str, id: Uuid) -> bool {
        self.users.values().any(|u| u.id() != id && u.email() == email)
    }
}

fn by_name_prefix<'a>(accounts: impl Iterator<Item = &'a Account>, prefix: &str, limit: u64) -> Vec<Account> {
    let prefix = prefix.to_lowercase();
    let mut found: Vec<Account> = accounts
        .filter(|a| a.name.to_lowercase().starts_with(&prefix))
        .cloned()
        .collect();
    sort_by_name(&mut found);
    found.truncate(limit as usize);
    found
}

fn sort_by_name(accounts: &mut [Account]) {
    accounts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
}

#[derive(Debug, Default)]
pub struct MemStore {
    state: RwLock<State>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_account_by_name(&self, name: &str) -> StoreResult<Option<Account>> {
        let state = self.state.read().await;
        let lower = name.to_lowercase();
        let found = state.accounts().find(|a| a.name.to_lowercase() == lower).cloned();
        Ok(found)
    }

    async fn create_user(&self, user: &FullUserInfo, pwd: &PwdInfo) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.name_taken_by_other(user.name(), user.id()) {
            return Err(StoreError::NameTaken);
        }
        if state.email_taken_by_other(user.email(), user.id()) {
            return Err(StoreError::EmailTaken);
        }
        state.users.insert(user.id(), user.clone());
        state.pwd_infos.insert(user.id(), pwd.clone());
        debug!(user_id = %user.id(), "Stored user");
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<FullUserInfo>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_name(&self, name: &str) -> StoreResult<Option<FullUserInfo>> {
        let state = self.state.read().await;
        let lower = name.to_lowercase();
        Ok(state
            .users
            .values()
            .find(|u| u.name().to_lowercase() == lower)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<FullUserInfo>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email() == email).cloned())
    }

    async fn update_user(&self, user: &FullUserInfo) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.name_taken_by_other(user.name(), user.id()) {
            return Err(StoreError::NameTaken);
        }
        if state.email_taken_by_other(user.email(), user.id()) {
            return Err(StoreError::EmailTaken);
        }
        if let Some(existing) = state.users.get_mut(&user.id()) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn claim_code(&self, email: &str, kind: UserCode, code: &str) -> StoreResult<Option<FullUserInfo>> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.values_mut().find(|u| u.email() == email) else {
            return Ok(None);
        };
        let held = match kind {
            UserCode::Activation => user.activation_code.as_deref(),
            UserCode::ResetPwd => user.reset_pwd_code.as_deref(),
        };
        if held != Some(code) {
            return Ok(None);
        }

        let prior = user.clone();
        if kind == UserCode::ResetPwd {
            user.reset_pwd_code = None;
        }
        user.activation_code = None;
        Ok(Some(prior))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.users.remove(&id);
        state.pwd_infos.remove(&id);
        state.memberships.retain(|(_, member)| *member != id);
        Ok(())
    }

    async fn get_pwd_info(&self, id: Uuid) -> StoreResult<Option<PwdInfo>> {
        Ok(self.state.read().await.pwd_infos.get(&id).cloned())
    }

    async fn update_pwd_info(&self, id: Uuid, pwd: &PwdInfo) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.pwd_infos.get_mut(&id) {
            *existing = pwd.clone();
        }
        Ok(())
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(|u| u.account().clone())
            .collect())
    }

    async fn search_users(&self, prefix: &str, limit: u64) -> StoreResult<Vec<Account>> {
        let state = self.state.read().await;
        Ok(by_name_prefix(state.users.values().map(|u| u.account()), prefix, limit))
    }

    async fn create_org_and_membership(&self, org: &Org, owner: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.name_taken_by_other(&org.name, org.id) {
            return Err(StoreError::NameTaken);
        }
        state.orgs.insert(org.id, org.clone());
        state.memberships.insert((org.id, owner));
        Ok(())
    }

    async fn get_org(&self, id: Uuid) -> StoreResult<Option<Org>> {
        Ok(self.state.read().await.orgs.get(&id).cloned())
    }

    async fn get_orgs(&self, ids: &[Uuid]) -> StoreResult<Vec<Org>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.orgs.get(id)).cloned().collect())
    }

    async fn update_org(&self, org: &Org) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.name_taken_by_other(&org.name, org.id) {
            return Err(StoreError::NameTaken);
        }
        if let Some(existing) = state.orgs.get_mut(&org.id) {
            *existing = org.clone();
        }
        Ok(())
    }

    async fn delete_org(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.orgs.remove(&id);
        state.memberships.retain(|(org, _)| *org != id);
        Ok(())
    }

    async fn search_orgs(&self, prefix: &str, limit: u64) -> StoreResult<Vec<Org>> {
        let state = self.state.read().await;
        Ok(by_name_prefix(state.orgs.values(), prefix, limit))
    }

    async fn get_users_orgs(&self, user: Uuid, offset: u64, limit: u64) -> StoreResult<(Vec<Org>, u64)> {
        let state = self.state.read().await;
        let mut orgs: Vec<Org> = state
            .memberships
            .iter()
            .filter(|(_, member)| *member == user)
            .filter_map(|(org, _)| state.orgs.get(org))
            .cloned()
            .collect();
        sort_by_name(&mut orgs);

        let total = orgs.len() as u64;
        let page = orgs.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }

    async fn has_membership(&self, org: Uuid, member: Uuid) -> StoreResult<bool> {
        Ok(self.state.read().await.memberships.contains(&(org, member)))
    }

    async fn membership_count(&self, org: Uuid) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state.memberships.iter().filter(|(o, _)| *o == org).count() as u64)
    }

    async fn create_memberships(&self, org: Uuid, members: &[Uuid]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for member in members {
            state.memberships.insert((org, *member));
        }
        Ok(())
    }

    async fn delete_memberships(&self, org: Uuid, members: &[Uuid]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for member in members {
            state.memberships.remove(&(org, *member));
        }
        Ok(())
    }
}
