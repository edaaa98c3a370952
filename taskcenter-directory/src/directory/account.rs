/// User lifecycle and self-service
///
/// Unknown emails never produce a distinct error: registration, activation
/// resends and password resets all succeed silently so the API cannot be
/// used to learn which addresses have accounts.

use taskcenter_shared::auth::password::verify_pwd;
use taskcenter_shared::models::account::{Account, FullUserInfo, User};
use taskcenter_shared::validation::validate_email;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::{StoreError, UserCode};

use super::error::internal;
use super::{AccountDirectoryApi, DirectoryError, DirectoryResult, CASCADE_PAGE_SIZE};

impl AccountDirectoryApi {
    pub async fn register(&self, name: &str, email: &str, pwd: &str, region: &str) -> DirectoryResult<()> {
        let name = name.trim();
        let email = email.trim();
        self.name_rule.validate(name)?;
        validate_email(email)?;
        self.pwd_rule.validate(pwd)?;
        self.require_known_region(region)?;
        self.require_name_available(name, None).await?;

        if let Some(existing) = self.store.get_user_by_email(email).await? {
            debug!(user_id = %existing.id(), "Registration for an existing email");
            self.mailer.send_multiple_account_policy_notice(existing.email()).await?;
            return Ok(());
        }

        let pwd_info = self.new_pwd_info(pwd)?;
        let code = self.new_code()?;
        let user = FullUserInfo::new_registered(
            Uuid::new_v4(),
            name.to_string(),
            email.to_string(),
            region.to_string(),
            code.clone(),
        );
        match self.store.create_user(&user, &pwd_info).await {
            Ok(()) => {}
            Err(StoreError::EmailTaken) => {
                debug!("Concurrent registration took the email");
                self.mailer.send_multiple_account_policy_notice(email).await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        self.mailer.send_activation_link(email, &code).await?;

        info!(user_id = %user.id(), region, "User registered");
        Ok(())
    }

    pub async fn resend_activation_email(&self, email: &str) -> DirectoryResult<()> {
        let user = match self.store.get_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => return Ok(()),
        };
        match &user.activation_code {
            Some(code) if !user.is_activated() => {
                self.mailer.send_activation_link(user.email(), code).await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Provisions the personal task center and returns the user id
    ///
    /// The code is claimed before the region is called, so a replayed link
    /// cannot provision twice. A failed provisioning hands the code back.
    pub async fn activate(&self, email: &str, code: &str) -> DirectoryResult<Uuid> {
        let claimed = self
            .store
            .claim_code(email.trim(), UserCode::Activation, code.trim())
            .await?
            .ok_or(DirectoryError::InvalidActivationAttempt)?;

        let activated = self.provision_personal_task_center(&claimed).await;
        let user = self.after_claim(&claimed, UserCode::Activation, activated).await?;

        info!(user_id = %user.id(), region = %user.account().region, "User activated");
        Ok(user.id())
    }

    /// Creates the task center and records the shard on the stored user
    async fn provision_personal_task_center(&self, claimed: &FullUserInfo) -> DirectoryResult<FullUserInfo> {
        let region = &claimed.account().region;
        self.require_region_still_exists(region)?;
        let shard = self
            .regions
            .create_personal_task_center(region, claimed.id(), claimed.name())
            .await?;

        let mut user = self.get_user(claimed.id()).await?;
        user.mark_activated(shard);
        self.store.update_user(&user).await?;
        Ok(user)
    }

    /// Passes `result` through, restoring the claimed code when it failed
    async fn after_claim<T>(&self, claimed: &FullUserInfo, kind: UserCode, result: DirectoryResult<T>) -> DirectoryResult<T> {
        if result.is_err() {
            if let Err(err) = self.restore_code(claimed, kind).await {
                error!(user_id = %claimed.id(), ?kind, error = %err, "Failed to restore claimed code");
            }
        }
        result
    }

    async fn restore_code(&self, claimed: &FullUserInfo, kind: UserCode) -> DirectoryResult<()> {
        let mut user = self.get_user(claimed.id()).await?;
        if kind == UserCode::ResetPwd && user.reset_pwd_code.is_none() {
            user.reset_pwd_code = claimed.reset_pwd_code.clone();
        }
        if !user.is_activated() && user.activation_code.is_none() {
            user.activation_code = claimed.activation_code.clone();
        }
        self.store.update_user(&user).await?;
        Ok(())
    }

    /// Returns the user id on success
    pub async fn authenticate(&self, name: &str, pwd: &str) -> DirectoryResult<Uuid> {
        let mut user = self
            .store
            .get_user_by_name(name.trim())
            .await?
            .ok_or(DirectoryError::InvalidNameOrPwd)?;
        let pwd_info = match self.store.get_pwd_info(user.id()).await? {
            Some(info) => info,
            None => return Err(internal("User has no credentials", user.id())),
        };

        if !verify_pwd(self.crypto.as_ref(), pwd, &pwd_info)? {
            return Err(DirectoryError::InvalidNameOrPwd);
        }
        if !user.is_activated() {
            return Err(DirectoryError::UserNotActivated);
        }

        if user.reset_pwd_code.is_some() {
            user.reset_pwd_code = None;
            self.store.update_user(&user).await?;
        }
        if pwd_info.needs_upgrade(&self.settings.kdf, self.settings.salt_len) {
            let upgraded = self.new_pwd_info(pwd)?;
            self.store.update_pwd_info(user.id(), &upgraded).await?;
            debug!(user_id = %user.id(), "Upgraded stored password hash");
        }

        Ok(user.id())
    }

    /// Returns the user id on success
    pub async fn confirm_new_email(&self, current_email: &str, new_email: &str, code: &str) -> DirectoryResult<Uuid> {
        let mut user = self
            .store
            .get_user_by_email(current_email.trim())
            .await?
            .ok_or(DirectoryError::InvalidNewEmailConfirmationAttempt)?;
        let new_email = new_email.trim();
        if user.user.new_email.as_deref() != Some(new_email)
            || user.new_email_confirmation_code.as_deref() != Some(code.trim())
        {
            return Err(DirectoryError::InvalidNewEmailConfirmationAttempt);
        }

        if let Some(holder) = self.store.get_user_by_email(new_email).await? {
            if holder.id() != user.id() {
                return Err(DirectoryError::EmailAlreadyInUse);
            }
        }

        user.user.email = new_email.to_string();
        user.user.new_email = None;
        user.new_email_confirmation_code = None;
        self.store.update_user(&user).await?;

        info!(user_id = %user.id(), "Email changed");
        Ok(user.id())
    }

    pub async fn reset_pwd(&self, email: &str) -> DirectoryResult<()> {
        let mut user = match self.store.get_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => return Ok(()),
        };
        let code = self.new_code()?;
        user.reset_pwd_code = Some(code.clone());
        self.store.update_user(&user).await?;
        self.mailer.send_pwd_reset_link(user.email(), &code).await?;
        Ok(())
    }

    /// Also activates a user who never activated; returns the user id
    pub async fn set_new_pwd_from_pwd_reset(&self, new_pwd: &str, email: &str, code: &str) -> DirectoryResult<Uuid> {
        self.pwd_rule.validate(new_pwd)?;
        let claimed = self
            .store
            .claim_code(email.trim(), UserCode::ResetPwd, code.trim())
            .await?
            .ok_or(DirectoryError::InvalidResetPwdAttempt)?;

        let reset = self.finish_pwd_reset(&claimed, new_pwd).await;
        self.after_claim(&claimed, UserCode::ResetPwd, reset).await?;
        Ok(claimed.id())
    }

    async fn finish_pwd_reset(&self, claimed: &FullUserInfo, new_pwd: &str) -> DirectoryResult<()> {
        let pwd_info = self.new_pwd_info(new_pwd)?;
        // Only the claim that took a pending activation code provisions
        if claimed.activation_code.is_some() && !claimed.is_activated() {
            self.provision_personal_task_center(claimed).await?;
            info!(user_id = %claimed.id(), "User activated by password reset");
        }
        self.store.update_pwd_info(claimed.id(), &pwd_info).await?;
        Ok(())
    }

    pub async fn get_me(&self, my_id: Uuid) -> DirectoryResult<User> {
        Ok(self.get_user(my_id).await?.user)
    }

    pub async fn get_users(&self, ids: &[Uuid]) -> DirectoryResult<Vec<Account>> {
        self.require_bulk_size(ids.len())?;
        Ok(self.store.get_users(ids).await?)
    }

    pub async fn search_users(&self, search: &str, limit: u64) -> DirectoryResult<Vec<Account>> {
        let search = search.trim();
        self.search_rule.validate(search)?;
        Ok(self.store.search_users(search, self.clamp_limit(limit)).await?)
    }

    /// Renames the user and every task center copy of the name
    ///
    /// A failure part way through leaves the orgs already visited renamed;
    /// calling again with the same name finishes the remainder.
    pub async fn change_my_name(&self, my_id: Uuid, new_name: &str) -> DirectoryResult<()> {
        let new_name = new_name.trim();
        self.name_rule.validate(new_name)?;
        self.require_name_available(new_name, Some(my_id)).await?;

        let mut user = self.get_user(my_id).await?;
        user.user.account.name = new_name.to_string();
        self.store.update_user(&user).await?;

        let personal = user.account();
        if personal.is_provisioned() {
            self.require_region_still_exists(&personal.region)?;
            self.regions.rename_member(personal, my_id, new_name).await?;
        }

        let mut offset = 0;
        loop {
            let (orgs, total) = self.store.get_users_orgs(my_id, offset, CASCADE_PAGE_SIZE).await?;
            if orgs.is_empty() {
                break;
            }
            offset += orgs.len() as u64;
            for org in orgs.iter().filter(|o| o.is_provisioned()) {
                self.require_region_still_exists(&org.region)?;
                self.regions.rename_member(org, my_id, new_name).await?;
            }
            if offset >= total {
                break;
            }
        }

        info!(user_id = %my_id, "User renamed");
        Ok(())
    }

    pub async fn change_my_email(&self, my_id: Uuid, new_email: &str) -> DirectoryResult<()> {
        let new_email = new_email.trim();
        validate_email(new_email)?;

        if let Some(holder) = self.store.get_user_by_email(new_email).await? {
            if holder.id() != my_id {
                self.mailer.send_multiple_account_policy_notice(holder.email()).await?;
                return Ok(());
            }
        }

        let mut user = self.get_user(my_id).await?;
        let code = self.new_code()?;
        user.user.new_email = Some(new_email.to_string());
        user.new_email_confirmation_code = Some(code.clone());
        self.store.update_user(&user).await?;
        self.mailer
            .send_new_email_confirmation_link(user.email(), new_email, &code)
            .await?;
        Ok(())
    }

    pub async fn resend_my_new_email_confirmation_email(&self, my_id: Uuid) -> DirectoryResult<()> {
        let user = self.get_user(my_id).await?;
        let new_email = user
            .user
            .new_email
            .as_deref()
            .ok_or(DirectoryError::NoNewEmailRegistered)?;
        let code = match user.new_email_confirmation_code.as_deref() {
            Some(code) => code,
            None => return Err(internal("Pending email without a confirmation code", my_id)),
        };
        self.mailer
            .send_new_email_confirmation_link(user.email(), new_email, code)
            .await?;
        Ok(())
    }

    pub async fn change_my_pwd(&self, my_id: Uuid, old_pwd: &str, new_pwd: &str) -> DirectoryResult<()> {
        self.pwd_rule.validate(new_pwd)?;
        let current = self
            .store
            .get_pwd_info(my_id)
            .await?
            .ok_or(DirectoryError::NoSuchUser)?;
        if !verify_pwd(self.crypto.as_ref(), old_pwd, &current)? {
            return Err(DirectoryError::IncorrectPwd);
        }
        let pwd_info = self.new_pwd_info(new_pwd)?;
        self.store.update_pwd_info(my_id, &pwd_info).await?;
        Ok(())
    }

    /// Leaves every org, then deletes the personal task center and the user
    ///
    /// Refused up front when the user is the only owner of any org. The
    /// directory record goes last, so an interrupted run can be retried.
    pub async fn delete_me(&self, my_id: Uuid) -> DirectoryResult<()> {
        let user = self.get_user(my_id).await?;

        let mut offset = 0;
        loop {
            let (orgs, total) = self.store.get_users_orgs(my_id, offset, CASCADE_PAGE_SIZE).await?;
            if orgs.is_empty() {
                break;
            }
            offset += orgs.len() as u64;
            for org in orgs.iter().filter(|o| o.is_provisioned()) {
                self.require_region_still_exists(&org.region)?;
                if self.regions.member_is_only_account_owner(org, my_id).await? {
                    warn!(user_id = %my_id, org_id = %org.id, "Refusing to delete an org's only owner");
                    return Err(DirectoryError::OnlyOwnerMember);
                }
            }
            if offset >= total {
                break;
            }
        }

        // Each page removes its own memberships, so always read from the start
        loop {
            let (orgs, _) = self.store.get_users_orgs(my_id, 0, CASCADE_PAGE_SIZE).await?;
            if orgs.is_empty() {
                break;
            }
            for org in &orgs {
                if org.is_provisioned() {
                    self.require_region_still_exists(&org.region)?;
                    self.regions.set_member_deleted(org, my_id).await?;
                } else if self.store.membership_count(org.id).await? <= 1 {
                    // A pending org nobody else belongs to would never be cleaned up
                    self.store.delete_org(org.id).await?;
                    info!(user_id = %my_id, org_id = %org.id, "Pending org deleted with its last member");
                    continue;
                }
                self.store.delete_memberships(org.id, &[my_id]).await?;
            }
        }

        let personal = user.account();
        if personal.is_provisioned() {
            self.require_region_still_exists(&personal.region)?;
            super::region_outcome(self.regions.delete_task_center(personal, my_id).await)?;
        }

        self.store.delete_user(my_id).await?;
        info!(user_id = %my_id, "User deleted");
        Ok(())
    }
}
