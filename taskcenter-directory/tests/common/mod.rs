//! Common test utilities for integration tests
//!
//! Everything runs in-process: an in-memory directory store, in-memory
//! regions `us` (two shards) and `eu` (one shard), a mailer that records
//! what it would have sent, and argon2 at minimal cost.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use taskcenter_directory::app::{build_router, AppState};
use taskcenter_directory::config::Config;
use taskcenter_directory::directory::{AccountDirectoryApi, DirectorySettings};
use taskcenter_directory::mailer::{LinkMailer, MailerError};
use taskcenter_directory::store::{MemStore, Store};
use taskcenter_region::{InternalRegionApi, InternalRegionClient};
use taskcenter_shared::auth::jwt::issue_session;
use taskcenter_shared::auth::password::Argon2Crypto;
use taskcenter_shared::models::credentials::KdfParams;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const PWD: &str = "correct-horse-battery";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mail {
    Activation { to: String, code: String },
    PwdReset { to: String, code: String },
    NewEmailConfirmation { current: String, new: String, code: String },
    MultipleAccountNotice { to: String },
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_activation_code(&self, address: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            Mail::Activation { to, code } if to == address => Some(code),
            _ => None,
        })
    }

    pub fn last_reset_code(&self, address: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            Mail::PwdReset { to, code } if to == address => Some(code),
            _ => None,
        })
    }

    pub fn last_confirmation_code(&self, new_address: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            Mail::NewEmailConfirmation { new, code, .. } if new == new_address => Some(code),
            _ => None,
        })
    }

    fn push(&self, mail: Mail) {
        self.sent.lock().unwrap().push(mail);
    }
}

#[async_trait]
impl LinkMailer for RecordingMailer {
    async fn send_activation_link(&self, address: &str, activation_code: &str) -> Result<(), MailerError> {
        self.push(Mail::Activation {
            to: address.to_string(),
            code: activation_code.to_string(),
        });
        Ok(())
    }

    async fn send_pwd_reset_link(&self, address: &str, reset_code: &str) -> Result<(), MailerError> {
        self.push(Mail::PwdReset {
            to: address.to_string(),
            code: reset_code.to_string(),
        });
        Ok(())
    }

    async fn send_new_email_confirmation_link(
        &self,
        current_address: &str,
        new_address: &str,
        confirmation_code: &str,
    ) -> Result<(), MailerError> {
        self.push(Mail::NewEmailConfirmation {
            current: current_address.to_string(),
            new: new_address.to_string(),
            code: confirmation_code.to_string(),
        });
        Ok(())
    }

    async fn send_multiple_account_policy_notice(&self, address: &str) -> Result<(), MailerError> {
        self.push(Mail::MultipleAccountNotice {
            to: address.to_string(),
        });
        Ok(())
    }
}

pub fn cheap_kdf() -> KdfParams {
    KdfParams {
        m_cost: 8,
        t_cost: 1,
        p_cost: 1,
        key_len: 32,
    }
}

pub fn test_settings() -> DirectorySettings {
    DirectorySettings {
        salt_len: 16,
        kdf: cheap_kdf(),
        ..Default::default()
    }
}

pub fn test_regions() -> InternalRegionClient {
    InternalRegionClient::in_memory([("us", 2), ("eu", 1)], 100)
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemStore>,
    pub regions: Arc<dyn InternalRegionApi>,
    pub mailer: Arc<RecordingMailer>,
    pub directory: Arc<AccountDirectoryApi>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with(test_settings(), Arc::new(test_regions()))
    }

    pub fn with(settings: DirectorySettings, regions: Arc<dyn InternalRegionApi>) -> Self {
        let store = Arc::new(MemStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let directory = AccountDirectoryApi::new(
            store.clone(),
            regions.clone(),
            mailer.clone(),
            Arc::new(Argon2Crypto),
            settings,
        )
        .expect("test settings compile");

        Self {
            store,
            regions,
            mailer,
            directory: Arc::new(directory),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Registers in `us` and activates, returning the user id
    pub async fn active_user(&self, name: &str) -> Uuid {
        self.active_user_in(name, "us").await
    }

    pub async fn active_user_in(&self, name: &str, region: &str) -> Uuid {
        let email = email_for(name);
        self.directory
            .register(name, &email, PWD, region)
            .await
            .expect("register");
        let code = self.mailer.last_activation_code(&email).expect("activation mail");
        self.directory.activate(&email, &code).await.expect("activate")
    }

    pub fn app(&self) -> axum::Router {
        let config = Config::with_overrides(&[("jwt.secret", JWT_SECRET)]).expect("test config");
        build_router(AppState::new(self.directory.clone(), config, None))
    }

    pub fn auth_header(&self, user_id: Uuid) -> String {
        let tokens = issue_session(user_id, JWT_SECRET).expect("issue session");
        format!("Bearer {}", tokens.access_token)
    }
}

pub fn email_for(name: &str) -> String {
    format!("{}@example.com", name.to_lowercase())
}
