/// Outbound account notifications
///
/// The directory only needs four messages. `LogLinkMailer` writes them to the
/// log instead of sending mail, which is what local runs and tests use.

use async_trait::async_trait;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Failed to send to {address}: {reason}")]
    SendFailed { address: String, reason: String },
}

#[async_trait]
pub trait LinkMailer: Send + Sync {
    async fn send_activation_link(&self, address: &str, activation_code: &str) -> Result<(), MailerError>;

    async fn send_pwd_reset_link(&self, address: &str, reset_code: &str) -> Result<(), MailerError>;

    async fn send_new_email_confirmation_link(
        &self,
        current_address: &str,
        new_address: &str,
        confirmation_code: &str,
    ) -> Result<(), MailerError>;

    /// Tells the owner of `address` that an account already exists for it
    async fn send_multiple_account_policy_notice(&self, address: &str) -> Result<(), MailerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogLinkMailer;

#[async_trait]
impl LinkMailer for LogLinkMailer {
    async fn send_activation_link(&self, address: &str, activation_code: &str) -> Result<(), MailerError> {
        info!(address, activation_code, "Activation link");
        Ok(())
    }

    async fn send_pwd_reset_link(&self, address: &str, reset_code: &str) -> Result<(), MailerError> {
        info!(address, reset_code, "Password reset link");
        Ok(())
    }

    async fn send_new_email_confirmation_link(
        &self,
        current_address: &str,
        new_address: &str,
        confirmation_code: &str,
    ) -> Result<(), MailerError> {
        info!(current_address, new_address, confirmation_code, "New email confirmation link");
        Ok(())
    }

    async fn send_multiple_account_policy_notice(&self, address: &str) -> Result<(), MailerError> {
        info!(address, "Multiple account policy notice");
        Ok(())
    }
}
