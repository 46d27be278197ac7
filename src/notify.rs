/// Delivery seam for recovery and verification messages.
///
/// Rendering and transport (SMTP, push, SMS) live outside this crate; the
/// engine only cares that delivery either happened or failed, because a
/// recovery token may only exist if its owner was actually notified.
use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a password-reset token to the identity that requested it.
    async fn send_recovery_message(&self, identity: &str, token: &str) -> Result<()>;

    /// Deliver an email-verification token.
    async fn send_verification_message(
        &self,
        identity: &str,
        display_name: &str,
        token: &str,
    ) -> Result<()>;
}

/// Notifier that records delivery through `tracing` instead of sending
/// anything. Used in development and tests.
///
/// Token values are never logged; only their length is.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_recovery_message(&self, identity: &str, token: &str) -> Result<()> {
        info!(
            identity = %identity,
            token_len = token.len(),
            "password reset message dispatched"
        );
        Ok(())
    }

    async fn send_verification_message(
        &self,
        identity: &str,
        display_name: &str,
        token: &str,
    ) -> Result<()> {
        info!(
            identity = %identity,
            display_name = %display_name,
            token_len = token.len(),
            "email verification message dispatched"
        );
        Ok(())
    }
}
