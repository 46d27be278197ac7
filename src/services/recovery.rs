/// Password reset and email verification.
///
/// Both flows hand a single-use opaque token to an out-of-band channel. The
/// token row exists only while its owner could actually have received it: a
/// failed delivery rolls the row back, and a new request supersedes any
/// prior live token for the same identity.
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attempts::AttemptGuard;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::models::{AttemptScope, RecoveryKind, RecoveryTokenRecord};
use crate::notify::Notifier;
use crate::security::jwt::{generate_opaque_token, hash_token};
use crate::security::{hash_password, validate_password_strength};
use crate::services::normalize_email;
use crate::services::session::SessionService;
use crate::store::{AuthStore, RecoveryLookup};

#[derive(Clone)]
pub struct RecoveryService {
    store: Arc<dyn AuthStore>,
    notifier: Arc<dyn Notifier>,
    sessions: SessionService,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    email_guard: AttemptGuard,
    origin_guard: AttemptGuard,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        notifier: Arc<dyn Notifier>,
        sessions: SessionService,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let email_guard = AttemptGuard::new(
            store.clone(),
            AttemptScope::ResetEmail,
            config.reset_email_policy(),
            clock.clone(),
        );
        let origin_guard = AttemptGuard::new(
            store.clone(),
            AttemptScope::ResetOrigin,
            config.reset_origin_policy(),
            clock.clone(),
        );

        Self {
            store,
            notifier,
            sessions,
            config,
            clock,
            email_guard,
            origin_guard,
        }
    }

    /// Request a password-reset token for an email address.
    ///
    /// Rate limited on two axes at once: per target email and per origin
    /// address, and every request counts against both whether or not the
    /// email exists. Returns `Ok(())` for unknown emails so the response
    /// never reveals which addresses are registered.
    pub async fn request_password_reset(&self, email: &str, origin: &str) -> Result<()> {
        let email = normalize_email(email);

        if let Some(remaining) = self.origin_guard.remaining_lock(origin).await? {
            warn!(origin = %origin, "password reset refused: origin rate limited");
            return Err(AuthError::RateLimited {
                retry_after_secs: remaining.num_seconds().max(1),
            });
        }
        if let Some(remaining) = self.email_guard.remaining_lock(&email).await? {
            warn!(email = %email, "password reset refused: email rate limited");
            return Err(AuthError::RateLimited {
                retry_after_secs: remaining.num_seconds().max(1),
            });
        }

        self.origin_guard.record_failure(origin).await?;
        self.email_guard.record_failure(&email).await?;

        // Generated on both paths so the two stay indistinguishable.
        let token = generate_opaque_token();

        let Some(user) = self.store.user_by_email(&email).await? else {
            info!("password reset requested for unknown email");
            return Ok(());
        };

        self.store
            .put_recovery_token(
                RecoveryKind::PasswordReset,
                RecoveryTokenRecord {
                    token_hash: hash_token(&token),
                    owner: email.clone(),
                    expires_at: self.clock.now() + self.config.reset_token_ttl(),
                },
            )
            .await?;

        if let Err(err) = self.notifier.send_recovery_message(&email, &token).await {
            // The owner never received the token; it must not remain live.
            self.store
                .delete_recovery_token_for_owner(RecoveryKind::PasswordReset, &email)
                .await?;
            warn!(user_id = %user.id, "password reset delivery failed, token rolled back");
            return Err(err);
        }

        info!(user_id = %user.id, "password reset token issued");
        Ok(())
    }

    /// Consume a reset token and install a new password.
    ///
    /// The strength check runs before the token is consumed, so a weak
    /// password does not burn the single use. Success clears the login
    /// lockout for the email and revokes every existing session.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        validate_password_strength(new_password)?;

        let record = match self
            .store
            .take_recovery_token(RecoveryKind::PasswordReset, &hash_token(token), self.clock.now())
            .await?
        {
            RecoveryLookup::Consumed(record) => record,
            RecoveryLookup::Expired => return Err(AuthError::TokenExpired),
            RecoveryLookup::NotFound => return Err(AuthError::InvalidToken),
        };

        let user = self
            .store
            .user_by_email(&record.owner)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let password_hash = hash_password(new_password)?;
        self.store
            .update_password_hash(user.id, &password_hash)
            .await?;

        // Proving control of the mailbox settles any pending lockout.
        self.store
            .clear_attempts(AttemptScope::Login, &record.owner)
            .await?;
        self.sessions.revoke_all_sessions(user.id).await?;

        info!(user_id = %user.id, "password reset completed");
        Ok(())
    }

    /// Issue an email-verification token for a user. A no-op when the email
    /// is already verified.
    pub async fn request_email_verification(&self, user_id: Uuid) -> Result<()> {
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Ok(());
        }

        let token = generate_opaque_token();
        self.store
            .put_recovery_token(
                RecoveryKind::EmailVerification,
                RecoveryTokenRecord {
                    token_hash: hash_token(&token),
                    owner: user.id.to_string(),
                    expires_at: self.clock.now() + self.config.verification_token_ttl(),
                },
            )
            .await?;

        if let Err(err) = self
            .notifier
            .send_verification_message(&user.email, &user.display_name, &token)
            .await
        {
            self.store
                .delete_recovery_token_for_owner(RecoveryKind::EmailVerification, &user.id.to_string())
                .await?;
            warn!(user_id = %user.id, "verification delivery failed, token rolled back");
            return Err(err);
        }

        info!(user_id = %user.id, "email verification token issued");
        Ok(())
    }

    /// Consume a verification token and mark the owning email verified.
    pub async fn confirm_email_verification(&self, token: &str) -> Result<()> {
        let record = match self
            .store
            .take_recovery_token(
                RecoveryKind::EmailVerification,
                &hash_token(token),
                self.clock.now(),
            )
            .await?
        {
            RecoveryLookup::Consumed(record) => record,
            RecoveryLookup::Expired => return Err(AuthError::TokenExpired),
            RecoveryLookup::NotFound => return Err(AuthError::InvalidToken),
        };

        let user_id = Uuid::parse_str(&record.owner).map_err(|_| AuthError::InvalidToken)?;
        self.store.set_email_verified(user_id).await?;

        info!(user_id = %user_id, "email verified");
        Ok(())
    }
}
