/// TOTP enrollment and second-factor verification.
///
/// Enrollment is two-phase: a candidate secret is generated and handed to
/// the caller, but nothing is persisted until the user proves possession by
/// submitting one valid code. A half-finished enrollment therefore leaves no
/// state behind.
use chrono::TimeZone;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AuthError, Result};
use crate::models::{MfaEnrollment, RevokedAccessToken};
use crate::security::jwt::hash_token;
use crate::security::totp;
use crate::services::session::{AuthenticatedSession, SessionService};
use crate::store::AuthStore;

/// A freshly generated candidate secret plus the otpauth URI the caller
/// renders as a QR code. Not yet persisted.
#[derive(Debug, Clone)]
pub struct MfaEnrollmentChallenge {
    pub secret: String,
    pub provisioning_uri: String,
}

#[derive(Clone)]
pub struct MfaService {
    store: Arc<dyn AuthStore>,
    sessions: SessionService,
    clock: Arc<dyn Clock>,
    issuer: String,
}

impl MfaService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        sessions: SessionService,
        clock: Arc<dyn Clock>,
        issuer: &str,
    ) -> Self {
        Self {
            store,
            sessions,
            clock,
            issuer: issuer.to_string(),
        }
    }

    /// Start enrollment: generate a candidate secret and provisioning URI.
    ///
    /// Persists nothing. Calling this again simply produces a fresh
    /// candidate; only `confirm_enrollment` commits one.
    pub async fn begin_enrollment(&self, user_id: Uuid) -> Result<MfaEnrollmentChallenge> {
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(enrollment) = self.store.mfa_enrollment(user_id).await? {
            if enrollment.enabled {
                return Err(AuthError::MfaAlreadyEnabled);
            }
        }

        let secret = totp::generate_secret();
        let provisioning_uri = totp::provisioning_uri(&user.email, &secret, &self.issuer);

        Ok(MfaEnrollmentChallenge {
            secret,
            provisioning_uri,
        })
    }

    /// Commit an enrollment once the user proves they hold the candidate
    /// secret. From here on every login demands a code.
    ///
    /// Existing sessions are revoked so nothing issued under the weaker
    /// policy survives.
    pub async fn confirm_enrollment(
        &self,
        user_id: Uuid,
        candidate_secret: &str,
        code: &str,
    ) -> Result<()> {
        if self
            .store
            .user_by_id(user_id)
            .await?
            .is_none()
        {
            return Err(AuthError::UserNotFound);
        }

        if let Some(enrollment) = self.store.mfa_enrollment(user_id).await? {
            if enrollment.enabled {
                return Err(AuthError::MfaAlreadyEnabled);
            }
        }

        if !totp::verify_code(candidate_secret, code, self.clock.now())? {
            return Err(AuthError::InvalidMfaCode);
        }

        self.store
            .put_mfa_enrollment(MfaEnrollment {
                user_id,
                secret: candidate_secret.to_string(),
                enabled: true,
            })
            .await?;
        self.sessions.revoke_all_sessions(user_id).await?;

        info!(user_id = %user_id, "mfa enrollment confirmed");
        Ok(())
    }

    /// Disable MFA. Requires a currently valid code so a stolen session
    /// alone cannot strip the second factor, and revokes all sessions.
    pub async fn disable(&self, user_id: Uuid, code: &str) -> Result<()> {
        let enrollment = self
            .store
            .mfa_enrollment(user_id)
            .await?
            .filter(|e| e.enabled)
            .ok_or(AuthError::MfaNotEnabled)?;

        if !totp::verify_code(&enrollment.secret, code, self.clock.now())? {
            return Err(AuthError::InvalidMfaCode);
        }

        self.store.delete_mfa_enrollment(user_id).await?;
        self.sessions.revoke_all_sessions(user_id).await?;

        info!(user_id = %user_id, "mfa disabled");
        Ok(())
    }

    /// Complete an MFA-gated login: exchange a pending assertion plus a
    /// valid code for a full session.
    ///
    /// A wrong code leaves the assertion usable for another try; a correct
    /// one consumes it through the revocation ledger, so it cannot mint two
    /// sessions.
    pub async fn verify_login(
        &self,
        pending_token: &str,
        code: &str,
    ) -> Result<AuthenticatedSession> {
        let claims = self.sessions.codec().verify_mfa_pending(pending_token)?;

        let pending_hash = hash_token(pending_token);
        if self.store.is_access_token_revoked(&pending_hash).await? {
            return Err(AuthError::TokenAlreadyConsumed);
        }

        let user_id = claims.user_id()?;
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let enrollment = self
            .store
            .mfa_enrollment(user_id)
            .await?
            .filter(|e| e.enabled)
            .ok_or(AuthError::MfaNotEnabled)?;

        if !totp::verify_code(&enrollment.secret, code, self.clock.now())? {
            return Err(AuthError::InvalidMfaCode);
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or_else(|| self.clock.now());
        self.store
            .insert_revoked_access_token(RevokedAccessToken {
                token_hash: pending_hash,
                user_id,
                expires_at,
            })
            .await?;

        let session = self.sessions.issue_session(&user).await?;
        info!(user_id = %user_id, "second factor verified");
        Ok(session)
    }
}
