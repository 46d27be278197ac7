/// Core session lifecycle: registration, password login with lockout,
/// refresh rotation, logout and access-token authentication.
use chrono::TimeZone;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::attempts::AttemptGuard;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::models::{
    AttemptScope, RefreshTokenRecord, RevokedAccessToken, Role, TokenPair, User, UserSummary,
};
use crate::security::jwt::{self, Claims, TokenCodec};
use crate::security::{hash_password, validate_password_strength, verify_password};
use crate::services::normalize_email;
use crate::store::{AuthStore, RotationOutcome};

/// Tokens plus the public projection of the user they belong to.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub tokens: TokenPair,
    pub user: UserSummary,
}

/// What a successful password check yields: either a full session, or an
/// assertion that the second factor is still owed.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(AuthenticatedSession),
    MfaRequired { pending_token: String },
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn AuthStore>,
    codec: Arc<TokenCodec>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    login_guard: AttemptGuard,
}

impl SessionService {
    pub fn new(store: Arc<dyn AuthStore>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        let codec = Arc::new(TokenCodec::new(
            &config.jwt_secret,
            config.access_token_ttl(),
            config.mfa_pending_ttl(),
            clock.clone(),
        ));
        let login_guard = AttemptGuard::new(
            store.clone(),
            AttemptScope::Login,
            config.login_attempt_policy(),
            clock.clone(),
        );

        Self {
            store,
            codec,
            config,
            clock,
            login_guard,
        }
    }

    pub(crate) fn codec(&self) -> Arc<TokenCodec> {
        self.codec.clone()
    }

    /// Create a new account. The email starts unverified; login is refused
    /// until a verification token is confirmed.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
        role: Role,
    ) -> Result<UserSummary> {
        let email = normalize_email(email);
        validate_password_strength(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(User {
                id: uuid::Uuid::new_v4(),
                email,
                display_name: display_name.trim().to_string(),
                password_hash,
                role,
                email_verified: false,
                last_logout_at: None,
                created_at: self.clock.now(),
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(UserSummary::from(&user))
    }

    /// Password login.
    ///
    /// Order matters: the lockout gate runs before the credential is even
    /// looked at, unknown emails accrue failures exactly like known ones,
    /// and only a correct password clears the counter.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);

        if let Some(remaining) = self.login_guard.remaining_lock(&email).await? {
            warn!(email = %email, "login refused: account locked");
            return Err(AuthError::AccountLocked {
                retry_after_secs: remaining.num_seconds().max(1),
            });
        }

        let Some(user) = self.store.user_by_email(&email).await? else {
            self.login_guard.record_failure(&email).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            let counter = self.login_guard.record_failure(&email).await?;
            warn!(
                email = %email,
                attempts = counter.attempts,
                "failed login attempt"
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.login_guard.clear(&email).await?;

        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        if let Some(enrollment) = self.store.mfa_enrollment(user.id).await? {
            if enrollment.enabled {
                let pending_token = self.codec.sign_mfa_pending(&user)?;
                info!(user_id = %user.id, "password accepted, second factor required");
                return Ok(LoginOutcome::MfaRequired { pending_token });
            }
        }

        let session = self.issue_session(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutcome::Authenticated(session))
    }

    /// Rotate a refresh token: the presented token is consumed and replaced
    /// in one store operation, so a replayed token finds nothing.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let now = self.clock.now();
        let old_hash = jwt::hash_token(refresh_token);
        let new_raw = jwt::generate_opaque_token();
        let new_hash = jwt::hash_token(&new_raw);

        let old = match self
            .store
            .rotate_refresh_token(&old_hash, &new_hash, now + self.config.refresh_token_ttl(), now)
            .await?
        {
            RotationOutcome::Rotated(old) => old,
            RotationOutcome::Expired => return Err(AuthError::TokenExpired),
            RotationOutcome::NotFound => return Err(AuthError::InvalidToken),
        };

        let user = self
            .store
            .user_by_id(old.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let access_token = self.codec.sign_access(&user)?;
        self.store.sweep_expired_refresh_tokens(user.id, now).await?;

        info!(user_id = %user.id, "refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token: new_raw,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_ttl_secs,
        })
    }

    /// Log out: ledger the presented access token, move the user's watermark
    /// so every previously issued access token goes stale, and drop all of
    /// the user's refresh tokens.
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let claims = self.codec.verify_access(access_token)?;
        let user_id = claims.user_id()?;
        let now = self.clock.now();

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or_else(|| now + self.config.access_token_ttl());

        self.store
            .insert_revoked_access_token(RevokedAccessToken {
                token_hash: jwt::hash_token(access_token),
                user_id,
                expires_at,
            })
            .await?;
        self.store.set_last_logout_at(user_id, now).await?;
        let dropped = self.store.delete_refresh_tokens_for_user(user_id).await?;
        self.store.sweep_revoked_access_tokens(now).await?;

        info!(user_id = %user_id, refresh_tokens_dropped = dropped, "user logged out");
        Ok(())
    }

    /// Validate an access token for a protected operation.
    ///
    /// Three gates: signature + expiry, the revocation ledger, and the
    /// per-user watermark.
    pub async fn authenticate(&self, access_token: &str) -> Result<Claims> {
        let claims = self.codec.verify_access(access_token)?;

        if self
            .store
            .is_access_token_revoked(&jwt::hash_token(access_token))
            .await?
        {
            return Err(AuthError::InvalidToken);
        }

        let user_id = claims.user_id()?;
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if let Some(watermark) = user.last_logout_at {
            if claims.iat < watermark.timestamp() {
                return Err(AuthError::InvalidToken);
            }
        }

        Ok(claims)
    }

    /// Change the password of a logged-in user. Requires the current
    /// password and revokes every existing session on success.
    pub async fn change_password(
        &self,
        user_id: uuid::Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        validate_password_strength(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.store
            .update_password_hash(user_id, &password_hash)
            .await?;
        self.revoke_all_sessions(user_id).await?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Mint an access + refresh pair for a user whose factors are all proven.
    pub(crate) async fn issue_session(&self, user: &User) -> Result<AuthenticatedSession> {
        let access_token = self.codec.sign_access(user)?;

        let refresh_token = jwt::generate_opaque_token();
        self.store
            .insert_refresh_token(RefreshTokenRecord {
                token_hash: jwt::hash_token(&refresh_token),
                user_id: user.id,
                expires_at: self.clock.now() + self.config.refresh_token_ttl(),
            })
            .await?;

        Ok(AuthenticatedSession {
            tokens: TokenPair {
                access_token,
                refresh_token,
                token_type: "Bearer".to_string(),
                expires_in: self.config.access_token_ttl_secs,
            },
            user: UserSummary::from(user),
        })
    }

    /// Invalidate every session a user holds: watermark all access tokens
    /// and delete all refresh tokens. Used after password change, password
    /// reset and MFA state changes.
    pub(crate) async fn revoke_all_sessions(&self, user_id: uuid::Uuid) -> Result<()> {
        let now = self.clock.now();
        self.store.set_last_logout_at(user_id, now).await?;
        let dropped = self.store.delete_refresh_tokens_for_user(user_id).await?;
        info!(user_id = %user_id, refresh_tokens_dropped = dropped, "all sessions revoked");
        Ok(())
    }
}
