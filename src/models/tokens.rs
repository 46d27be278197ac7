/// Server-side token and counter records.
///
/// Opaque tokens (refresh, reset, verification) are stored by their SHA-256
/// digest; the raw value exists only in the response that hands it to its
/// owner.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access + refresh token pair returned on successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedAccessToken {
    pub token_hash: String,
    pub user_id: Uuid,
    /// The token's own expiry; the ledger row is garbage after this.
    pub expires_at: DateTime<Utc>,
}

/// Windowed failure counter for one identity key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptCounter {
    pub attempts: u32,
    pub last_attempt_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Which protected action a counter guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptScope {
    /// Login failures, keyed by email.
    Login,
    /// Password-reset requests, keyed by email.
    ResetEmail,
    /// Password-reset requests, keyed by origin address.
    ResetOrigin,
}

/// Single-use recovery token: password reset or email verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryTokenRecord {
    pub token_hash: String,
    /// Email for password reset, user id for email verification.
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryKind {
    PasswordReset,
    EmailVerification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaEnrollment {
    pub user_id: Uuid,
    /// Base32-encoded TOTP secret, persisted only once enrollment is proven.
    pub secret: String,
    pub enabled: bool,
}
