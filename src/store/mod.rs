/// Durable-store seam.
///
/// Every operation the engine needs is expressed against this trait; the
/// store is the sole serialization point, so methods that must not lose
/// updates under concurrency (refresh rotation, attempt increments,
/// recovery-token supersession and consumption) are single trait calls
/// rather than get/put sequences a caller could interleave.
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attempts::AttemptPolicy;
use crate::error::Result;
use crate::models::{
    AttemptCounter, AttemptScope, MfaEnrollment, RecoveryKind, RecoveryTokenRecord,
    RefreshTokenRecord, RevokedAccessToken, User,
};

pub use memory::MemoryStore;

/// Outcome of a conditional refresh-token rotation.
#[derive(Debug)]
pub enum RotationOutcome {
    /// The old row existed and was atomically replaced; carries the old row.
    Rotated(RefreshTokenRecord),
    /// The old row existed but had expired; it has been deleted.
    Expired,
    NotFound,
}

/// Outcome of an atomic recovery-token consumption.
#[derive(Debug)]
pub enum RecoveryLookup {
    /// Found and removed; the token can never be consumed again.
    Consumed(RecoveryTokenRecord),
    /// Found but past its expiry; deleted on detection.
    Expired,
    NotFound,
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    // -- users / credentials ------------------------------------------------

    /// Insert a new user; fails with `EmailAlreadyExists` on a duplicate.
    async fn create_user(&self, user: User) -> Result<User>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Replace the credential wholesale (password change / reset).
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;
    async fn set_email_verified(&self, id: Uuid) -> Result<()>;
    /// Move the per-user watermark; access tokens issued earlier go stale.
    async fn set_last_logout_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    // -- refresh tokens -----------------------------------------------------

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<()>;
    /// Conditional replace keyed by the current token hash. Exactly one of
    /// two concurrent rotations of the same token can succeed.
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome>;
    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64>;
    async fn sweep_expired_refresh_tokens(&self, user_id: Uuid, now: DateTime<Utc>)
        -> Result<u64>;

    // -- revocation ledger --------------------------------------------------

    async fn insert_revoked_access_token(&self, record: RevokedAccessToken) -> Result<()>;
    async fn is_access_token_revoked(&self, token_hash: &str) -> Result<bool>;
    /// Drop ledger rows whose tokens have expired on their own. Pure garbage
    /// collection; correctness never depends on when this runs.
    async fn sweep_revoked_access_tokens(&self, now: DateTime<Utc>) -> Result<u64>;

    // -- attempt counters ---------------------------------------------------

    async fn attempt_counter(
        &self,
        scope: AttemptScope,
        key: &str,
    ) -> Result<Option<AttemptCounter>>;
    /// Atomic increment/reset/lock per `attempts::apply_failure`.
    async fn record_failure(
        &self,
        scope: AttemptScope,
        key: &str,
        now: DateTime<Utc>,
        policy: &AttemptPolicy,
    ) -> Result<AttemptCounter>;
    async fn clear_attempts(&self, scope: AttemptScope, key: &str) -> Result<()>;

    // -- recovery tokens ----------------------------------------------------

    /// Transactional upsert keyed by owner: a new token supersedes any prior
    /// live token for the same identity.
    async fn put_recovery_token(
        &self,
        kind: RecoveryKind,
        record: RecoveryTokenRecord,
    ) -> Result<()>;
    /// Atomic single-use consume by token hash.
    async fn take_recovery_token(
        &self,
        kind: RecoveryKind,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RecoveryLookup>;
    /// Rollback hook for failed notification delivery.
    async fn delete_recovery_token_for_owner(&self, kind: RecoveryKind, owner: &str)
        -> Result<()>;

    // -- MFA enrollments ----------------------------------------------------

    async fn mfa_enrollment(&self, user_id: Uuid) -> Result<Option<MfaEnrollment>>;
    async fn put_mfa_enrollment(&self, enrollment: MfaEnrollment) -> Result<()>;
    async fn delete_mfa_enrollment(&self, user_id: Uuid) -> Result<()>;
}
