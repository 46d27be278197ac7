/// In-memory reference implementation of `AuthStore`.
///
/// All tables live behind one async mutex, so every trait method executes as
/// a single critical section; that is what makes the conditional rotation,
/// counter increments, and token supersession atomic here. A relational or
/// key-value backend supplies the same guarantees with conditional updates
/// or transactions.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::attempts::{apply_failure, AttemptPolicy};
use crate::error::{AuthError, Result};
use crate::models::{
    AttemptCounter, AttemptScope, MfaEnrollment, RecoveryKind, RecoveryTokenRecord,
    RefreshTokenRecord, RevokedAccessToken, User,
};
use crate::store::{AuthStore, RecoveryLookup, RotationOutcome};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    revoked_access_tokens: HashMap<String, RevokedAccessToken>,
    attempts: HashMap<(AttemptScope, String), AttemptCounter>,
    // Keyed by owner identity: at most one live token per owner and kind.
    recovery_tokens: HashMap<(RecoveryKind, String), RecoveryTokenRecord>,
    mfa_enrollments: HashMap<Uuid, MfaEnrollment>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .values()
            .any(|existing| existing.email == user.email)
        {
            return Err(AuthError::EmailAlreadyExists);
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        user.email_verified = true;
        Ok(())
    }

    async fn set_last_logout_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        user.last_logout_at = Some(at);
        Ok(())
    }

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .refresh_tokens
            .insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome> {
        let mut tables = self.tables.lock().await;

        let Some(old) = tables.refresh_tokens.remove(old_hash) else {
            return Ok(RotationOutcome::NotFound);
        };

        if old.is_expired(now) {
            // Already removed above; expired rows are deleted on detection.
            return Ok(RotationOutcome::Expired);
        }

        tables.refresh_tokens.insert(
            new_hash.to_string(),
            RefreshTokenRecord {
                token_hash: new_hash.to_string(),
                user_id: old.user_id,
                expires_at: new_expires_at,
            },
        );

        Ok(RotationOutcome::Rotated(old))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, record| record.user_id != user_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn sweep_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, record| record.user_id != user_id || !record.is_expired(now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn insert_revoked_access_token(&self, record: RevokedAccessToken) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .revoked_access_tokens
            .insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn is_access_token_revoked(&self, token_hash: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.revoked_access_tokens.contains_key(token_hash))
    }

    async fn sweep_revoked_access_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.revoked_access_tokens.len();
        tables
            .revoked_access_tokens
            .retain(|_, record| record.expires_at > now);
        Ok((before - tables.revoked_access_tokens.len()) as u64)
    }

    async fn attempt_counter(
        &self,
        scope: AttemptScope,
        key: &str,
    ) -> Result<Option<AttemptCounter>> {
        let tables = self.tables.lock().await;
        Ok(tables.attempts.get(&(scope, key.to_string())).cloned())
    }

    async fn record_failure(
        &self,
        scope: AttemptScope,
        key: &str,
        now: DateTime<Utc>,
        policy: &AttemptPolicy,
    ) -> Result<AttemptCounter> {
        let mut tables = self.tables.lock().await;
        let map_key = (scope, key.to_string());
        let updated = apply_failure(tables.attempts.get(&map_key), now, policy);
        tables.attempts.insert(map_key, updated.clone());
        Ok(updated)
    }

    async fn clear_attempts(&self, scope: AttemptScope, key: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.attempts.remove(&(scope, key.to_string()));
        Ok(())
    }

    async fn put_recovery_token(
        &self,
        kind: RecoveryKind,
        record: RecoveryTokenRecord,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        // Upsert keyed by owner: replaces any prior unconsumed token.
        tables
            .recovery_tokens
            .insert((kind, record.owner.clone()), record);
        Ok(())
    }

    async fn take_recovery_token(
        &self,
        kind: RecoveryKind,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RecoveryLookup> {
        let mut tables = self.tables.lock().await;

        let Some(owner) = tables
            .recovery_tokens
            .iter()
            .find(|((k, _), record)| *k == kind && record.token_hash == token_hash)
            .map(|((_, owner), _)| owner.clone())
        else {
            return Ok(RecoveryLookup::NotFound);
        };

        let Some(record) = tables.recovery_tokens.remove(&(kind, owner)) else {
            return Ok(RecoveryLookup::NotFound);
        };

        if record.expires_at <= now {
            return Ok(RecoveryLookup::Expired);
        }

        Ok(RecoveryLookup::Consumed(record))
    }

    async fn delete_recovery_token_for_owner(
        &self,
        kind: RecoveryKind,
        owner: &str,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.recovery_tokens.remove(&(kind, owner.to_string()));
        Ok(())
    }

    async fn mfa_enrollment(&self, user_id: Uuid) -> Result<Option<MfaEnrollment>> {
        let tables = self.tables.lock().await;
        Ok(tables.mfa_enrollments.get(&user_id).cloned())
    }

    async fn put_mfa_enrollment(&self, enrollment: MfaEnrollment) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.mfa_enrollments.insert(enrollment.user_id, enrollment);
        Ok(())
    }

    async fn delete_mfa_enrollment(&self, user_id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.mfa_enrollments.remove(&user_id);
        Ok(())
    }
}
