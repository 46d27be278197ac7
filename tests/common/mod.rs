/// Shared test harness: in-memory store, manual clock and recording
/// notifier wired into the three services.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use auth_core::{
    AuthConfig, AuthError, ManualClock, MfaService, Notifier, RecoveryService, Result, Role,
    SessionService, UserSummary,
};
use auth_core::store::MemoryStore;

pub const STRONG_PASSWORD: &str = "Correct-Horse-9";
pub const OTHER_STRONG_PASSWORD: &str = "Battery-Staple-7";

/// Notifier that captures every token it is asked to deliver, so tests can
/// play the out-of-band channel.
#[derive(Default)]
pub struct RecordingNotifier {
    /// (identity, token) per password-reset message.
    pub recovery: Mutex<Vec<(String, String)>>,
    /// (identity, token) per email-verification message.
    pub verification: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn last_recovery_token(&self) -> Option<String> {
        self.recovery
            .lock()
            .unwrap()
            .last()
            .map(|(_, token)| token.clone())
    }

    pub fn last_verification_token(&self) -> Option<String> {
        self.verification
            .lock()
            .unwrap()
            .last()
            .map(|(_, token)| token.clone())
    }

    pub fn recovery_count(&self) -> usize {
        self.recovery.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_recovery_message(&self, identity: &str, token: &str) -> Result<()> {
        self.recovery
            .lock()
            .unwrap()
            .push((identity.to_string(), token.to_string()));
        Ok(())
    }

    async fn send_verification_message(
        &self,
        identity: &str,
        _display_name: &str,
        token: &str,
    ) -> Result<()> {
        self.verification
            .lock()
            .unwrap()
            .push((identity.to_string(), token.to_string()));
        Ok(())
    }
}

/// Notifier whose deliveries always fail, for rollback tests.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_recovery_message(&self, _identity: &str, _token: &str) -> Result<()> {
        Err(AuthError::Notification("smtp unavailable".to_string()))
    }

    async fn send_verification_message(
        &self,
        _identity: &str,
        _display_name: &str,
        _token: &str,
    ) -> Result<()> {
        Err(AuthError::Notification("smtp unavailable".to_string()))
    }
}

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub sessions: SessionService,
    pub mfa: MfaService,
    pub recovery: RecoveryService,
    pub config: Arc<AuthConfig>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::default())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = Arc::new(config);

        let sessions = SessionService::new(store.clone(), config.clone(), clock.clone());
        let mfa = MfaService::new(
            store.clone(),
            sessions.clone(),
            clock.clone(),
            &config.totp_issuer,
        );
        let recovery = RecoveryService::new(
            store.clone(),
            notifier.clone(),
            sessions.clone(),
            config.clone(),
            clock.clone(),
        );

        Self {
            store,
            clock,
            notifier,
            sessions,
            mfa,
            recovery,
            config,
        }
    }

    /// Build a recovery service whose deliveries always fail, sharing this
    /// environment's store and clock.
    pub fn failing_recovery(&self) -> RecoveryService {
        RecoveryService::new(
            self.store.clone(),
            Arc::new(FailingNotifier),
            self.sessions.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }

    /// Register a user and walk the email-verification flow so they can
    /// log in.
    pub async fn create_verified_user(&self, email: &str, password: &str) -> UserSummary {
        let user = self
            .sessions
            .register(email, "Test User", password, Role::Client)
            .await
            .expect("register");

        self.recovery
            .request_email_verification(user.id)
            .await
            .expect("request verification");
        let token = self
            .notifier
            .last_verification_token()
            .expect("verification token delivered");
        self.recovery
            .confirm_email_verification(&token)
            .await
            .expect("confirm verification");

        user
    }
}
