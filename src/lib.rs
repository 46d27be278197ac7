// Credential and session security engine

pub mod attempts;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod security;
pub mod services;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, Result};

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use models::{Role, TokenPair, User, UserSummary};
pub use notify::{LogNotifier, Notifier};
pub use services::{
    AuthenticatedSession, LoginOutcome, MfaEnrollmentChallenge, MfaService, RecoveryService,
    SessionService,
};
pub use store::{AuthStore, MemoryStore};
