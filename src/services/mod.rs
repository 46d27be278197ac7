/// Service layer: the operations the engine exposes, composed from the
/// store, codec, attempt guards and notifier seams.
pub mod mfa;
pub mod recovery;
pub mod session;

pub use mfa::{MfaEnrollmentChallenge, MfaService};
pub use recovery::RecoveryService;
pub use session::{AuthenticatedSession, LoginOutcome, SessionService};

/// Canonical form for email keys: trimmed, lowercased. Applied before any
/// lookup or counter access so `Bob@Example.com` and `bob@example.com` are
/// the same identity.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
