/// Password-reset and email-verification flow tests: dual rate limiting,
/// single-use tokens, supersession and delivery rollback.
mod common;

use chrono::Duration;

use auth_core::{AuthError, LoginOutcome};
use common::{TestEnv, OTHER_STRONG_PASSWORD, STRONG_PASSWORD};

const ORIGIN: &str = "203.0.113.10";

/// Given: a verified user who forgot their password
/// When: they request a reset and consume the delivered token
/// Then: the new password logs in and the old one does not
#[tokio::test]
async fn test_password_reset_happy_path() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let token = env.notifier.last_recovery_token().unwrap();

    env.recovery
        .reset_password(&token, OTHER_STRONG_PASSWORD)
        .await
        .unwrap();

    let err = env
        .sessions
        .login("alice@example.com", STRONG_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    let outcome = env
        .sessions
        .login("alice@example.com", OTHER_STRONG_PASSWORD)
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

/// Given: an email with no account behind it
/// When: a reset is requested
/// Then: the call succeeds with nothing delivered, and still counts toward
/// both rate limits
#[tokio::test]
async fn test_unknown_email_is_indistinguishable() {
    let env = TestEnv::new();

    for _ in 0..3 {
        env.recovery
            .request_password_reset("ghost@example.com", ORIGIN)
            .await
            .unwrap();
    }
    assert_eq!(env.notifier.recovery_count(), 0);

    let err = env
        .recovery
        .request_password_reset("ghost@example.com", ORIGIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { .. }));
}

/// Given: three reset requests for one email within the window
/// When: a fourth arrives
/// Then: RateLimited until the lockout elapses
#[tokio::test]
async fn test_per_email_rate_limit() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    for _ in 0..3 {
        env.recovery
            .request_password_reset("alice@example.com", ORIGIN)
            .await
            .unwrap();
    }
    let err = env
        .recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { .. }));

    env.clock
        .advance(Duration::seconds(env.config.reset_lockout_secs + 1));
    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
}

/// Given: one origin spraying requests across many different emails
/// When: the origin budget is spent
/// Then: further requests from that origin are refused, while a different
/// origin still goes through
#[tokio::test]
async fn test_per_origin_rate_limit() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    for i in 0..10 {
        env.recovery
            .request_password_reset(&format!("probe{i}@example.com"), ORIGIN)
            .await
            .unwrap();
    }
    let err = env
        .recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { .. }));

    env.recovery
        .request_password_reset("alice@example.com", "198.51.100.7")
        .await
        .unwrap();
}

/// Given: a consumed reset token
/// When: it is presented again
/// Then: the second attempt finds nothing
#[tokio::test]
async fn test_reset_token_is_single_use() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let token = env.notifier.last_recovery_token().unwrap();

    env.recovery
        .reset_password(&token, OTHER_STRONG_PASSWORD)
        .await
        .unwrap();
    let err = env
        .recovery
        .reset_password(&token, STRONG_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));
}

/// Given: two reset requests for the same email
/// When: the first token is presented
/// Then: it was superseded by the second and no longer works
#[tokio::test]
async fn test_new_request_supersedes_old_token() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let first = env.notifier.last_recovery_token().unwrap();
    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let second = env.notifier.last_recovery_token().unwrap();
    assert_ne!(first, second);

    let err = env
        .recovery
        .reset_password(&first, OTHER_STRONG_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));
    env.recovery
        .reset_password(&second, OTHER_STRONG_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expired_reset_token_rejected() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let token = env.notifier.last_recovery_token().unwrap();

    env.clock
        .advance(Duration::seconds(env.config.reset_token_ttl_secs + 1));
    let err = env
        .recovery
        .reset_password(&token, OTHER_STRONG_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired));
}

/// Given: a weak replacement password
/// When: reset_password rejects it
/// Then: the token is not consumed and still works with a strong password
#[tokio::test]
async fn test_weak_password_does_not_burn_token() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let token = env.notifier.last_recovery_token().unwrap();

    let err = env
        .recovery
        .reset_password(&token, "password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword(_)));

    env.recovery
        .reset_password(&token, OTHER_STRONG_PASSWORD)
        .await
        .unwrap();
}

/// Given: delivery of the reset message fails
/// When: request_password_reset returns the error
/// Then: no live token remains behind for that email
#[tokio::test]
async fn test_failed_delivery_rolls_back_token() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    // Seed a working token first, then fail a second request.
    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let first = env.notifier.last_recovery_token().unwrap();

    let failing = env.failing_recovery();
    let err = failing
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Notification(_)));

    // The failed request superseded the first token and then rolled its own
    // back, so nothing is redeemable.
    let err = env
        .recovery
        .reset_password(&first, OTHER_STRONG_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));
}

/// Given: a locked-out account
/// When: a password reset completes
/// Then: the lockout is cleared and old sessions are revoked
#[tokio::test]
async fn test_reset_clears_lockout_and_revokes_sessions() {
    let env = TestEnv::new();
    env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;

    let session = match env
        .sessions
        .login("alice@example.com", STRONG_PASSWORD)
        .await
        .unwrap()
    {
        LoginOutcome::Authenticated(session) => session,
        LoginOutcome::MfaRequired { .. } => panic!("expected full session"),
    };
    env.clock.advance(Duration::seconds(30));

    for _ in 0..5 {
        let _ = env.sessions.login("alice@example.com", "Wrong-Password-1").await;
    }
    assert!(matches!(
        env.sessions
            .login("alice@example.com", STRONG_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::AccountLocked { .. }
    ));

    env.recovery
        .request_password_reset("alice@example.com", ORIGIN)
        .await
        .unwrap();
    let token = env.notifier.last_recovery_token().unwrap();
    env.recovery
        .reset_password(&token, OTHER_STRONG_PASSWORD)
        .await
        .unwrap();

    // Lockout gone, old session dead, new password works.
    assert!(env
        .sessions
        .authenticate(&session.tokens.access_token)
        .await
        .is_err());
    assert!(env.sessions.refresh(&session.tokens.refresh_token).await.is_err());
    let outcome = env
        .sessions
        .login("alice@example.com", OTHER_STRONG_PASSWORD)
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

/// Given: a fresh registration
/// When: the verification token is confirmed
/// Then: login opens up; replaying the token fails
#[tokio::test]
async fn test_email_verification_flow() {
    let env = TestEnv::new();
    let user = env
        .sessions
        .register("bob@example.com", "Bob", STRONG_PASSWORD, auth_core::Role::Client)
        .await
        .unwrap();
    assert!(!user.email_verified);

    assert!(matches!(
        env.sessions
            .login("bob@example.com", STRONG_PASSWORD)
            .await
            .unwrap_err(),
        AuthError::EmailNotVerified
    ));

    env.recovery.request_email_verification(user.id).await.unwrap();
    let token = env.notifier.last_verification_token().unwrap();
    env.recovery.confirm_email_verification(&token).await.unwrap();

    let outcome = env
        .sessions
        .login("bob@example.com", STRONG_PASSWORD)
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));

    let err = env
        .recovery
        .confirm_email_verification(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));
}

/// Given: an already verified user
/// When: another verification is requested
/// Then: it is a no-op and nothing is delivered
#[tokio::test]
async fn test_verification_request_idempotent_when_verified() {
    let env = TestEnv::new();
    let user = env.create_verified_user("alice@example.com", STRONG_PASSWORD).await;
    let delivered = env.notifier.verification.lock().unwrap().len();

    env.recovery.request_email_verification(user.id).await.unwrap();
    assert_eq!(env.notifier.verification.lock().unwrap().len(), delivered);
}

#[tokio::test]
async fn test_expired_verification_token_rejected() {
    let env = TestEnv::new();
    let user = env
        .sessions
        .register("bob@example.com", "Bob", STRONG_PASSWORD, auth_core::Role::Client)
        .await
        .unwrap();

    env.recovery.request_email_verification(user.id).await.unwrap();
    let token = env.notifier.last_verification_token().unwrap();

    env.clock
        .advance(Duration::seconds(env.config.verification_token_ttl_secs + 1));
    let err = env
        .recovery
        .confirm_email_verification(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired));
}
