use thiserror::Error;

/// Error taxonomy for the authentication engine.
///
/// Every variant except `Store`, `Notification` and `Internal` is an
/// expected, user-facing outcome. Display strings never carry secrets,
/// passwords, codes or token values.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password. Deliberately generic so the caller cannot
    /// distinguish an unknown email from a wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked, retry in {retry_after_secs} seconds")]
    AccountLocked { retry_after_secs: i64 },

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("Invalid MFA code")]
    InvalidMfaCode,

    #[error("MFA is already enabled")]
    MfaAlreadyEnabled,

    #[error("MFA is not enabled")]
    MfaNotEnabled,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token already consumed")]
    TokenAlreadyConsumed,

    #[error("Too many requests, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: i64 },

    #[error("Password does not meet the policy: {0}")]
    WeakPassword(String),

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}
