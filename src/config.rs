/// Configuration management
use chrono::Duration;
use serde::Deserialize;

use crate::attempts::AttemptPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing access and MFA-pending tokens.
    pub jwt_secret: String,

    /// Issuer label embedded in TOTP provisioning URIs.
    #[serde(default = "default_totp_issuer")]
    pub totp_issuer: String,

    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: i64,
    #[serde(default = "default_mfa_pending_ttl_secs")]
    pub mfa_pending_ttl_secs: i64,
    #[serde(default = "default_reset_token_ttl_secs")]
    pub reset_token_ttl_secs: i64,
    #[serde(default = "default_verification_token_ttl_secs")]
    pub verification_token_ttl_secs: i64,

    /// Failed logins allowed per email within the attempt window.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    #[serde(default = "default_login_window_secs")]
    pub login_attempt_window_secs: i64,
    #[serde(default = "default_login_lockout_secs")]
    pub login_lockout_secs: i64,

    /// Password-reset requests allowed per email within the reset window.
    #[serde(default = "default_reset_email_max_requests")]
    pub reset_email_max_requests: u32,
    /// Password-reset requests allowed per origin address within the window.
    #[serde(default = "default_reset_origin_max_requests")]
    pub reset_origin_max_requests: u32,
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: i64,
    #[serde(default = "default_reset_lockout_secs")]
    pub reset_lockout_secs: i64,
}

fn default_totp_issuer() -> String {
    "auth-core".to_string()
}
fn default_access_token_ttl_secs() -> i64 {
    900 // 15 minutes
}
fn default_refresh_token_ttl_secs() -> i64 {
    7 * 24 * 60 * 60 // 7 days
}
fn default_mfa_pending_ttl_secs() -> i64 {
    300 // 5 minutes
}
fn default_reset_token_ttl_secs() -> i64 {
    900 // 15 minutes
}
fn default_verification_token_ttl_secs() -> i64 {
    24 * 60 * 60 // 24 hours
}
fn default_max_login_attempts() -> u32 {
    5
}
fn default_login_window_secs() -> i64 {
    900
}
fn default_login_lockout_secs() -> i64 {
    900
}
fn default_reset_email_max_requests() -> u32 {
    3
}
fn default_reset_origin_max_requests() -> u32 {
    10
}
fn default_reset_window_secs() -> i64 {
    3600
}
fn default_reset_lockout_secs() -> i64 {
    3600
}

impl AuthConfig {
    /// Load configuration from `AUTH_`-prefixed environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("AUTH_").from_env()
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_token_ttl_secs)
    }

    pub fn mfa_pending_ttl(&self) -> Duration {
        Duration::seconds(self.mfa_pending_ttl_secs)
    }

    pub fn reset_token_ttl(&self) -> Duration {
        Duration::seconds(self.reset_token_ttl_secs)
    }

    pub fn verification_token_ttl(&self) -> Duration {
        Duration::seconds(self.verification_token_ttl_secs)
    }

    pub fn login_attempt_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts: self.max_login_attempts,
            window: Duration::seconds(self.login_attempt_window_secs),
            lockout: Duration::seconds(self.login_lockout_secs),
        }
    }

    pub fn reset_email_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts: self.reset_email_max_requests,
            window: Duration::seconds(self.reset_window_secs),
            lockout: Duration::seconds(self.reset_lockout_secs),
        }
    }

    pub fn reset_origin_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts: self.reset_origin_max_requests,
            window: Duration::seconds(self.reset_window_secs),
            lockout: Duration::seconds(self.reset_lockout_secs),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // Development fallback only; deployments set AUTH_JWT_SECRET.
            jwt_secret: "insecure-dev-secret-change-me".to_string(),
            totp_issuer: default_totp_issuer(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            mfa_pending_ttl_secs: default_mfa_pending_ttl_secs(),
            reset_token_ttl_secs: default_reset_token_ttl_secs(),
            verification_token_ttl_secs: default_verification_token_ttl_secs(),
            max_login_attempts: default_max_login_attempts(),
            login_attempt_window_secs: default_login_window_secs(),
            login_lockout_secs: default_login_lockout_secs(),
            reset_email_max_requests: default_reset_email_max_requests(),
            reset_origin_max_requests: default_reset_origin_max_requests(),
            reset_window_secs: default_reset_window_secs(),
            reset_lockout_secs: default_reset_lockout_secs(),
        }
    }
}
