/// Stateless signed-token codec.
///
/// Access tokens and MFA-pending assertions are HS256 JWTs; one fixed
/// algorithm, so tokens signed any other way are rejected outright
/// (algorithm confusion is a failure mode to guard against). Opaque tokens
/// (refresh, reset, verification) come from a CSPRNG and carry no structure.
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AuthError, Result};
use crate::models::{Role, User};

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Entropy of opaque refresh/reset/verification tokens.
const OPAQUE_TOKEN_BYTES: usize = 32;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_MFA_PENDING: &str = "mfa_pending";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id as UUID string)
    pub sub: String,
    pub email: String,
    pub role: String,
    /// "access" or "mfa_pending"
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }

    pub fn role(&self) -> Result<Role> {
        Role::parse(&self.role).ok_or(AuthError::InvalidToken)
    }
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    mfa_pending_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(
        secret: &str,
        access_ttl: Duration,
        mfa_pending_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            mfa_pending_ttl,
            clock,
        }
    }

    /// Sign a short-lived access token for an authenticated user.
    pub fn sign_access(&self, user: &User) -> Result<String> {
        self.sign(user, TOKEN_TYPE_ACCESS, self.access_ttl)
    }

    /// Sign the assertion handed back when a password check succeeds for an
    /// MFA-enabled account. Proves the first factor, grants nothing else.
    pub fn sign_mfa_pending(&self, user: &User) -> Result<String> {
        self.sign(user, TOKEN_TYPE_MFA_PENDING, self.mfa_pending_ttl)
    }

    fn sign(&self, user: &User, token_type: &str, ttl: Duration) -> Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            token_type: token_type.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|_| AuthError::Internal("Failed to sign token".to_string()))
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, TOKEN_TYPE_ACCESS)
    }

    pub fn verify_mfa_pending(&self, token: &str) -> Result<Claims> {
        self.verify(token, TOKEN_TYPE_MFA_PENDING)
    }

    fn verify(&self, token: &str, expected_type: &str) -> Result<Claims> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        // Expiry is enforced against the injected clock below, not the
        // library's view of system time.
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        let claims = data.claims;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        if claims.token_type != expected_type {
            return Err(AuthError::InvalidToken);
        }
        if claims.sub.is_empty() || claims.email.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

/// Generate an opaque high-entropy token, hex-encoded.
///
/// Never derived from anything predictable; the string is purely a lookup
/// key on the server side.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// SHA-256 digest used as the storage key for any server-side token row.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
