/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

use crate::error::{AuthError, Result};

/// Hash a password using Argon2id.
///
/// Every call draws a fresh random salt, so hashing the same password twice
/// yields two different strings.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Internal("Failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash.
///
/// A malformed hash is treated as a mismatch, never an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Validate password strength.
///
/// Shared by registration, password change, and password reset:
/// minimum 8 characters, at least one uppercase letter, one lowercase
/// letter, one digit, and one special character.
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword(
            "must be at least 8 characters".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AuthError::WeakPassword(
            "must contain an uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AuthError::WeakPassword(
            "must contain a lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "must contain a digit".to_string(),
        ));
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(AuthError::WeakPassword(
            "must contain a special character".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "SecurePass123!";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn test_wrong_password() {
        let password = "SecurePass123!";
        let hash = hash_password(password).unwrap();
        assert!(!verify_password("WrongPass123!", &hash));
    }

    #[test]
    fn test_same_password_distinct_hashes() {
        let password = "SecurePass123!";
        let first = hash_password(password).unwrap();
        let second = hash_password(password).unwrap();
        assert_ne!(first, second);
        assert!(verify_password(password, &first));
        assert!(verify_password(password, &second));
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("SecurePass123!", "not-a-phc-string"));
        assert!(!verify_password("SecurePass123!", ""));
    }

    #[test]
    fn test_weak_password_too_short() {
        assert!(validate_password_strength("Pass1!").is_err());
    }

    #[test]
    fn test_weak_password_no_uppercase() {
        assert!(validate_password_strength("securepass123!").is_err());
    }

    #[test]
    fn test_weak_password_no_digit() {
        assert!(validate_password_strength("SecurePass!").is_err());
    }

    #[test]
    fn test_weak_password_no_special() {
        assert!(validate_password_strength("SecurePass123").is_err());
    }

    #[test]
    fn test_weak_password_reason_is_itemized() {
        let err = validate_password_strength("securepass123!").unwrap_err();
        match err {
            crate::error::AuthError::WeakPassword(reason) => {
                assert!(reason.contains("uppercase"));
            }
            other => panic!("expected WeakPassword, got {other:?}"),
        }
    }

    #[test]
    fn test_strong_password_accepted() {
        assert!(validate_password_strength("SecurePass123!").is_ok());
    }
}
