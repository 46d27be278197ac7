/// TOTP second factor, RFC 4226/6238: HMAC-SHA1, 30-second steps, 6 digits.
///
/// Verification accepts the adjacent time steps (±1) to absorb clock drift
/// between the server and the authenticator app. Codes are compared in
/// constant time.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

use crate::error::{AuthError, Result};

type HmacSha1 = Hmac<Sha1>;

const STEP_SECS: i64 = 30;
const SECRET_BYTES: usize = 32;

/// Generate a fresh shared secret, Base32-encoded (RFC 4648).
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..SECRET_BYTES).map(|_| rng.gen::<u8>()).collect();
    base32_encode(&bytes)
}

/// Build the otpauth:// URI an authenticator app enrolls from.
pub fn provisioning_uri(email: &str, secret: &str, issuer: &str) -> String {
    let account = urlencoding::encode(email);
    let issuer = urlencoding::encode(issuer);
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits=6&period=30"
    )
}

/// Verify a 6-digit code against a Base32 secret at the given instant.
///
/// Returns `Ok(false)` for malformed or non-matching codes; only an
/// undecodable stored secret is an error.
pub fn verify_code(secret: &str, code: &str, now: DateTime<Utc>) -> Result<bool> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }

    let secret_bytes = base32_decode(secret)
        .ok_or_else(|| AuthError::Internal("Invalid Base32 TOTP secret".to_string()))?;

    let current_step = now.timestamp() / STEP_SECS;

    for step_offset in [-1i64, 0, 1] {
        let step = (current_step + step_offset) as u64;
        let expected = hotp(&secret_bytes, step)?;

        if constant_time_compare(code.as_bytes(), expected.as_bytes()) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// The code valid at `now` for a Base32 secret. Exposed for tests and
/// enrollment tooling.
pub fn code_at(secret: &str, now: DateTime<Utc>) -> Result<String> {
    let secret_bytes = base32_decode(secret)
        .ok_or_else(|| AuthError::Internal("Invalid Base32 TOTP secret".to_string()))?;
    hotp(&secret_bytes, (now.timestamp() / STEP_SECS) as u64)
}

/// HMAC-SHA1 code for one counter value (RFC 6238 dynamic truncation).
fn hotp(secret: &[u8], counter: u64) -> Result<String> {
    let counter_bytes = counter.to_be_bytes();

    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|_| AuthError::Internal("Invalid HMAC key".to_string()))?;
    mac.update(&counter_bytes);
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let p = u32::from_be_bytes([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);

    Ok(format!("{:06}", p % 1_000_000))
}

/// Base32 encoding (RFC 4648)
fn base32_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut output = String::new();
    let mut buffer = 0u32;
    let mut buffer_size = 0;

    for byte in data {
        buffer = (buffer << 8) | (*byte as u32);
        buffer_size += 8;

        while buffer_size >= 5 {
            buffer_size -= 5;
            let index = ((buffer >> buffer_size) & 0x1f) as usize;
            output.push(ALPHABET[index] as char);
        }
    }

    if buffer_size > 0 {
        buffer <<= 5 - buffer_size;
        let index = (buffer & 0x1f) as usize;
        output.push(ALPHABET[index] as char);
    }

    while output.len() % 8 != 0 {
        output.push('=');
    }

    output
}

/// Base32 decoding (RFC 4648)
fn base32_decode(data: &str) -> Option<Vec<u8>> {
    let data = data.trim_end_matches('=');
    let mut buffer = 0u32;
    let mut buffer_size = 0;
    let mut output = Vec::new();

    for ch in data.chars() {
        let value = match ch {
            'A'..='Z' => (ch as u32) - ('A' as u32),
            '2'..='7' => (ch as u32) - ('2' as u32) + 26,
            _ => return None,
        };

        buffer = (buffer << 5) | value;
        buffer_size += 5;

        if buffer_size >= 8 {
            buffer_size -= 8;
            output.push(((buffer >> buffer_size) & 0xff) as u8);
        }
    }

    Some(output)
}

/// Constant-time comparison to prevent timing side channels.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
