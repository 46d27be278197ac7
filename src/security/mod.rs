/// Security primitives: password hashing, the signed-token codec, and TOTP.
pub mod jwt;
pub mod password;
pub mod totp;

pub use jwt::{generate_opaque_token, hash_token, Claims, TokenCodec};
pub use password::{hash_password, validate_password_strength, verify_password};
