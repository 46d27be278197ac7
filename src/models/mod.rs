pub mod tokens;
pub mod user;

pub use tokens::{
    AttemptCounter, AttemptScope, MfaEnrollment, RecoveryKind, RecoveryTokenRecord,
    RefreshTokenRecord, RevokedAccessToken, TokenPair,
};
pub use user::{Role, User, UserSummary};
