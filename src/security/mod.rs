/// Security primitives for the authentication core
///
/// - **password**: Argon2id hashing for the username/password channel
/// - **totp**: time-based one-time codes, treated as a trusted primitive
pub mod password;
pub mod totp;

pub use password::{hash_password, verify_password};
pub use totp::Totp;
