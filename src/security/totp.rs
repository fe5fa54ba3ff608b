/// Time-based one-time password primitive
///
/// Trusted boundary for the optional second factor: enroll a secret, verify
/// a code against secret + time window. Callers treat it as correct and
/// constant-time.
use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use rand::Rng;
use totp_lite::{totp, Sha1};

use crate::error::{AuthError, Result};
use crate::models::{TotpCode, TotpSecret};

const SECRET_BYTES: usize = 20;
const TIME_STEP_SECS: u64 = 30;
const CODE_DIGITS: usize = 6;

pub struct Totp;

impl Totp {
    /// Enroll a fresh secret and its otpauth provisioning URI.
    ///
    /// The URI is what an authenticator app consumes (usually via QR code);
    /// `account` labels the entry in the app.
    pub fn enroll(account: &str) -> (TotpSecret, String) {
        let mut secret_bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill(&mut secret_bytes);

        let secret = base64_engine.encode(secret_bytes);
        let uri = format!(
            "otpauth://totp/identity-core:{}?secret={}&issuer=identity-core",
            urlencoding::encode(account),
            secret
        );

        (TotpSecret::new(secret), uri)
    }

    /// Verify a code against the secret for the current time window
    pub fn verify(secret: &TotpSecret, code: &TotpCode) -> Result<bool> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|_| AuthError::Internal("system clock before epoch".to_string()))?
            .as_secs();
        Self::verify_at(secret, code, now)
    }

    /// Clock-explicit variant of `verify`
    pub fn verify_at(secret: &TotpSecret, code: &TotpCode, unix_secs: u64) -> Result<bool> {
        if code.as_str().len() != CODE_DIGITS {
            return Ok(false);
        }

        let secret_bytes = base64_engine
            .decode(secret.as_str())
            .map_err(|_| AuthError::Validation("malformed TOTP secret".to_string()))?;
        if secret_bytes.len() != SECRET_BYTES {
            return Err(AuthError::Validation("malformed TOTP secret".to_string()));
        }

        let time_step = unix_secs / TIME_STEP_SECS;
        let expected = format!("{:06}", totp::<Sha1>(&secret_bytes, time_step));

        Ok(expected == code.as_str())
    }

    /// Code for the window containing `unix_secs`; test harness helper
    pub fn code_at(secret: &TotpSecret, unix_secs: u64) -> Result<TotpCode> {
        let secret_bytes = base64_engine
            .decode(secret.as_str())
            .map_err(|_| AuthError::Validation("malformed TOTP secret".to_string()))?;
        let code = totp::<Sha1>(&secret_bytes, unix_secs / TIME_STEP_SECS);
        Ok(TotpCode::new(format!("{:06}", code)))
    }
}
