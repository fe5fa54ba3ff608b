/// Session Issuer
///
/// Converts a successful authentication into either a bearer-token response
/// or a cookie-set response, and revokes either representation. This module
/// is the only minter of session ids; credentials are stored keyed by their
/// SHA-256 hash so a dump of the session store never leaks a live
/// credential.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as base64_engine, Engine as _};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::error::Result;
use crate::models::{AuthToken, CookieResponse, Session, SessionCookie, TokenResponse, UserId};

pub struct SessionIssuer {
    ttl: Duration,
    /// Token sessions keyed by credential hash
    tokens: DashMap<String, Session>,
    /// Cookie sessions keyed by credential hash
    cookies: DashMap<String, Session>,
    /// Live cookie credential per identity, for rotation
    cookie_by_user: DashMap<Uuid, (SessionCookie, String)>,
}

impl SessionIssuer {
    pub fn new(settings: &SessionSettings) -> Self {
        SessionIssuer {
            ttl: Duration::seconds(settings.ttl_secs),
            tokens: DashMap::new(),
            cookies: DashMap::new(),
            cookie_by_user: DashMap::new(),
        }
    }

    /// Mint a bearer token bound to the identity and record its session.
    /// The token is unguessable (256 bits of randomness) and unique across
    /// live sessions.
    pub fn issue_token(&self, user_id: &UserId) -> TokenResponse {
        let token = AuthToken::new(mint_credential());
        let session = Session::new(*user_id, Utc::now() + self.ttl);

        self.tokens.insert(credential_key(token.as_str()), session);

        info!(user_id = %user_id, "token session issued");
        TokenResponse {
            auth_token: token,
            user_id: Some(*user_id),
        }
    }

    /// Mint a cookie-backed session. When the identity already holds a live
    /// cookie session the prior one is revoked and the response carries the
    /// rotated-out cookie first, then the new one; the caller applies the
    /// sequence in order.
    pub fn issue_cookie(&self, user_id: &UserId) -> CookieResponse {
        let cookie = SessionCookie::new(mint_credential());
        let key = credential_key(cookie.as_str());
        let session = Session::new(*user_id, Utc::now() + self.ttl);

        let mut cookies_to_send = Vec::with_capacity(2);
        if let Some((_, (old_cookie, old_key))) = self.cookie_by_user.remove(&user_id.as_uuid()) {
            self.cookies.remove(&old_key);
            cookies_to_send.push(old_cookie);
        }

        self.cookies.insert(key.clone(), session);
        self.cookie_by_user
            .insert(user_id.as_uuid(), (cookie.clone(), key));
        cookies_to_send.push(cookie);

        info!(
            user_id = %user_id,
            rotated = cookies_to_send.len() > 1,
            "cookie session issued"
        );
        CookieResponse {
            cookies_to_send,
            user_id: Some(*user_id),
        }
    }

    /// Revoke a bearer token. Idempotent: an unknown or already-revoked
    /// token is success, failure is reserved for store unavailability.
    pub fn revoke_token(&self, token: &AuthToken) -> Result<()> {
        self.tokens.remove(&credential_key(token.as_str()));
        Ok(())
    }

    /// Revoke a cookie session. Same idempotency contract as `revoke_token`.
    pub fn revoke_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        let key = credential_key(cookie.as_str());
        if let Some((_, session)) = self.cookies.remove(&key) {
            // Drop the rotation entry only if it still points at this cookie
            self.cookie_by_user
                .remove_if(&session.user_id.as_uuid(), |_, (_, live_key)| {
                    *live_key == key
                });
        }
        Ok(())
    }

    /// Look up the live session behind a token, honoring expiry lazily
    pub fn session_for_token(&self, token: &AuthToken) -> Option<Session> {
        self.tokens
            .get(&credential_key(token.as_str()))
            .map(|entry| entry.clone())
            .filter(|session| !session.is_expired())
    }

    /// Look up the live session behind a cookie, honoring expiry lazily
    pub fn session_for_cookie(&self, cookie: &SessionCookie) -> Option<Session> {
        self.cookies
            .get(&credential_key(cookie.as_str()))
            .map(|entry| entry.clone())
            .filter(|session| !session.is_expired())
    }
}

/// 32 random bytes, URL-safe base64
fn mint_credential() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64_engine.encode(bytes)
}

/// Hex SHA-256 of a credential, used as the store key
fn credential_key(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hex::encode(hasher.finalize())
}
