use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuthToken, SessionCookie, SessionId, UserId};

/// A logical session. References its identity by id, never by embedding;
/// the concrete materialization (token or cookie) is decided at issuance
/// and never switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, expires_at: DateTime<Utc>) -> Self {
        Session {
            id: SessionId::new(),
            user_id,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Bearer-token materialization of a session.
///
/// `user_id` is absent when the operation intentionally does not disclose
/// the identity (enumeration-resistant login paths).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: AuthToken,
    pub user_id: Option<UserId>,
}

impl TokenResponse {
    /// Strip the identity id for enumeration-sensitive responses
    pub fn redacted(mut self) -> Self {
        self.user_id = None;
        self
    }
}

/// Cookie materialization of a session.
///
/// `cookies_to_send` is an ordered sequence: replacing a prior session for
/// the same identity yields the rotated-out cookie followed by the new one,
/// and the caller must apply them in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieResponse {
    pub cookies_to_send: Vec<SessionCookie>,
    pub user_id: Option<UserId>,
}

impl CookieResponse {
    /// Strip the identity id for enumeration-sensitive responses
    pub fn redacted(mut self) -> Self {
        self.user_id = None;
        self
    }
}
