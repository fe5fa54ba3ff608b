use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nominal identifier types.
///
/// Every externally visible identifier gets its own wrapper so a cookie can
/// never be passed where a token is expected, and a registration flow id can
/// never be redeemed as a login flow id. All of them are opaque strings from
/// the caller's perspective.

macro_rules! opaque_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identity id, assigned at creation, immutable
    UserId
);
uuid_id!(
    /// Session id, minted only by the session issuer
    SessionId
);

opaque_string!(
    /// Opaque bearer credential for a token-materialized session
    AuthToken
);
opaque_string!(
    /// Opaque cookie value for a cookie-materialized session
    SessionCookie
);
opaque_string!(
    /// E.164 phone number
    PhoneNumber
);
opaque_string!(
    /// Username for the username/password channel
    AccountUsername
);
opaque_string!(
    /// Plaintext password, only ever held transiently
    AccountPassword
);
opaque_string!(
    /// TOTP shared secret (base64)
    TotpSecret
);
opaque_string!(
    /// Six-digit TOTP code
    TotpCode
);
opaque_string!(
    /// Code carried by a verification flow
    VerificationCode
);
opaque_string!(
    /// Flow id for a registration-purpose verification flow
    RegistrationFlowId
);
opaque_string!(
    /// Flow id for a login-purpose verification flow
    LoginFlowId
);
opaque_string!(
    /// ISO 3166-1 alpha-2 country code such as "US" or "FR"
    CountryCode
);

/// Email address, normalized to lowercase at construction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A flow id returned by the email channel: registration or login.
///
/// The two cases live in the same identifier space but are distinct types,
/// so the flow manager can never redeem one as the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailFlowId {
    Registration(RegistrationFlowId),
    Login(LoginFlowId),
}

impl EmailFlowId {
    pub fn as_str(&self) -> &str {
        match self {
            EmailFlowId::Registration(id) => id.as_str(),
            EmailFlowId::Login(id) => id.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn email_is_lowercased() {
        let email = EmailAddress::new("Alice@Example.COM");
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn flow_id_kinds_share_raw_space() {
        let reg = RegistrationFlowId::new("abc");
        let login = LoginFlowId::new("abc");
        assert_eq!(reg.as_str(), login.as_str());
        assert_ne!(
            EmailFlowId::Registration(reg),
            EmailFlowId::Login(login)
        );
    }
}
