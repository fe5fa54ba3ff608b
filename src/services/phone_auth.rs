/// Phone Passwordless Service
///
/// Orchestrates phone-channel login, registration, and identity updates.
/// Phone-number verification itself is delegated to the transport boundary
/// and is not flow-tracked here; every operation is a single
/// request/response transaction.
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuthError, Result};
use crate::models::{
    AuthToken, CarrierType, CookieResponse, Identity, PhoneMetadata, PhoneNumber, SessionCookie,
    TokenResponse, UserId,
};
use crate::sessions::SessionIssuer;
use crate::store::IdentityStore;
use crate::validators::{mask_phone, validate_phone};

#[derive(Clone)]
pub struct PhoneAuthService {
    store: Arc<dyn IdentityStore>,
    sessions: Arc<SessionIssuer>,
}

impl PhoneAuthService {
    pub fn new(store: Arc<dyn IdentityStore>, sessions: Arc<SessionIssuer>) -> Self {
        Self { store, sessions }
    }

    /// Log in an existing phone identity with a bearer token.
    /// Phone login never auto-creates.
    pub async fn login_token(&self, phone: &PhoneNumber) -> Result<TokenResponse> {
        let identity = self.lookup(phone).await?;
        info!(phone = %mask_phone(phone.as_str()), "phone login (token)");
        Ok(self.sessions.issue_token(identity.id()))
    }

    /// Cookie-materialized variant of `login_token`
    pub async fn login_cookie(&self, phone: &PhoneNumber) -> Result<CookieResponse> {
        let identity = self.lookup(phone).await?;
        info!(phone = %mask_phone(phone.as_str()), "phone login (cookie)");
        Ok(self.sessions.issue_cookie(identity.id()))
    }

    /// Create-or-fetch an identity for this phone and issue a token session.
    /// Repeated calls are safe and return the same identity.
    pub async fn create_identity_with_session(
        &self,
        phone: &PhoneNumber,
        metadata: Option<&PhoneMetadata>,
    ) -> Result<TokenResponse> {
        let identity = self.create_or_fetch(phone, metadata).await?;
        Ok(self.sessions.issue_token(identity.id()))
    }

    /// Create-or-fetch an identity for this phone and issue a cookie session
    pub async fn create_identity_with_cookie(
        &self,
        phone: &PhoneNumber,
    ) -> Result<CookieResponse> {
        let identity = self.create_or_fetch(phone, None).await?;
        Ok(self.sessions.issue_cookie(identity.id()))
    }

    /// Create-or-fetch without materializing a session, for callers that
    /// establish the session in a later step
    pub async fn create_identity_no_session(&self, phone: &PhoneNumber) -> Result<UserId> {
        let identity = self.create_or_fetch(phone, None).await?;
        Ok(*identity.id())
    }

    /// Upgrade a device-bound account to a phone identity, or confirm an
    /// existing identity already carries this number
    pub async fn update_identity_from_device_account(
        &self,
        phone: &PhoneNumber,
        user_id: &UserId,
    ) -> Result<Identity> {
        self.check_phone(phone)?;

        if self.store.account_by_user_id(user_id).await?.is_some() {
            let identity = self.store.promote_account_to_phone(user_id, phone).await?;
            info!(
                user_id = %user_id,
                phone = %mask_phone(phone.as_str()),
                "device account upgraded to phone identity"
            );
            return Ok(identity);
        }

        let identity = self.store.get(user_id).await?;
        match identity.phone() {
            Some(bound) if bound == phone => Ok(identity),
            Some(_) => Err(AuthError::ChannelUpgradeConflict),
            None => self.store.attach_phone(user_id, phone).await,
        }
    }

    /// Replace the phone number on an existing identity
    pub async fn update_phone(&self, user_id: &UserId, phone: &PhoneNumber) -> Result<Identity> {
        self.check_phone(phone)?;
        let identity = self.store.replace_phone(user_id, phone).await?;
        info!(
            user_id = %user_id,
            phone = %mask_phone(phone.as_str()),
            "phone number updated"
        );
        Ok(identity)
    }

    pub async fn logout_token(&self, token: &AuthToken) -> Result<()> {
        self.sessions.revoke_token(token)
    }

    pub async fn logout_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        self.sessions.revoke_cookie(cookie)
    }

    async fn lookup(&self, phone: &PhoneNumber) -> Result<Identity> {
        self.check_phone(phone)?;
        self.store
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::IdentityNotFound)
    }

    async fn create_or_fetch(
        &self,
        phone: &PhoneNumber,
        metadata: Option<&PhoneMetadata>,
    ) -> Result<Identity> {
        self.check_phone(phone)?;
        screen_metadata(phone, metadata)?;

        let (identity, created) = self.store.create_or_fetch_phone_identity(phone).await?;
        if created {
            info!(
                user_id = %identity.id(),
                phone = %mask_phone(phone.as_str()),
                "phone identity created"
            );
        }
        Ok(identity)
    }

    fn check_phone(&self, phone: &PhoneNumber) -> Result<()> {
        if validate_phone(phone.as_str()) {
            Ok(())
        } else {
            Err(AuthError::Validation(
                "phone number must be in E.164 format (e.g. +14155551234)".to_string(),
            ))
        }
    }
}

/// Carrier metadata is advisory: only an outright fraudulent signal blocks
/// creation.
fn screen_metadata(phone: &PhoneNumber, metadata: Option<&PhoneMetadata>) -> Result<()> {
    if let Some(metadata) = metadata {
        if metadata.carrier == CarrierType::Invalid {
            warn!(
                phone = %mask_phone(phone.as_str()),
                "phone rejected by carrier signal"
            );
            return Err(AuthError::PhoneRejected(
                "carrier reports an invalid number".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::models::CountryCode;
    use crate::store::MemoryIdentityStore;

    fn service() -> PhoneAuthService {
        PhoneAuthService::new(
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(SessionIssuer::new(&SessionSettings::default())),
        )
    }

    fn phone() -> PhoneNumber {
        PhoneNumber::new("+14155551234")
    }

    #[tokio::test]
    async fn login_never_auto_creates() {
        let service = service();
        assert_eq!(
            service.login_token(&phone()).await,
            Err(AuthError::IdentityNotFound)
        );
    }

    #[tokio::test]
    async fn malformed_phone_is_rejected_up_front() {
        let service = service();
        assert!(matches!(
            service.login_token(&PhoneNumber::new("not-a-phone")).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn fraudulent_carrier_signal_rejects_creation() {
        let service = service();
        let metadata = PhoneMetadata {
            carrier: CarrierType::Invalid,
            country: Some(CountryCode::new("US")),
        };
        assert!(matches!(
            service
                .create_identity_with_session(&phone(), Some(&metadata))
                .await,
            Err(AuthError::PhoneRejected(_))
        ));
    }

    #[tokio::test]
    async fn advisory_metadata_does_not_block() {
        let service = service();
        let metadata = PhoneMetadata {
            carrier: CarrierType::Voip,
            country: None,
        };
        assert!(service
            .create_identity_with_session(&phone(), Some(&metadata))
            .await
            .is_ok());
    }
}
