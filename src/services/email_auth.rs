/// Email Passwordless Service
///
/// Orchestrates email-channel login, registration, and verification through
/// the flow manager, plus email/phone attachment mutations. The service,
/// not the caller, decides whether a flow is for registration or login, so
/// a caller can never forge a registration flow for an existing address.
use std::sync::Arc;

use tracing::info;

use crate::delivery::CodeDelivery;
use crate::error::{AuthError, Result};
use crate::flows::VerificationFlowManager;
use crate::models::{
    AuthToken, CookieResponse, EmailAddress, EmailFlowId, Identity, PhoneNumber, SessionCookie,
    TokenResponse, UserId, VerificationCode,
};
use crate::sessions::SessionIssuer;
use crate::store::IdentityStore;
use crate::validators::{mask_email, validate_email, validate_phone};

/// Outcome of redeeming an email verification code.
///
/// When `totp_required` is true the caller must pass a separate TOTP check
/// before asking for a session; this service issues no session on that
/// branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateCodeResult {
    pub email: EmailAddress,
    pub user_id: UserId,
    pub totp_required: bool,
}

#[derive(Clone)]
pub struct EmailAuthService {
    store: Arc<dyn IdentityStore>,
    flows: Arc<VerificationFlowManager>,
    sessions: Arc<SessionIssuer>,
    delivery: Arc<dyn CodeDelivery>,
}

impl EmailAuthService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        flows: Arc<VerificationFlowManager>,
        sessions: Arc<SessionIssuer>,
        delivery: Arc<dyn CodeDelivery>,
    ) -> Self {
        Self {
            store,
            flows,
            sessions,
            delivery,
        }
    }

    /// Open a verification flow for this address and send the code.
    /// Login-purpose when an identity with the email exists, otherwise
    /// registration-purpose.
    pub async fn send_email_with_code(&self, email: &EmailAddress) -> Result<EmailFlowId> {
        self.check_email(email)?;

        let exists = self.store.find_by_email(email).await?.is_some();
        let flow_id = if exists {
            EmailFlowId::Login(self.flows.issue_login(email, &*self.delivery).await?)
        } else {
            EmailFlowId::Registration(
                self.flows
                    .issue_registration(email, &*self.delivery)
                    .await?,
            )
        };

        info!(
            email = %mask_email(email.as_str()),
            login = exists,
            "verification code sent"
        );
        Ok(flow_id)
    }

    /// Redeem a verification code.
    ///
    /// A registration flow creates (or idempotently fetches) the email
    /// identity and marks the address verified; a login flow resolves the
    /// existing identity. Never issues a session.
    pub async fn validate_code(
        &self,
        code: &VerificationCode,
        flow_id: &EmailFlowId,
    ) -> Result<ValidateCodeResult> {
        match flow_id {
            EmailFlowId::Registration(id) => {
                let email = self.flows.validate_registration(id, code)?;
                let identity = match self.store.find_by_email(&email).await? {
                    // The address was attached (unverified) or registered
                    // while the flow was pending: promote in place.
                    Some(existing) => self.store.mark_email_verified(existing.id()).await?,
                    None => {
                        let (identity, _) = self
                            .store
                            .create_or_fetch_email_identity(&email, true)
                            .await?;
                        identity
                    }
                };
                info!(
                    user_id = %identity.id(),
                    email = %mask_email(email.as_str()),
                    "email verified via registration flow"
                );
                Ok(ValidateCodeResult {
                    email,
                    user_id: *identity.id(),
                    totp_required: identity.totp_enabled(),
                })
            }
            EmailFlowId::Login(id) => {
                let email = self.flows.validate_login(id, code)?;
                let mut identity = self
                    .store
                    .find_by_email(&email)
                    .await?
                    .ok_or(AuthError::IdentityNotFound)?;
                // A redeemed code proves ownership, so an address attached
                // unverified becomes verified here too.
                if !identity.email_verified() {
                    let id = *identity.id();
                    identity = self.store.mark_email_verified(&id).await?;
                }
                Ok(ValidateCodeResult {
                    email,
                    user_id: *identity.id(),
                    totp_required: identity.totp_enabled(),
                })
            }
        }
    }

    /// Issue a token session for a validated email identity.
    /// Only reachable after TOTP satisfaction when the identity requires it.
    /// The response withholds the identity id: the caller learned it from
    /// `validate_code`, and this path is addressable by email alone.
    pub async fn login_token(&self, email: &EmailAddress) -> Result<TokenResponse> {
        let identity = self.lookup(email).await?;
        info!(email = %mask_email(email.as_str()), "email login (token)");
        Ok(self.sessions.issue_token(identity.id()).redacted())
    }

    /// Cookie-materialized variant of `login_token`; same id suppression.
    pub async fn login_cookie(&self, email: &EmailAddress) -> Result<CookieResponse> {
        let identity = self.lookup(email).await?;
        info!(email = %mask_email(email.as_str()), "email login (cookie)");
        Ok(self.sessions.issue_cookie(identity.id()).redacted())
    }

    /// Attach an unverified email; verification happens through a later
    /// registration flow against the address
    pub async fn add_unverified_email_to_identity(
        &self,
        user_id: &UserId,
        email: &EmailAddress,
    ) -> Result<Identity> {
        self.check_email(email)?;
        self.store.attach_email(user_id, email, false).await
    }

    pub async fn add_phone_to_identity(
        &self,
        user_id: &UserId,
        phone: &PhoneNumber,
    ) -> Result<Identity> {
        if !validate_phone(phone.as_str()) {
            return Err(AuthError::Validation(
                "phone number must be in E.164 format".to_string(),
            ));
        }
        self.store.attach_phone(user_id, phone).await
    }

    /// Remove the email channel; the identity must keep at least one channel
    pub async fn remove_email_from_identity(&self, user_id: &UserId) -> Result<EmailAddress> {
        let removed = self.store.remove_email(user_id).await?;
        info!(user_id = %user_id, "email channel removed");
        Ok(removed)
    }

    /// Remove the phone channel; the identity must keep at least one channel
    pub async fn remove_phone_from_identity(&self, user_id: &UserId) -> Result<PhoneNumber> {
        let removed = self.store.remove_phone(user_id).await?;
        info!(user_id = %user_id, "phone channel removed");
        Ok(removed)
    }

    pub async fn has_email(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.store.get(user_id).await?.email().is_some())
    }

    pub async fn is_email_verified(&self, email: &EmailAddress) -> Result<bool> {
        let identity = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;
        Ok(identity.email_verified())
    }

    pub async fn logout_token(&self, token: &AuthToken) -> Result<()> {
        self.sessions.revoke_token(token)
    }

    pub async fn logout_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        self.sessions.revoke_cookie(cookie)
    }

    async fn lookup(&self, email: &EmailAddress) -> Result<Identity> {
        self.check_email(email)?;
        self.store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::IdentityNotFound)
    }

    fn check_email(&self, email: &EmailAddress) -> Result<()> {
        if validate_email(email.as_str()) {
            Ok(())
        } else {
            Err(AuthError::Validation(
                "invalid email address format".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlowSettings, SessionSettings};
    use crate::delivery::MockCodeDelivery;
    use crate::store::MemoryIdentityStore;

    fn service_with_delivery(delivery: Arc<dyn CodeDelivery>) -> EmailAuthService {
        EmailAuthService::new(
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(VerificationFlowManager::new(&FlowSettings::default())),
            Arc::new(SessionIssuer::new(&SessionSettings::default())),
            delivery,
        )
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_delivery_error() {
        let mut mock = MockCodeDelivery::new();
        mock.expect_deliver()
            .returning(|_, _, _| Err(AuthError::DeliveryFailure("smtp down".to_string())));
        let service = service_with_delivery(Arc::new(mock));

        let result = service
            .send_email_with_code(&EmailAddress::new("a@x.com"))
            .await;
        assert!(matches!(result, Err(AuthError::DeliveryFailure(_))));
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_before_any_flow() {
        let mut mock = MockCodeDelivery::new();
        mock.expect_deliver().never();
        let service = service_with_delivery(Arc::new(mock));

        let result = service
            .send_email_with_code(&EmailAddress::new("not-an-email"))
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }
}
