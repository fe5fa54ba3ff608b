/// Username/Password Device Account Service
///
/// Devices authenticate with a generated username/password pair. A single
/// entry point both registers and logs in: unknown usernames get an account,
/// known usernames get a password check. Accounts stay outside the channel
/// identity space until upgraded to the phone schema.
use std::sync::Arc;

use tracing::info;

use crate::error::{AuthError, Result};
use crate::models::{
    AccountPassword, AccountUsername, AuthToken, Identity, PhoneNumber, TokenResponse, UserId,
};
use crate::security::{hash_password, verify_password};
use crate::sessions::SessionIssuer;
use crate::store::IdentityStore;
use crate::validators::{validate_phone, validate_username};

/// Session plus a flag telling the caller whether the account was created
/// by this call or already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSessionResult {
    pub token: TokenResponse,
    pub new_entity: bool,
}

#[derive(Clone)]
pub struct AccountAuthService {
    store: Arc<dyn IdentityStore>,
    sessions: Arc<SessionIssuer>,
}

impl AccountAuthService {
    pub fn new(store: Arc<dyn IdentityStore>, sessions: Arc<SessionIssuer>) -> Self {
        Self { store, sessions }
    }

    /// Register-or-login in one step.
    ///
    /// A fresh username creates a device account with the hashed password
    /// and a session. An existing username verifies the password; a mismatch
    /// is `InvalidCredentials` with no hint that the username exists.
    pub async fn create_identity_with_session(
        &self,
        username: &AccountUsername,
        password: &AccountPassword,
    ) -> Result<AccountSessionResult> {
        self.check_username(username)?;

        if let Some(account) = self.store.find_account(username).await? {
            if !verify_password(password.as_str(), &account.password_hash)? {
                return Err(AuthError::InvalidCredentials);
            }
            return Ok(AccountSessionResult {
                token: self.sessions.issue_token(&account.user_id),
                new_entity: false,
            });
        }

        let hash = hash_password(password.as_str())?;
        let (account, created) = self.store.create_or_fetch_account(username, &hash).await?;
        if !created {
            // Lost a create race; re-check against the winner's hash.
            if !verify_password(password.as_str(), &account.password_hash)? {
                return Err(AuthError::InvalidCredentials);
            }
        } else {
            info!(user_id = %account.user_id, "device account created");
        }

        Ok(AccountSessionResult {
            token: self.sessions.issue_token(&account.user_id),
            new_entity: created,
        })
    }

    /// Upgrade a device account to a phone identity, keeping its user id
    /// and creation time
    pub async fn upgrade_to_phone_schema(
        &self,
        user_id: &UserId,
        phone: &PhoneNumber,
    ) -> Result<Identity> {
        if !validate_phone(phone.as_str()) {
            return Err(AuthError::Validation(
                "phone number must be in E.164 format".to_string(),
            ));
        }
        let identity = self.store.promote_account_to_phone(user_id, phone).await?;
        info!(user_id = %user_id, "device account upgraded to phone schema");
        Ok(identity)
    }

    pub async fn logout_token(&self, token: &AuthToken) -> Result<()> {
        self.sessions.revoke_token(token)
    }

    fn check_username(&self, username: &AccountUsername) -> Result<()> {
        if validate_username(username.as_str()) {
            Ok(())
        } else {
            Err(AuthError::Validation(
                "username must be 3-32 word characters".to_string(),
            ))
        }
    }
}
