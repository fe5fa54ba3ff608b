/// In-process identity store
///
/// Keyed maps with per-key entry guards: operations on different identities
/// proceed concurrently, mutation of one identity is serialized on its
/// entry. Identifier indexes (phone, email, username) are claimed before
/// the record mutation and rolled back if the mutation is rejected, so an
/// identifier never points at two identities.
///
/// Lock discipline: an index entry guard is always released before the
/// identities map is touched; the identities guard may briefly take an
/// index shard for rollback or re-pointing, never the other way around.
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{
    AccountUsername, DeviceAccount, EmailAddress, Identity, PhoneIdentity, PhoneNumber, SchemaId,
    UserId,
};

use super::IdentityStore;

#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: DashMap<Uuid, Identity>,
    accounts: DashMap<Uuid, DeviceAccount>,
    phone_index: DashMap<String, Uuid>,
    email_index: DashMap<String, Uuid>,
    username_index: DashMap<String, Uuid>,
}

/// Outcome of claiming an index slot. Rollback must release the slot only
/// when the claim inserted it; releasing an `AlreadyOurs` slot would strip
/// a live binding.
enum Claim {
    Inserted,
    AlreadyOurs,
    OwnedElsewhere(Uuid),
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(index: &DashMap<String, Uuid>, key: &str, id: Uuid) -> Claim {
        match index.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                let owner = *entry.get();
                if owner == id {
                    Claim::AlreadyOurs
                } else {
                    Claim::OwnedElsewhere(owner)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(id);
                Claim::Inserted
            }
        }
    }

    fn release(index: &DashMap<String, Uuid>, key: &str, id: Uuid) {
        index.remove_if(key, |_, owner| *owner == id);
    }

    fn fetch(&self, id: Uuid) -> Result<Identity> {
        self.identities
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(AuthError::IdentityNotFound)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get(&self, id: &UserId) -> Result<Identity> {
        self.fetch(id.as_uuid())
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        let uuid = id.as_uuid();
        if let Some((_, identity)) = self.identities.remove(&uuid) {
            if let Some(phone) = identity.phone() {
                Self::release(&self.phone_index, phone.as_str(), uuid);
            }
            if let Some(email) = identity.email() {
                Self::release(&self.email_index, email.as_str(), uuid);
            }
            return Ok(());
        }
        if let Some((_, account)) = self.accounts.remove(&uuid) {
            Self::release(&self.username_index, account.username.as_str(), uuid);
            return Ok(());
        }
        Err(AuthError::IdentityNotFound)
    }

    async fn resolve_identifier(&self, identifier: &str) -> Result<UserId> {
        let email_key = identifier.to_lowercase();
        if let Some(entry) = self.email_index.get(&email_key) {
            return Ok(UserId::from(*entry));
        }
        if let Some(entry) = self.phone_index.get(identifier) {
            return Ok(UserId::from(*entry));
        }
        if let Some(entry) = self.username_index.get(identifier) {
            return Ok(UserId::from(*entry));
        }
        Err(AuthError::IdentifierNotFound)
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Identity>> {
        let id = match self.phone_index.get(phone.as_str()) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        Ok(Some(self.fetch(id).map_err(|_| {
            AuthError::StoreUnavailable("phone index out of sync".to_string())
        })?))
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Identity>> {
        let id = match self.email_index.get(email.as_str()) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        Ok(Some(self.fetch(id).map_err(|_| {
            AuthError::StoreUnavailable("email index out of sync".to_string())
        })?))
    }

    async fn create_or_fetch_phone_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<(Identity, bool)> {
        let identity = Identity::Phone(PhoneIdentity::new(phone.clone()));
        let uuid = identity.id().as_uuid();
        self.identities.insert(uuid, identity.clone());

        match Self::claim(&self.phone_index, phone.as_str(), uuid) {
            Claim::Inserted | Claim::AlreadyOurs => Ok((identity, true)),
            Claim::OwnedElsewhere(existing) => {
                // Lost the race (or the number was already registered):
                // back out our record and return the established identity.
                self.identities.remove(&uuid);
                let existing = self.fetch(existing).map_err(|_| {
                    AuthError::StoreUnavailable("phone index out of sync".to_string())
                })?;
                Ok((existing, false))
            }
        }
    }

    async fn create_or_fetch_email_identity(
        &self,
        email: &EmailAddress,
        email_verified: bool,
    ) -> Result<(Identity, bool)> {
        let identity = Identity::Email(crate::models::EmailIdentity::new(
            email.clone(),
            email_verified,
        ));
        let uuid = identity.id().as_uuid();
        self.identities.insert(uuid, identity.clone());

        match Self::claim(&self.email_index, email.as_str(), uuid) {
            Claim::Inserted | Claim::AlreadyOurs => Ok((identity, true)),
            Claim::OwnedElsewhere(existing) => {
                self.identities.remove(&uuid);
                let existing = self.fetch(existing).map_err(|_| {
                    AuthError::StoreUnavailable("email index out of sync".to_string())
                })?;
                Ok((existing, false))
            }
        }
    }

    async fn attach_email(
        &self,
        id: &UserId,
        email: &EmailAddress,
        email_verified: bool,
    ) -> Result<Identity> {
        let uuid = id.as_uuid();
        let inserted = match Self::claim(&self.email_index, email.as_str(), uuid) {
            Claim::Inserted => true,
            Claim::AlreadyOurs => false,
            Claim::OwnedElsewhere(_) => return Err(AuthError::EmailAlreadyInUse),
        };

        let mut entry = match self.identities.get_mut(&uuid) {
            Some(entry) => entry,
            None => {
                if inserted {
                    Self::release(&self.email_index, email.as_str(), uuid);
                }
                return Err(AuthError::IdentityNotFound);
            }
        };

        match entry.clone() {
            Identity::Phone(phone_identity) => {
                *entry = Identity::PhoneAndEmail(
                    phone_identity.attach_email(email.clone(), email_verified),
                );
                Ok(entry.clone())
            }
            Identity::Email(_) | Identity::PhoneAndEmail(_) => {
                drop(entry);
                if inserted {
                    Self::release(&self.email_index, email.as_str(), uuid);
                }
                Err(AuthError::EmailAlreadyInUse)
            }
        }
    }

    async fn attach_phone(&self, id: &UserId, phone: &PhoneNumber) -> Result<Identity> {
        let uuid = id.as_uuid();
        let inserted = match Self::claim(&self.phone_index, phone.as_str(), uuid) {
            Claim::Inserted => true,
            Claim::AlreadyOurs => false,
            Claim::OwnedElsewhere(_) => return Err(AuthError::PhoneAlreadyInUse),
        };

        let mut entry = match self.identities.get_mut(&uuid) {
            Some(entry) => entry,
            None => {
                if inserted {
                    Self::release(&self.phone_index, phone.as_str(), uuid);
                }
                return Err(AuthError::IdentityNotFound);
            }
        };

        match entry.clone() {
            Identity::Email(email_identity) => {
                *entry = Identity::PhoneAndEmail(email_identity.attach_phone(phone.clone()));
                Ok(entry.clone())
            }
            Identity::Phone(_) | Identity::PhoneAndEmail(_) => {
                drop(entry);
                if inserted {
                    Self::release(&self.phone_index, phone.as_str(), uuid);
                }
                Err(AuthError::PhoneAlreadyInUse)
            }
        }
    }

    async fn remove_email(&self, id: &UserId) -> Result<EmailAddress> {
        let uuid = id.as_uuid();
        let mut entry = self
            .identities
            .get_mut(&uuid)
            .ok_or(AuthError::IdentityNotFound)?;

        match entry.clone() {
            Identity::Email(_) => Err(AuthError::CannotRemoveLastChannel),
            Identity::Phone(_) => Err(AuthError::Validation(
                "identity has no email channel".to_string(),
            )),
            Identity::PhoneAndEmail(both) => {
                let email = both.email.clone();
                *entry = Identity::Phone(both.drop_email());
                Self::release(&self.email_index, email.as_str(), uuid);
                Ok(email)
            }
        }
    }

    async fn remove_phone(&self, id: &UserId) -> Result<PhoneNumber> {
        let uuid = id.as_uuid();
        let mut entry = self
            .identities
            .get_mut(&uuid)
            .ok_or(AuthError::IdentityNotFound)?;

        match entry.clone() {
            Identity::Phone(_) => Err(AuthError::CannotRemoveLastChannel),
            Identity::Email(_) => Err(AuthError::Validation(
                "identity has no phone channel".to_string(),
            )),
            Identity::PhoneAndEmail(both) => {
                let phone = both.phone.clone();
                *entry = Identity::Email(both.drop_phone());
                Self::release(&self.phone_index, phone.as_str(), uuid);
                Ok(phone)
            }
        }
    }

    async fn replace_phone(&self, id: &UserId, phone: &PhoneNumber) -> Result<Identity> {
        let uuid = id.as_uuid();
        let inserted = match Self::claim(&self.phone_index, phone.as_str(), uuid) {
            Claim::Inserted => true,
            Claim::AlreadyOurs => false,
            Claim::OwnedElsewhere(_) => return Err(AuthError::PhoneAlreadyInUse),
        };

        let mut entry = match self.identities.get_mut(&uuid) {
            Some(entry) => entry,
            None => {
                if inserted {
                    Self::release(&self.phone_index, phone.as_str(), uuid);
                }
                return Err(AuthError::IdentityNotFound);
            }
        };

        match entry.clone() {
            Identity::Phone(mut phone_identity) => {
                let old = phone_identity.phone.clone();
                phone_identity.phone = phone.clone();
                *entry = Identity::Phone(phone_identity);
                if old != *phone {
                    Self::release(&self.phone_index, old.as_str(), uuid);
                }
                Ok(entry.clone())
            }
            Identity::PhoneAndEmail(mut both) => {
                let old = both.phone.clone();
                both.phone = phone.clone();
                *entry = Identity::PhoneAndEmail(both);
                if old != *phone {
                    Self::release(&self.phone_index, old.as_str(), uuid);
                }
                Ok(entry.clone())
            }
            Identity::Email(_) => {
                drop(entry);
                if inserted {
                    Self::release(&self.phone_index, phone.as_str(), uuid);
                }
                Err(AuthError::Validation(
                    "identity has no phone channel".to_string(),
                ))
            }
        }
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<Identity> {
        let uuid = id.as_uuid();
        let mut entry = self
            .identities
            .get_mut(&uuid)
            .ok_or(AuthError::IdentityNotFound)?;

        match &mut *entry {
            Identity::Email(email_identity) => {
                email_identity.email_verified = true;
                Ok(entry.clone())
            }
            Identity::PhoneAndEmail(both) => {
                both.email_verified = true;
                Ok(entry.clone())
            }
            Identity::Phone(_) => Err(AuthError::Validation(
                "identity has no email channel".to_string(),
            )),
        }
    }

    async fn set_totp_enabled(&self, id: &UserId, enabled: bool) -> Result<Identity> {
        let uuid = id.as_uuid();
        let mut entry = self
            .identities
            .get_mut(&uuid)
            .ok_or(AuthError::IdentityNotFound)?;
        entry.set_totp_enabled(enabled);
        Ok(entry.clone())
    }

    async fn find_account(&self, username: &AccountUsername) -> Result<Option<DeviceAccount>> {
        let id = match self.username_index.get(username.as_str()) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        self.accounts
            .get(&id)
            .map(|entry| Some(entry.clone()))
            .ok_or_else(|| AuthError::StoreUnavailable("username index out of sync".to_string()))
    }

    async fn account_by_user_id(&self, id: &UserId) -> Result<Option<DeviceAccount>> {
        Ok(self.accounts.get(&id.as_uuid()).map(|entry| entry.clone()))
    }

    async fn create_or_fetch_account(
        &self,
        username: &AccountUsername,
        password_hash: &str,
    ) -> Result<(DeviceAccount, bool)> {
        let account = DeviceAccount {
            user_id: UserId::new(),
            username: username.clone(),
            password_hash: password_hash.to_string(),
            device_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };
        let uuid = account.user_id.as_uuid();
        self.accounts.insert(uuid, account.clone());

        match Self::claim(&self.username_index, username.as_str(), uuid) {
            Claim::Inserted | Claim::AlreadyOurs => Ok((account, true)),
            Claim::OwnedElsewhere(existing) => {
                self.accounts.remove(&uuid);
                let existing = self.accounts.get(&existing).map(|e| e.clone()).ok_or_else(
                    || AuthError::StoreUnavailable("username index out of sync".to_string()),
                )?;
                Ok((existing, false))
            }
        }
    }

    async fn promote_account_to_phone(
        &self,
        id: &UserId,
        phone: &PhoneNumber,
    ) -> Result<Identity> {
        let uuid = id.as_uuid();
        let inserted = match Self::claim(&self.phone_index, phone.as_str(), uuid) {
            Claim::Inserted => true,
            Claim::AlreadyOurs => false,
            Claim::OwnedElsewhere(_) => return Err(AuthError::ChannelUpgradeConflict),
        };

        match self.accounts.remove(&uuid) {
            Some((_, account)) => {
                let identity = Identity::Phone(PhoneIdentity {
                    id: account.user_id,
                    created_at: account.created_at,
                    schema: SchemaId::PhoneNoPassword,
                    totp_enabled: false,
                    phone: phone.clone(),
                });
                self.identities.insert(uuid, identity.clone());
                Self::release(&self.username_index, account.username.as_str(), uuid);
                Ok(identity)
            }
            None => {
                // Already promoted, or never existed. Idempotent when the
                // identity already carries this number.
                match self.fetch(uuid) {
                    Ok(identity) if identity.phone() == Some(phone) => Ok(identity),
                    Ok(_) => {
                        if inserted {
                            Self::release(&self.phone_index, phone.as_str(), uuid);
                        }
                        Err(AuthError::ChannelUpgradeConflict)
                    }
                    Err(_) => {
                        if inserted {
                            Self::release(&self.phone_index, phone.as_str(), uuid);
                        }
                        Err(AuthError::IdentityNotFound)
                    }
                }
            }
        }
    }
}
