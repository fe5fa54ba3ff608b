/// Identity storage boundary
///
/// The store is the sole writer of identity records; services receive
/// read-only snapshots valid for one logical operation. `get`, `delete`,
/// and `resolve_identifier` form the narrow repository facade; the rest is
/// the lookup/create/mutate surface the channel services drive. Reads are
/// linearizable with respect to this core's own writes.
use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AccountUsername, DeviceAccount, EmailAddress, Identity, PhoneNumber, UserId,
};

pub mod memory;

pub use memory::MemoryIdentityStore;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch an identity by id
    async fn get(&self, id: &UserId) -> Result<Identity>;

    /// Delete an identity (or a not-yet-upgraded device account) by id
    async fn delete(&self, id: &UserId) -> Result<()>;

    /// Resolve a loose identifier (email, phone, or username) to a user id
    async fn resolve_identifier(&self, identifier: &str) -> Result<UserId>;

    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Identity>>;

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Identity>>;

    /// Create a phone-only identity, or return the existing one bound to
    /// this number. The bool is true when a record was created.
    async fn create_or_fetch_phone_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<(Identity, bool)>;

    /// Create an email-only identity, or return the existing one bound to
    /// this address. The bool is true when a record was created.
    async fn create_or_fetch_email_identity(
        &self,
        email: &EmailAddress,
        email_verified: bool,
    ) -> Result<(Identity, bool)>;

    /// Attach an email channel to an identity that has none
    async fn attach_email(
        &self,
        id: &UserId,
        email: &EmailAddress,
        email_verified: bool,
    ) -> Result<Identity>;

    /// Attach a phone channel to an identity that has none
    async fn attach_phone(&self, id: &UserId, phone: &PhoneNumber) -> Result<Identity>;

    /// Remove the email channel; rejected when it is the only channel
    async fn remove_email(&self, id: &UserId) -> Result<EmailAddress>;

    /// Remove the phone channel; rejected when it is the only channel
    async fn remove_phone(&self, id: &UserId) -> Result<PhoneNumber>;

    /// Replace the phone number on an identity that already has one
    async fn replace_phone(&self, id: &UserId, phone: &PhoneNumber) -> Result<Identity>;

    /// Mark the identity's email as verified
    async fn mark_email_verified(&self, id: &UserId) -> Result<Identity>;

    /// Flip the TOTP-required flag
    async fn set_totp_enabled(&self, id: &UserId, enabled: bool) -> Result<Identity>;

    async fn find_account(&self, username: &AccountUsername) -> Result<Option<DeviceAccount>>;

    async fn account_by_user_id(&self, id: &UserId) -> Result<Option<DeviceAccount>>;

    /// Create a device-bound account, or return the existing one for this
    /// username. The bool is true when a record was created.
    async fn create_or_fetch_account(
        &self,
        username: &AccountUsername,
        password_hash: &str,
    ) -> Result<(DeviceAccount, bool)>;

    /// Convert a device-bound account into a phone-only identity with the
    /// same user id and creation time
    async fn promote_account_to_phone(
        &self,
        id: &UserId,
        phone: &PhoneNumber,
    ) -> Result<Identity>;
}
