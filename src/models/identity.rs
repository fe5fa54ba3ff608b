use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AccountUsername, EmailAddress, PhoneNumber, UserId};

/// Schema tag identifying which channel shape produced an identity.
/// Immutable except for the device-account upgrade to the phone schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaId {
    PhoneNoPassword,
    EmailNoPassword,
    PhoneEmailNoPassword,
    UsernamePasswordDeviceId,
}

impl SchemaId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaId::PhoneNoPassword => "phone_no_password_v0",
            SchemaId::EmailNoPassword => "email_no_password_v0",
            SchemaId::PhoneEmailNoPassword => "phone_email_no_password_v0",
            SchemaId::UsernamePasswordDeviceId => "username_password_deviceid_v0",
        }
    }
}

/// Identity holding only a phone channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneIdentity {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub schema: SchemaId,
    pub totp_enabled: bool,
    pub phone: PhoneNumber,
}

/// Identity holding only an email channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailIdentity {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub schema: SchemaId,
    pub totp_enabled: bool,
    pub email: EmailAddress,
    pub email_verified: bool,
}

/// Identity holding both channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneEmailIdentity {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub schema: SchemaId,
    pub totp_enabled: bool,
    pub phone: PhoneNumber,
    pub email: EmailAddress,
    pub email_verified: bool,
}

/// An identity is exactly one of three shapes. Field presence is structural:
/// a phone-only identity has no email field at all, not a null one, so an
/// invalid combination cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Identity {
    Phone(PhoneIdentity),
    Email(EmailIdentity),
    PhoneAndEmail(PhoneEmailIdentity),
}

impl PhoneIdentity {
    pub fn new(phone: PhoneNumber) -> Self {
        PhoneIdentity {
            id: UserId::new(),
            created_at: Utc::now(),
            schema: SchemaId::PhoneNoPassword,
            totp_enabled: false,
            phone,
        }
    }

    /// Attach an email channel, producing the two-channel shape
    pub fn attach_email(self, email: EmailAddress, email_verified: bool) -> PhoneEmailIdentity {
        PhoneEmailIdentity {
            id: self.id,
            created_at: self.created_at,
            schema: SchemaId::PhoneEmailNoPassword,
            totp_enabled: self.totp_enabled,
            phone: self.phone,
            email,
            email_verified,
        }
    }
}

impl EmailIdentity {
    pub fn new(email: EmailAddress, email_verified: bool) -> Self {
        EmailIdentity {
            id: UserId::new(),
            created_at: Utc::now(),
            schema: SchemaId::EmailNoPassword,
            totp_enabled: false,
            email,
            email_verified,
        }
    }

    /// Attach a phone channel, producing the two-channel shape
    pub fn attach_phone(self, phone: PhoneNumber) -> PhoneEmailIdentity {
        PhoneEmailIdentity {
            id: self.id,
            created_at: self.created_at,
            schema: SchemaId::PhoneEmailNoPassword,
            totp_enabled: self.totp_enabled,
            phone,
            email: self.email,
            email_verified: self.email_verified,
        }
    }
}

impl PhoneEmailIdentity {
    /// Drop the email channel, leaving a phone-only identity
    pub fn drop_email(self) -> PhoneIdentity {
        PhoneIdentity {
            id: self.id,
            created_at: self.created_at,
            schema: SchemaId::PhoneNoPassword,
            totp_enabled: self.totp_enabled,
            phone: self.phone,
        }
    }

    /// Drop the phone channel, leaving an email-only identity
    pub fn drop_phone(self) -> EmailIdentity {
        EmailIdentity {
            id: self.id,
            created_at: self.created_at,
            schema: SchemaId::EmailNoPassword,
            totp_enabled: self.totp_enabled,
            email: self.email,
            email_verified: self.email_verified,
        }
    }
}

impl Identity {
    pub fn id(&self) -> &UserId {
        match self {
            Identity::Phone(i) => &i.id,
            Identity::Email(i) => &i.id,
            Identity::PhoneAndEmail(i) => &i.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Identity::Phone(i) => i.created_at,
            Identity::Email(i) => i.created_at,
            Identity::PhoneAndEmail(i) => i.created_at,
        }
    }

    pub fn schema(&self) -> SchemaId {
        match self {
            Identity::Phone(i) => i.schema,
            Identity::Email(i) => i.schema,
            Identity::PhoneAndEmail(i) => i.schema,
        }
    }

    pub fn totp_enabled(&self) -> bool {
        match self {
            Identity::Phone(i) => i.totp_enabled,
            Identity::Email(i) => i.totp_enabled,
            Identity::PhoneAndEmail(i) => i.totp_enabled,
        }
    }

    pub fn set_totp_enabled(&mut self, enabled: bool) {
        match self {
            Identity::Phone(i) => i.totp_enabled = enabled,
            Identity::Email(i) => i.totp_enabled = enabled,
            Identity::PhoneAndEmail(i) => i.totp_enabled = enabled,
        }
    }

    pub fn phone(&self) -> Option<&PhoneNumber> {
        match self {
            Identity::Phone(i) => Some(&i.phone),
            Identity::Email(_) => None,
            Identity::PhoneAndEmail(i) => Some(&i.phone),
        }
    }

    pub fn email(&self) -> Option<&EmailAddress> {
        match self {
            Identity::Phone(_) => None,
            Identity::Email(i) => Some(&i.email),
            Identity::PhoneAndEmail(i) => Some(&i.email),
        }
    }

    /// False when the identity carries no email channel
    pub fn email_verified(&self) -> bool {
        match self {
            Identity::Phone(_) => false,
            Identity::Email(i) => i.email_verified,
            Identity::PhoneAndEmail(i) => i.email_verified,
        }
    }
}

/// Advisory carrier signal attached to a phone number at registration.
/// Never blocks creation on its own; only a fraudulent signal rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneMetadata {
    pub carrier: CarrierType,
    pub country: Option<super::ids::CountryCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierType {
    Mobile,
    FixedLine,
    Voip,
    Invalid,
    Unknown,
}

/// Device-bound username/password account.
///
/// Not a channel identity: it owns a `UserId` but stays outside the
/// `Identity` shapes until upgraded to the phone schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAccount {
    pub user_id: UserId,
    pub username: AccountUsername,
    pub password_hash: String,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
}
