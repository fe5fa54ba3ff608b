/// Data models for identities, sessions, and channel policy
pub mod country;
pub mod identity;
pub mod ids;
pub mod session;

pub use country::{ChannelType, Country};
pub use identity::{
    CarrierType, DeviceAccount, EmailIdentity, Identity, PhoneEmailIdentity, PhoneIdentity,
    PhoneMetadata, SchemaId,
};
pub use ids::{
    AccountPassword, AccountUsername, AuthToken, CountryCode, EmailAddress, EmailFlowId,
    LoginFlowId, PhoneNumber, RegistrationFlowId, SessionCookie, SessionId, TotpCode, TotpSecret,
    UserId, VerificationCode,
};
pub use session::{CookieResponse, Session, TokenResponse};
