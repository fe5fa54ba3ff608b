pub mod account_auth;
pub mod email_auth;
pub mod phone_auth;

pub use account_auth::{AccountAuthService, AccountSessionResult};
pub use email_auth::{EmailAuthService, ValidateCodeResult};
pub use phone_auth::PhoneAuthService;
