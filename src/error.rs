use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the authentication core.
///
/// Every public operation returns `Result<T>`; failures are values inspected
/// by the caller, nothing is thrown past a service boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Identifier not found")]
    IdentifierNotFound,

    #[error("Verification flow not found")]
    FlowNotFound,

    #[error("Verification flow expired")]
    FlowExpired,

    #[error("Verification flow already consumed")]
    FlowAlreadyConsumed,

    #[error("Verification code mismatch")]
    CodeMismatch,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Phone number already in use")]
    PhoneAlreadyInUse,

    #[error("Email address already in use")]
    EmailAlreadyInUse,

    #[error("Channel upgrade conflict")]
    ChannelUpgradeConflict,

    #[error("Cannot remove the last authentication channel")]
    CannotRemoveLastChannel,

    #[error("Phone number rejected: {0}")]
    PhoneRejected(String),

    #[error("Code delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for the flow-validation failure family.
    pub fn is_flow_error(&self) -> bool {
        matches!(
            self,
            AuthError::FlowNotFound
                | AuthError::FlowExpired
                | AuthError::FlowAlreadyConsumed
                | AuthError::CodeMismatch
        )
    }

    /// True for conflicts that require a different input rather than a retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AuthError::PhoneAlreadyInUse
                | AuthError::EmailAlreadyInUse
                | AuthError::ChannelUpgradeConflict
                | AuthError::CannotRemoveLastChannel
        )
    }
}
