use async_trait::async_trait;
use std::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::flows::FlowPurpose;
use crate::models::{EmailAddress, VerificationCode};
use crate::validators::mask_email;

/// Transport boundary for verification codes.
///
/// Implementations own delivery entirely; the core persists the pending flow
/// before calling this, so transport latency never sits inside a critical
/// section, and a transport failure surfaces to the caller as
/// `AuthError::DeliveryFailure`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(
        &self,
        destination: &EmailAddress,
        code: &VerificationCode,
        purpose: FlowPurpose,
    ) -> Result<()>;
}

/// Delivery stand-in for environments without a configured transport:
/// logs the code at warn level instead of sending it.
pub struct NullDelivery;

#[async_trait]
impl CodeDelivery for NullDelivery {
    async fn deliver(
        &self,
        destination: &EmailAddress,
        code: &VerificationCode,
        purpose: FlowPurpose,
    ) -> Result<()> {
        warn!(
            destination = %mask_email(destination.as_str()),
            purpose = purpose.as_str(),
            code = %code,
            "delivery transport not configured - code logged for development"
        );
        Ok(())
    }
}

/// In-memory delivery that records every send, for tests and local tooling.
#[derive(Default)]
pub struct MemoryDelivery {
    sent: Mutex<Vec<(EmailAddress, VerificationCode, FlowPurpose)>>,
}

impl MemoryDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent code delivered to the given address
    pub fn last_code_for(&self, destination: &EmailAddress) -> Option<VerificationCode> {
        self.sent
            .lock()
            .expect("delivery log poisoned")
            .iter()
            .rev()
            .find(|(dest, _, _)| dest == destination)
            .map(|(_, code, _)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("delivery log poisoned").len()
    }
}

#[async_trait]
impl CodeDelivery for MemoryDelivery {
    async fn deliver(
        &self,
        destination: &EmailAddress,
        code: &VerificationCode,
        purpose: FlowPurpose,
    ) -> Result<()> {
        self.sent
            .lock()
            .expect("delivery log poisoned")
            .push((destination.clone(), code.clone(), purpose));
        Ok(())
    }
}
