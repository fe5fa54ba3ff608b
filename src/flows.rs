/// Verification Flow Manager
///
/// Creates and resolves short-lived, single-use verification flows binding a
/// purpose (registration vs. login), a target email address, and an issued
/// code. Redemption is single-use and checked atomically; expiry is lazy,
/// evaluated against the clock at validation time, so the core carries no
/// background timers.
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::FlowSettings;
use crate::delivery::CodeDelivery;
use crate::error::{AuthError, Result};
use crate::models::{EmailAddress, LoginFlowId, RegistrationFlowId, VerificationCode};
use crate::validators::mask_email;

/// Why a verification flow was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPurpose {
    Registration,
    Login,
}

impl FlowPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPurpose::Registration => "registration",
            FlowPurpose::Login => "login",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingFlow {
    purpose: FlowPurpose,
    target: EmailAddress,
    code: VerificationCode,
    created_at: DateTime<Utc>,
    consumed: bool,
}

/// Flow store with per-flow mutual exclusion.
///
/// Multiple concurrent pending flows per target are allowed; each is
/// independently addressable by its own id and expires on its own clock.
pub struct VerificationFlowManager {
    flows: DashMap<String, PendingFlow>,
    ttl: Duration,
    code_length: usize,
}

impl VerificationFlowManager {
    pub fn new(settings: &FlowSettings) -> Self {
        VerificationFlowManager {
            flows: DashMap::new(),
            ttl: Duration::seconds(settings.ttl_secs),
            code_length: settings.code_length,
        }
    }

    /// Open a registration-purpose flow and hand the code to the delivery
    /// collaborator. The code is never returned to the caller.
    pub async fn issue_registration(
        &self,
        target: &EmailAddress,
        delivery: &dyn CodeDelivery,
    ) -> Result<RegistrationFlowId> {
        let id = self
            .issue(FlowPurpose::Registration, target, delivery)
            .await?;
        Ok(RegistrationFlowId::new(id))
    }

    /// Open a login-purpose flow; same contract as `issue_registration`.
    pub async fn issue_login(
        &self,
        target: &EmailAddress,
        delivery: &dyn CodeDelivery,
    ) -> Result<LoginFlowId> {
        let id = self.issue(FlowPurpose::Login, target, delivery).await?;
        Ok(LoginFlowId::new(id))
    }

    pub fn validate_registration(
        &self,
        flow_id: &RegistrationFlowId,
        code: &VerificationCode,
    ) -> Result<EmailAddress> {
        self.validate_registration_at(flow_id, code, Utc::now())
    }

    pub fn validate_login(
        &self,
        flow_id: &LoginFlowId,
        code: &VerificationCode,
    ) -> Result<EmailAddress> {
        self.validate_login_at(flow_id, code, Utc::now())
    }

    /// Clock-explicit variant of `validate_registration`
    pub fn validate_registration_at(
        &self,
        flow_id: &RegistrationFlowId,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<EmailAddress> {
        self.consume(flow_id.as_str(), FlowPurpose::Registration, code, now)
    }

    /// Clock-explicit variant of `validate_login`
    pub fn validate_login_at(
        &self,
        flow_id: &LoginFlowId,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<EmailAddress> {
        self.consume(flow_id.as_str(), FlowPurpose::Login, code, now)
    }

    /// Number of pending (unconsumed, unexpired) flows for a target
    pub fn pending_count(&self, target: &EmailAddress) -> usize {
        let now = Utc::now();
        self.flows
            .iter()
            .filter(|entry| {
                let flow = entry.value();
                flow.target == *target && !flow.consumed && now - flow.created_at < self.ttl
            })
            .count()
    }

    /// Drop expired flow records. The core never sweeps on its own; an
    /// external pass calls this.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.flows.len();
        self.flows.retain(|_, flow| now - flow.created_at < self.ttl);
        before - self.flows.len()
    }

    async fn issue(
        &self,
        purpose: FlowPurpose,
        target: &EmailAddress,
        delivery: &dyn CodeDelivery,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let code = self.mint_code();

        // Persist before delivery so transport latency never extends the
        // critical section.
        self.flows.insert(
            id.clone(),
            PendingFlow {
                purpose,
                target: target.clone(),
                code: code.clone(),
                created_at: Utc::now(),
                consumed: false,
            },
        );

        delivery.deliver(target, &code, purpose).await?;

        info!(
            target = %mask_email(target.as_str()),
            purpose = purpose.as_str(),
            "verification flow opened"
        );

        Ok(id)
    }

    /// Check-and-consume under the per-flow guard: at most one validation of
    /// a given flow can ever succeed.
    fn consume(
        &self,
        raw_id: &str,
        purpose: FlowPurpose,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<EmailAddress> {
        let mut entry = self.flows.get_mut(raw_id).ok_or(AuthError::FlowNotFound)?;

        // A flow id presented with the wrong purpose is an unknown id
        if entry.purpose != purpose {
            return Err(AuthError::FlowNotFound);
        }

        // Expiry wins over consumption state
        if now - entry.created_at >= self.ttl {
            return Err(AuthError::FlowExpired);
        }

        if entry.consumed {
            return Err(AuthError::FlowAlreadyConsumed);
        }

        // A wrong code does not consume the flow; retry limits are an
        // external rate-limit concern.
        if entry.code != *code {
            return Err(AuthError::CodeMismatch);
        }

        entry.consumed = true;
        Ok(entry.target.clone())
    }

    fn mint_code(&self) -> VerificationCode {
        let mut rng = rand::thread_rng();
        let digits: String = (0..self.code_length)
            .map(|_| rng.gen_range(0..10).to_string())
            .collect();
        VerificationCode::new(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::MemoryDelivery;
    use std::sync::Arc;

    fn manager() -> VerificationFlowManager {
        VerificationFlowManager::new(&FlowSettings::default())
    }

    fn target() -> EmailAddress {
        EmailAddress::new("a@x.com")
    }

    async fn open_registration(
        manager: &VerificationFlowManager,
        delivery: &MemoryDelivery,
    ) -> (RegistrationFlowId, VerificationCode) {
        let id = manager
            .issue_registration(&target(), delivery)
            .await
            .expect("issue should succeed");
        let code = delivery.last_code_for(&target()).expect("code delivered");
        (id, code)
    }

    #[tokio::test]
    async fn code_goes_to_delivery_not_caller() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (_, code) = open_registration(&manager, &delivery).await;
        assert_eq!(code.as_str().len(), 6);
        assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        assert_eq!(delivery.sent_count(), 1);
    }

    #[tokio::test]
    async fn validate_consumes_exactly_once() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (id, code) = open_registration(&manager, &delivery).await;

        let email = manager
            .validate_registration(&id, &code)
            .expect("first validation succeeds");
        assert_eq!(email, target());

        assert_eq!(
            manager.validate_registration(&id, &code),
            Err(AuthError::FlowAlreadyConsumed)
        );
    }

    #[tokio::test]
    async fn wrong_code_does_not_consume() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (id, code) = open_registration(&manager, &delivery).await;

        let wrong = VerificationCode::new("000000");
        // 1-in-a-million chance the minted code is all zeros; skip if so
        if wrong != code {
            assert_eq!(
                manager.validate_registration(&id, &wrong),
                Err(AuthError::CodeMismatch)
            );
        }
        assert!(manager.validate_registration(&id, &code).is_ok());
    }

    #[tokio::test]
    async fn unknown_flow_id_is_not_found() {
        let manager = manager();
        assert_eq!(
            manager.validate_registration(
                &RegistrationFlowId::new("nope"),
                &VerificationCode::new("123456")
            ),
            Err(AuthError::FlowNotFound)
        );
    }

    #[tokio::test]
    async fn purposes_never_cross() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (id, code) = open_registration(&manager, &delivery).await;

        // Redeeming the same raw id through the login path must fail
        let as_login = LoginFlowId::new(id.as_str());
        assert_eq!(
            manager.validate_login(&as_login, &code),
            Err(AuthError::FlowNotFound)
        );
        // The registration path still works afterwards
        assert!(manager.validate_registration(&id, &code).is_ok());
    }

    #[tokio::test]
    async fn expiry_boundary_is_exact() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (id, code) = open_registration(&manager, &delivery).await;

        let just_before = Utc::now() + Duration::seconds(299);
        let at_ttl = Utc::now() + Duration::seconds(301);

        // TTL - 1s still validates; at/after TTL it is expired
        let fresh_manager_check =
            manager.validate_registration_at(&id, &code, just_before);
        assert!(fresh_manager_check.is_ok());

        let delivery2 = MemoryDelivery::new();
        let (id2, code2) = open_registration(&manager, &delivery2).await;
        assert_eq!(
            manager.validate_registration_at(&id2, &code2, at_ttl),
            Err(AuthError::FlowExpired)
        );
    }

    #[tokio::test]
    async fn expired_beats_consumed() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (id, code) = open_registration(&manager, &delivery).await;
        manager
            .validate_registration(&id, &code)
            .expect("consume while fresh");

        let later = Utc::now() + Duration::seconds(400);
        assert_eq!(
            manager.validate_registration_at(&id, &code, later),
            Err(AuthError::FlowExpired)
        );
    }

    #[tokio::test]
    async fn concurrent_flows_per_target_stay_independent() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (id1, code1) = open_registration(&manager, &delivery).await;
        let (id2, code2) = open_registration(&manager, &delivery).await;
        assert_eq!(manager.pending_count(&target()), 2);

        assert!(manager.validate_registration(&id2, &code2).is_ok());
        assert!(manager.validate_registration(&id1, &code1).is_ok());
    }

    #[tokio::test]
    async fn racing_validations_yield_one_success() {
        let manager = Arc::new(manager());
        let delivery = MemoryDelivery::new();
        let (id, code) = open_registration(&manager, &delivery).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            let id = id.clone();
            let code = code.clone();
            handles.push(std::thread::spawn(move || {
                manager.validate_registration(&id, &code).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("validator thread panicked"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let manager = manager();
        let delivery = MemoryDelivery::new();
        let (_id, _code) = open_registration(&manager, &delivery).await;

        assert_eq!(manager.purge_expired(Utc::now()), 0);
        assert_eq!(
            manager.purge_expired(Utc::now() + Duration::seconds(600)),
            1
        );
    }
}
