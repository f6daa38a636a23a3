//! Scripted provider for tests
//!
//! Outcomes are queued ahead of time; once the script is exhausted the
//! provider keeps delivering. Calls and payloads are recorded so tests can
//! assert that (for example) no provider call happens on a tenant
//! violation or an idempotent redelivery.

use crate::{Provider, ProviderName, SendOutcome};
use async_trait::async_trait;
use courier_core::model::ProviderCredentials;
use courier_core::payload::DispatchPayload;
use std::collections::VecDeque;
use std::sync::Mutex;

/// In-memory provider with scripted outcomes
#[derive(Default)]
pub struct MockProvider {
    outcomes: Mutex<VecDeque<SendOutcome>>,
    calls: Mutex<Vec<DispatchPayload>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next unscripted call
    pub fn push_outcome(&self, outcome: SendOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Number of provider calls made
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Payloads seen, in call order
    pub fn payloads(&self) -> Vec<DispatchPayload> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Mock
    }

    async fn send(
        &self,
        payload: &DispatchPayload,
        _credentials: &ProviderCredentials,
    ) -> SendOutcome {
        self.calls.lock().unwrap().push(payload.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SendOutcome::Delivered)
    }
}
