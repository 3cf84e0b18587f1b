use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ApiSettings;
use crate::error::{self, NetworkError, ValidationError};
use crate::session::{PendingSimulation, SimulationOutcome, WizardSession};

use super::backend::SimulationBackend;
use super::payload::{SimulationEnvelope, SimulationResponse};

/// Drives one simulation round-trip: build the request from the session,
/// call the backend under a timeout with explicit retries, apply the result.
pub struct SimulationCoordinator<B> {
    backend: B,
    timeout: Duration,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<B: SimulationBackend> SimulationCoordinator<B> {
    pub fn new(backend: B, api: &ApiSettings) -> Self {
        Self {
            backend,
            timeout: api.timeout(),
            max_attempts: api.max_attempts.max(1),
            retry_delay: api.retry_delay(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Single-owner flow. Callers that share the session across tasks should use
    /// [`WizardSession::begin_simulation`], [`Self::run`] and
    /// [`WizardSession::finish_simulation`] so the session is not held across the await.
    pub async fn simulate(&self, session: &mut WizardSession) -> Result<SimulationOutcome, ValidationError> {
        let pending = session.begin_simulation()?;
        let result = self.run(&pending).await;
        Ok(session.finish_simulation(pending.token, result))
    }

    pub async fn run(&self, pending: &PendingSimulation) -> Result<SimulationResponse, NetworkError> {
        info!(
            token = pending.token,
            disaster = pending.disaster.as_str(),
            "simulation requested"
        );
        self.call_with_retries(pending).await
    }

    /// Stops retrying once `pending` is no longer the wizard's in-flight request.
    async fn call_with_retries(&self, pending: &PendingSimulation) -> Result<SimulationResponse, NetworkError> {
        let mut attempt = 1;
        loop {
            match self.call_once(&pending.envelope).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_attempts && retryable(&err) => {
                    warn!(attempt, max = self.max_attempts, error = %err, "simulation attempt failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    if !pending.is_current() {
                        debug!(token = pending.token, "simulation abandoned, not retrying");
                        return Err(err);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn call_once(&self, envelope: &SimulationEnvelope) -> Result<SimulationResponse, NetworkError> {
        tokio::time::timeout(self.timeout, self.backend.simulate(envelope))
            .await
            .map_err(|_| NetworkError::Timeout(self.timeout))?
    }
}

impl<B: SimulationBackend + 'static> SimulationCoordinator<B> {
    /// Flow for a session shared between tasks. The backend round-trip and
    /// `finish_simulation` run in a spawned task, so the result is applied even
    /// if the caller's future is dropped. The lock is not held while waiting.
    pub async fn simulate_shared(
        self: Arc<Self>,
        session: Arc<Mutex<WizardSession>>,
    ) -> error::Result<SimulationOutcome> {
        let pending = session.lock().await.begin_simulation()?;
        let task = tokio::spawn(async move {
            let result = self.run(&pending).await;
            session.lock().await.finish_simulation(pending.token, result)
        });
        Ok(task.await?)
    }
}

/// Client errors (4xx) will fail the same way again.
fn retryable(err: &NetworkError) -> bool {
    match err {
        NetworkError::Status { status, .. } => *status >= 500,
        NetworkError::Timeout(_) | NetworkError::Request(_) => true,
    }
}
