//! Retry controller wrapping upstream calls with bounded backoff

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::orchestrator::admission::AdmissionGate;
use crate::upstream::traits::{GenerationRequest, GenerationResult, UpstreamClient, UpstreamError};

/// Retry and pacing policy, read once at startup.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
    /// First backoff delay; doubles each retry.
    pub backoff_base: Duration,
    /// Add up to 25% random jitter to each backoff delay.
    pub jitter: bool,
    /// Downgrade to a single candidate on every retry attempt.
    pub force_single_candidate: bool,
    /// Ceiling for one upstream attempt; a timed-out attempt is treated as
    /// a transient failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_millis(250),
            jitter: true,
            force_single_candidate: true,
            attempt_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Successful execution plus how many attempts it took.
#[derive(Debug)]
pub struct Dispatched {
    pub result: GenerationResult,
    pub attempts: u32,
}

/// Terminal failure: the last classified upstream error and the total number
/// of attempts made before giving up.
#[derive(Debug)]
pub struct UpstreamFailure {
    pub error: UpstreamError,
    pub attempts: u32,
}

/// Drives one logical request through 1..N upstream attempts. Holds no state
/// across invocations beyond the shared admission gate.
pub struct RetryController {
    client: Arc<dyn UpstreamClient>,
    gate: Arc<AdmissionGate>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(client: Arc<dyn UpstreamClient>, gate: Arc<AdmissionGate>, policy: RetryPolicy) -> Self {
        Self {
            client,
            gate,
            policy,
        }
    }

    /// Execute a request, retrying retryable failures with exponential
    /// backoff until success or the retry budget is spent.
    pub async fn execute(
        &self,
        request: GenerationRequest,
    ) -> Result<Dispatched, UpstreamFailure> {
        let mut effective = request;
        let mut attempts: u32 = 0;

        loop {
            let outcome = self.attempt_once(&effective).await;
            attempts += 1;

            let error = match outcome {
                Ok(result) => {
                    debug!(
                        client = self.client.name(),
                        attempts,
                        images = result.images.len(),
                        texts = result.texts.len(),
                        "Upstream call succeeded"
                    );
                    return Ok(Dispatched { result, attempts });
                }
                Err(error) => error,
            };

            if !error.is_retryable() || attempts > self.policy.max_retries {
                warn!(
                    client = self.client.name(),
                    attempts,
                    retryable = error.is_retryable(),
                    error = %error,
                    "Upstream call failed terminally"
                );
                return Err(UpstreamFailure { error, attempts });
            }

            let delay = self.backoff_delay(attempts - 1, error.retry_after());
            warn!(
                client = self.client.name(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Upstream call failed, backing off before retry"
            );
            tokio::time::sleep(delay).await;

            if self.policy.force_single_candidate && effective.params.candidate_count > 1 {
                effective.params.candidate_count = 1;
            }
        }
    }

    /// One gated attempt: acquire a slot, invoke with the per-attempt
    /// timeout, release the slot when the attempt resolves.
    async fn attempt_once(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, UpstreamError> {
        let _slot = self.gate.acquire().await;
        let started = Instant::now();

        match tokio::time::timeout(self.policy.attempt_timeout, self.client.invoke(request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(UpstreamError::Transient(format!(
                "attempt timed out after {}ms",
                started.elapsed().as_millis()
            ))),
        }
    }

    /// Exponential backoff for the given zero-based attempt index, raised to
    /// any upstream retry-after hint, with optional jitter.
    fn backoff_delay(&self, attempt_index: u32, hint: Option<Duration>) -> Duration {
        let exp = self
            .policy
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt_index));
        let base = match hint {
            Some(hint) if hint > exp => hint,
            _ => exp,
        };
        if self.policy.jitter {
            base.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            base
        }
    }
}
