// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Guard around every provider call: concurrency limit, timeout, retry.

use ragscore_core::{ProviderSettings, RetryPolicy};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::EvalError;

/// Shared by all evaluators of one engine so the concurrency limit holds
/// across metrics. Cloning shares the same permit pool.
#[derive(Clone)]
pub struct ProviderGuard {
    limiter: Arc<Semaphore>,
    retry_policy: RetryPolicy,
    call_timeout: Duration,
}

impl ProviderGuard {
    pub fn new(max_concurrent_calls: usize, call_timeout: Duration, retry_policy: RetryPolicy) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            retry_policy,
            call_timeout,
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(
            settings.max_concurrent_calls,
            Duration::from_secs(settings.call_timeout_secs),
            RetryPolicy::from_settings(settings),
        )
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Run `operation` under the concurrency limit and per-call timeout,
    /// retrying retryable failures with exponential backoff.
    ///
    /// The permit is held only for the duration of a single attempt, never
    /// while sleeping between attempts. Dropping the returned future cancels
    /// the in-flight call.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, EvalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EvalError>>,
    {
        let mut attempts: u32 = 0;
        loop {
            let result = {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| EvalError::Internal("provider limiter closed".to_string()))?;

                attempts += 1;
                match tokio::time::timeout(self.call_timeout, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(EvalError::Timeout {
                        operation: operation.to_string(),
                        after: self.call_timeout,
                    }),
                }
            };

            match result {
                Ok(value) => {
                    debug!(operation, attempts, "provider call succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && self.retry_policy.should_retry(attempts) => {
                    let delay = self.retry_policy.delay_for_attempt(attempts - 1);
                    warn!(
                        operation,
                        attempt = attempts,
                        error = %e,
                        "provider call failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
