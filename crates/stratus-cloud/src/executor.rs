//! Retryable mutation executor
//!
//! Issues a mutation and retries it only while the remote API reports a
//! transient conflict. A successful call is never repeated.

use crate::classifier::{Classification, RetryPolicy};
use crate::deadline::Deadline;
use crate::error::{CloudError, Result};
use crate::poller::{self, PollOutcome, ResourceStatusSource};
use crate::provider::{RemoteInvoker, SnapshotFetcher};
use crate::request::{MutationRequest, ReadyWait};
use crate::snapshot::ResourceSnapshot;
use std::sync::Arc;
use std::time::Duration;
use stratus_config::RetrySettings;
use tokio::time::Instant;

/// Accepted mutation
#[derive(Debug, Clone)]
pub struct Execution {
    pub response: ResourceSnapshot,
    /// Calls made, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct MutationExecutor {
    invoker: Arc<dyn RemoteInvoker>,
    fetcher: Arc<dyn SnapshotFetcher>,
    policy: RetryPolicy,
    backoff: RetrySettings,
}

impl MutationExecutor {
    pub fn new(
        invoker: Arc<dyn RemoteInvoker>,
        fetcher: Arc<dyn SnapshotFetcher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            invoker,
            fetcher,
            policy,
            backoff: RetrySettings::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: RetrySettings) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn fetcher(&self) -> &dyn SnapshotFetcher {
        self.fetcher.as_ref()
    }

    /// Issue the call, then wait for readiness if the request asks for it.
    pub async fn execute(&self, req: &MutationRequest, deadline: &Deadline) -> Result<Execution> {
        let execution = self.issue(req, deadline).await?;
        if let Some(wait) = &req.wait_ready {
            self.await_ready(req, wait, deadline).await?;
        }
        Ok(execution)
    }

    /// Issue the call until it is accepted.
    ///
    /// A non-retryable request gets exactly one call. Otherwise transient
    /// conflicts are retried with backoff until `req.timeout` (or the outer
    /// deadline) runs out, which yields [`CloudError::RetryBudgetExhausted`].
    pub async fn issue(&self, req: &MutationRequest, deadline: &Deadline) -> Result<Execution> {
        let start = Instant::now();

        if !req.retryable {
            tracing::debug!(operation = %req.operation, call = %req.call, "Issuing single attempt");
            let response = self.invoker.invoke(&req.call).await.map_err(|source| {
                CloudError::TerminalApi {
                    operation: req.operation.clone(),
                    source,
                }
            })?;
            return Ok(Execution {
                response: ResourceSnapshot::new(response),
                attempts: 1,
                elapsed: start.elapsed(),
            });
        }

        let window = deadline.narrowed(req.timeout);
        let mut attempts = 0u32;

        loop {
            if window.is_cancelled() {
                return Err(CloudError::Cancelled {
                    target: req.target(),
                });
            }

            attempts += 1;
            tracing::debug!(
                operation = %req.operation,
                call = %req.call,
                attempt = attempts,
                "Issuing"
            );

            let err = match self.invoker.invoke(&req.call).await {
                Ok(response) => {
                    if attempts > 1 {
                        tracing::info!(
                            operation = %req.operation,
                            attempts,
                            "Accepted after retries"
                        );
                    }
                    return Ok(Execution {
                        response: ResourceSnapshot::new(response),
                        attempts,
                        elapsed: start.elapsed(),
                    });
                }
                Err(err) => err,
            };

            match self.policy.classify(&err) {
                Classification::Retry { code } => {
                    let delay = self.backoff.delay(attempts - 1);
                    tracing::warn!(
                        operation = %req.operation,
                        resource = %req.resource_id,
                        service = self.policy.service(),
                        code = %code,
                        attempt = attempts,
                        ?delay,
                        "Another operation is in progress, retrying"
                    );
                    if !window.sleep(delay).await {
                        if window.is_cancelled() {
                            return Err(CloudError::Cancelled {
                                target: req.target(),
                            });
                        }
                        return Err(CloudError::RetryBudgetExhausted {
                            operation: req.operation.clone(),
                            attempts,
                            elapsed: start.elapsed(),
                            last_code: code,
                            last_error: err,
                        });
                    }
                }
                Classification::Terminal => {
                    return Err(CloudError::TerminalApi {
                        operation: req.operation.clone(),
                        source: err,
                    });
                }
                Classification::Unparseable { status, reason } => {
                    return Err(CloudError::UnparseableErrorBody {
                        operation: req.operation.clone(),
                        status,
                        reason,
                    });
                }
            }
        }
    }

    /// Poll the owning resource until `wait` is satisfied.
    pub async fn await_ready(
        &self,
        req: &MutationRequest,
        wait: &ReadyWait,
        deadline: &Deadline,
    ) -> Result<PollOutcome> {
        let source = ResourceStatusSource::new(
            self.fetcher.as_ref(),
            req.resource_id.clone(),
            wait.reader.clone(),
        )
        .with_kind(req.resource_kind.clone())
        .with_id_path(wait.id_path.clone());

        poller::poll(&source, &wait.spec, deadline).await
    }
}
