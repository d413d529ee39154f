//! Mutation orchestration facade
//!
//! Drives one change through its phases:
//!
//! ```text
//! [preflight] -> issuing -> [awaiting ready] -> [awaiting job] -> [awaiting order] -> [verifying]
//! ```
//!
//! Bracketed phases only run when the request (and the response) call for
//! them. The first failing phase ends the run; nothing is retried at this layer.

use crate::classifier::RetryPolicy;
use crate::deadline::Deadline;
use crate::error::{CloudError, Result};
use crate::executor::MutationExecutor;
use crate::provider::{RemoteInvoker, SnapshotFetcher};
use crate::request::{HandleExpr, HandleKind, MutationRequest};
use crate::snapshot::ResourceSnapshot;
use crate::verifier;
use crate::waiter::{CompletionWaiter, Vocabulary};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use stratus_config::{PollSettings, Settings};

/// Orchestration phase, reported on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for an operation that was already running to finish
    Preflight,
    Issuing,
    AwaitingReady,
    AwaitingJob,
    AwaitingOrder,
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Preflight => "preflight",
            Phase::Issuing => "issuing",
            Phase::AwaitingReady => "awaiting ready",
            Phase::AwaitingJob => "awaiting job",
            Phase::AwaitingOrder => "awaiting order",
            Phase::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// Fully applied mutation
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub operation: String,
    pub response: ResourceSnapshot,
    pub attempts: u32,
    pub job_id: Option<String>,
    pub order_id: Option<String>,
    /// Whether the mutated field was read back and matched
    pub verified: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Orchestrator {
    executor: MutationExecutor,
    jobs: CompletionWaiter,
    orders: CompletionWaiter,
    poll: PollSettings,
}

impl Orchestrator {
    /// Orchestrator with default settings
    pub fn new(
        invoker: Arc<dyn RemoteInvoker>,
        fetcher: Arc<dyn SnapshotFetcher>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Self::from_settings(&Settings::default(), invoker, fetcher, policy)
    }

    /// Fails on settings that [`Settings::validate`] rejects.
    pub fn from_settings(
        settings: &Settings,
        invoker: Arc<dyn RemoteInvoker>,
        fetcher: Arc<dyn SnapshotFetcher>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            executor: MutationExecutor::new(invoker, fetcher, policy)
                .with_backoff(settings.retry.clone()),
            jobs: CompletionWaiter::jobs(Vocabulary::for_jobs(&settings.job)?),
            orders: CompletionWaiter::orders(Vocabulary::for_orders(&settings.order)?),
            poll: settings.poll.clone(),
        })
    }

    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    /// Resource polling defaults, for building ready waits
    pub fn poll_settings(&self) -> &PollSettings {
        &self.poll
    }

    /// Apply one mutation to completion.
    ///
    /// Errors are wrapped in [`CloudError::Phase`]; use
    /// [`CloudError::root_cause`] to match on the underlying failure.
    pub async fn run(&self, req: &MutationRequest, deadline: &Deadline) -> Result<MutationOutcome> {
        let started_at = Utc::now();
        let fetcher = self.executor.fetcher();

        if let Some(wait) = &req.await_ready_before {
            tracing::info!(
                operation = %req.operation,
                resource = %req.target(),
                phase = %Phase::Preflight,
                "Waiting for running operation"
            );
            self.executor
                .await_ready(req, wait, deadline)
                .await
                .map_err(in_phase(req, Phase::Preflight))?;
        }

        tracing::info!(
            operation = %req.operation,
            resource = %req.target(),
            phase = %Phase::Issuing,
            "Applying change"
        );
        let execution = self
            .executor
            .issue(req, deadline)
            .await
            .map_err(in_phase(req, Phase::Issuing))?;

        let job_id = extract_handle(req, HandleKind::Job, req.job.as_ref(), &execution.response)
            .map_err(in_phase(req, Phase::Issuing))?;
        let order_id =
            extract_handle(req, HandleKind::Order, req.order.as_ref(), &execution.response)
                .map_err(in_phase(req, Phase::Issuing))?;

        if let Some(wait) = &req.wait_ready {
            tracing::info!(
                operation = %req.operation,
                phase = %Phase::AwaitingReady,
                "Waiting for resource"
            );
            self.executor
                .await_ready(req, wait, deadline)
                .await
                .map_err(in_phase(req, Phase::AwaitingReady))?;
        }

        let mut evidence = Vec::new();
        if let Some(job_id) = &job_id {
            self.jobs
                .wait(fetcher, job_id, req.timeout, deadline)
                .await
                .map_err(in_phase(req, Phase::AwaitingJob))?;
            evidence.push(format!("{} {}", HandleKind::Job, job_id));
        }
        if let Some(order_id) = &order_id {
            self.orders
                .wait(fetcher, order_id, req.timeout, deadline)
                .await
                .map_err(in_phase(req, Phase::AwaitingOrder))?;
            evidence.push(format!("{} {}", HandleKind::Order, order_id));
        }

        let verified = match &req.verify {
            Some(verification) if !evidence.is_empty() => {
                tracing::info!(
                    operation = %req.operation,
                    phase = %Phase::Verifying,
                    field = %verification.field,
                    "Verifying"
                );
                let evidence = evidence.join(" and ");
                verifier::verify_field(fetcher, &req.resource_id, verification, &evidence)
                    .await
                    .map_err(in_phase(req, Phase::Verifying))?;
                true
            }
            Some(verification) => {
                tracing::warn!(
                    operation = %req.operation,
                    field = %verification.field,
                    "Response carried no job or order, trusting the synchronous result"
                );
                false
            }
            None => false,
        };

        tracing::info!(
            operation = %req.operation,
            resource = %req.target(),
            attempts = execution.attempts,
            verified,
            "Change applied"
        );
        Ok(MutationOutcome {
            operation: req.operation.clone(),
            response: execution.response,
            attempts: execution.attempts,
            job_id,
            order_id,
            verified,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Apply a resource's changes in order, stopping at the first failure.
    pub async fn apply_all(
        &self,
        requests: &[MutationRequest],
        deadline: &Deadline,
    ) -> Result<Vec<MutationOutcome>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for req in requests {
            outcomes.push(self.run(req, deadline).await?);
        }
        Ok(outcomes)
    }
}

fn in_phase(req: &MutationRequest, phase: Phase) -> impl FnOnce(CloudError) -> CloudError + '_ {
    move |source| {
        tracing::error!(
            operation = %req.operation,
            phase = %phase,
            error = %source,
            "Change failed"
        );
        CloudError::Phase {
            phase,
            operation: req.operation.clone(),
            source: Box::new(source),
        }
    }
}

fn extract_handle(
    req: &MutationRequest,
    kind: HandleKind,
    expr: Option<&HandleExpr>,
    response: &ResourceSnapshot,
) -> Result<Option<String>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match expr.extract(response) {
        Some(id) => Ok(Some(id)),
        None if expr.required => Err(CloudError::MissingHandle {
            operation: req.operation.clone(),
            kind,
            path: expr.path.to_string(),
        }),
        None => Ok(None),
    }
}
