//! Job and billing-order completion waiters
//!
//! Both are the state poller with a different fetch and status vocabulary.
//! Unlike resources, a job or order never legitimately disappears: a missing
//! record is terminal instead of pending forever.

use crate::deadline::Deadline;
use crate::error::{CloudError, Result};
use crate::poller::{self, Observation, PollOutcome, PollSpec, StatusSource};
use crate::provider::SnapshotFetcher;
use crate::request::HandleKind;
use crate::snapshot::{FieldPath, ResourceSnapshot};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use stratus_config::{JobSettings, OrderSettings};

/// Status vocabulary and cadence of a job or order lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    pub status_path: FieldPath,
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub failure: Vec<String>,
    pub detail_path: Option<FieldPath>,
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl Vocabulary {
    pub fn for_jobs(settings: &JobSettings) -> Result<Self> {
        Ok(Self {
            status_path: FieldPath::parse(&settings.status_path)?,
            pending: settings.pending.clone(),
            target: settings.target.clone(),
            failure: settings.failure.clone(),
            detail_path: settings
                .detail_path
                .as_deref()
                .map(FieldPath::parse)
                .transpose()?,
            interval: Duration::from_millis(settings.interval_ms),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
        })
    }

    pub fn for_orders(settings: &OrderSettings) -> Result<Self> {
        Ok(Self {
            status_path: FieldPath::parse(&settings.status_path)?,
            pending: settings.pending.clone(),
            target: settings.target.clone(),
            failure: settings.failure.clone(),
            detail_path: None,
            interval: Duration::from_millis(settings.interval_ms),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
        })
    }

    pub fn poll_spec(&self, timeout: Duration) -> PollSpec {
        PollSpec::new(self.target.iter().cloned(), timeout)
            .with_pending(self.pending.iter().cloned())
            .with_error(self.failure.iter().cloned())
            .with_interval(self.interval)
            .with_initial_delay(self.initial_delay)
    }
}

/// Waits for a job or order handle to complete
#[derive(Debug, Clone)]
pub struct CompletionWaiter {
    kind: HandleKind,
    vocabulary: Vocabulary,
}

impl CompletionWaiter {
    pub fn jobs(vocabulary: Vocabulary) -> Self {
        Self {
            kind: HandleKind::Job,
            vocabulary,
        }
    }

    pub fn orders(vocabulary: Vocabulary) -> Self {
        Self {
            kind: HandleKind::Order,
            vocabulary,
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Poll until the handle reaches a target status.
    ///
    /// A failure status is [`CloudError::UnexpectedStatus`] carrying the record's
    /// diagnostic; a missing record is [`CloudError::RecordVanished`].
    pub async fn wait(
        &self,
        fetcher: &dyn SnapshotFetcher,
        id: &str,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Result<PollOutcome> {
        let source = HandleStatusSource {
            fetcher,
            kind: self.kind,
            id,
            vocabulary: &self.vocabulary,
        };
        tracing::info!(kind = %self.kind, id, "Waiting for completion");
        poller::poll(&source, &self.vocabulary.poll_spec(timeout), deadline).await
    }
}

struct HandleStatusSource<'a> {
    fetcher: &'a dyn SnapshotFetcher,
    kind: HandleKind,
    id: &'a str,
    vocabulary: &'a Vocabulary,
}

#[async_trait]
impl StatusSource for HandleStatusSource<'_> {
    fn describe(&self) -> String {
        format!("{} {}", self.kind, self.id)
    }

    async fn observe(&self) -> Result<Observation> {
        let fetched = match self.kind {
            HandleKind::Job => self.fetcher.fetch_job(self.id).await,
            HandleKind::Order => self.fetcher.fetch_order(self.id).await,
        };
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                return Err(CloudError::RecordVanished {
                    target: self.describe(),
                });
            }
            Err(source) => {
                return Err(CloudError::Fetch {
                    target: self.describe(),
                    source,
                });
            }
        };

        if snapshot.is_empty() {
            return Err(CloudError::RecordVanished {
                target: self.describe(),
            });
        }
        match snapshot.status_at(&self.vocabulary.status_path) {
            Some(status) => Ok(Observation::Status { status, snapshot }),
            None => Err(CloudError::RecordVanished {
                target: self.describe(),
            }),
        }
    }

    fn failure_detail(&self, snapshot: &ResourceSnapshot) -> Option<String> {
        match &self.vocabulary.detail_path {
            Some(path) => match snapshot.extract(path)? {
                Value::Null => None,
                Value::String(s) if s.is_empty() => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            },
            None => Some(snapshot.document().to_string()),
        }
    }
}
