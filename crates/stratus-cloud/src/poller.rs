//! State poller
//!
//! Repeatedly observes a status until it reaches a target, hits an error
//! status, disappears, or the time window closes. Statuses that are neither
//! target, error nor pending are tolerated as pending so that transitional
//! statuses added by newer API versions do not break an apply.

use crate::deadline::Deadline;
use crate::error::{CloudError, Result};
use crate::provider::SnapshotFetcher;
use crate::snapshot::{FieldPath, ResourceSnapshot};
use async_trait::async_trait;
use std::time::Duration;
use stratus_config::PollSettings;
use tokio::time::Instant;

/// Logical status synthesised when a read reports not-found
pub const DELETED_STATUS: &str = "deleted";

/// Parameters of one polling operation
#[derive(Debug, Clone, PartialEq)]
pub struct PollSpec {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub error: Vec<String>,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub timeout: Duration,
    /// Consecutive target observations required before success
    pub target_occurrence: u32,
}

impl PollSpec {
    pub fn new<I, S>(target: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: Vec::new(),
            target: target.into_iter().map(Into::into).collect(),
            error: Vec::new(),
            interval: Duration::from_secs(10),
            initial_delay: Duration::ZERO,
            timeout,
            target_occurrence: 1,
        }
    }

    /// Cadence, timeout and error statuses from settings
    pub fn from_settings<I, S>(settings: &PollSettings, target: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(target, Duration::from_millis(settings.timeout_ms))
            .with_interval(Duration::from_millis(settings.interval_ms))
            .with_initial_delay(Duration::from_millis(settings.initial_delay_ms))
            .with_error(settings.error_statuses.iter().cloned())
    }

    pub fn with_pending<I, S>(mut self, pending: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = pending.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_error<I, S>(mut self, error: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error = error.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_target_occurrence(mut self, occurrence: u32) -> Self {
        self.target_occurrence = occurrence.max(1);
        self
    }

    pub fn accepts_deleted(&self) -> bool {
        self.target.iter().any(|t| is_deleted(t))
    }

    /// Target wins over error, error over pending.
    pub fn classify(&self, status: &str) -> StatusClass {
        let in_set = |set: &[String]| {
            set.iter()
                .any(|s| s == status || (is_deleted(s) && is_deleted(status)))
        };
        if in_set(&self.target) {
            StatusClass::Target
        } else if in_set(&self.error) {
            StatusClass::Error
        } else if in_set(&self.pending) {
            StatusClass::Pending
        } else {
            StatusClass::Unrecognized
        }
    }
}

fn is_deleted(status: &str) -> bool {
    status.eq_ignore_ascii_case(DELETED_STATUS)
}

/// Classification of one observed status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Target,
    Error,
    Pending,
    /// Not listed anywhere; the poller keeps waiting
    Unrecognized,
}

/// Result of one observation
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Status {
        status: String,
        snapshot: ResourceSnapshot,
    },
    NotFound,
}

/// Something the poller can observe: a resource, a job or an order
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Human-readable name used in errors, e.g. `job j-1`
    fn describe(&self) -> String;

    /// Fetch once and report the current status. Must not mutate anything.
    async fn observe(&self) -> Result<Observation>;

    /// Diagnostic attached to an error-status failure
    fn failure_detail(&self, _snapshot: &ResourceSnapshot) -> Option<String> {
        None
    }
}

/// Terminal success of a poll
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub status: String,
    /// `None` when the status was synthesised from a not-found read
    pub snapshot: Option<ResourceSnapshot>,
    pub ticks: u32,
    pub elapsed: Duration,
}

/// Poll `source` until `spec` is satisfied.
///
/// The effective window is the earlier of `spec.timeout` and `deadline`. The
/// deadline is only consulted between ticks.
pub async fn poll(
    source: &dyn StatusSource,
    spec: &PollSpec,
    deadline: &Deadline,
) -> Result<PollOutcome> {
    let target = source.describe();
    let window = deadline.narrowed(spec.timeout);
    let start = Instant::now();
    let required = spec.target_occurrence.max(1);
    let mut last_status = "<none>".to_string();
    let mut consecutive = 0;
    let mut ticks = 0;

    tracing::debug!(resource = %target, targets = ?spec.target, "Start polling");

    if !spec.initial_delay.is_zero() && !window.sleep(spec.initial_delay).await {
        return Err(timeout_error(&window, target, start, last_status));
    }

    loop {
        if window.is_cancelled() {
            return Err(CloudError::Cancelled { target });
        }

        ticks += 1;
        let (status, snapshot) = match source.observe().await? {
            Observation::Status { status, snapshot } => (status, Some(snapshot)),
            Observation::NotFound if spec.accepts_deleted() => (DELETED_STATUS.to_string(), None),
            Observation::NotFound => return Err(CloudError::UnexpectedDeletion { target }),
        };

        match spec.classify(&status) {
            StatusClass::Target => {
                consecutive += 1;
                if consecutive >= required {
                    tracing::debug!(resource = %target, status = %status, ticks, "Reached target");
                    return Ok(PollOutcome {
                        status,
                        snapshot,
                        ticks,
                        elapsed: start.elapsed(),
                    });
                }
            }
            StatusClass::Error => {
                let detail = snapshot.as_ref().and_then(|s| source.failure_detail(s));
                return Err(CloudError::UnexpectedStatus {
                    target,
                    status,
                    detail,
                });
            }
            StatusClass::Pending => {
                consecutive = 0;
                tracing::debug!(resource = %target, status = %status, ticks, "Still pending");
            }
            StatusClass::Unrecognized => {
                consecutive = 0;
                tracing::debug!(
                    resource = %target,
                    status = %status,
                    ticks,
                    "Unrecognized status, treating as pending"
                );
            }
        }
        last_status = status;

        if !window.sleep(spec.interval).await {
            return Err(timeout_error(&window, target, start, last_status));
        }
    }
}

fn timeout_error(
    window: &Deadline,
    target: String,
    start: Instant,
    last_status: String,
) -> CloudError {
    if window.is_cancelled() {
        return CloudError::Cancelled { target };
    }
    CloudError::PollTimeout {
        target,
        timeout: start.elapsed(),
        last_status,
    }
}

/// How a resource's status is derived from its snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReader {
    /// Scalar at a path, e.g. `instance.status`
    Field(FieldPath),
    /// Derived from an actions list: reports `actions[0]` while any of `actions`
    /// is listed, `idle_status` otherwise
    PendingAction {
        actions_path: FieldPath,
        actions: Vec<String>,
        idle_status: String,
    },
}

impl StatusReader {
    pub fn read(&self, snapshot: &ResourceSnapshot) -> String {
        match self {
            StatusReader::Field(path) => snapshot.status_at(path).unwrap_or_default(),
            StatusReader::PendingAction {
                actions_path,
                actions,
                idle_status,
            } => {
                let listed = snapshot
                    .extract(actions_path)
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                let busy = listed
                    .iter()
                    .filter_map(|v| v.as_str())
                    .any(|a| actions.iter().any(|wanted| wanted == a));
                match (busy, actions.first()) {
                    (true, Some(primary)) => primary.clone(),
                    _ => idle_status.clone(),
                }
            }
        }
    }
}

/// Observes a resource through [`SnapshotFetcher::fetch_resource`]
pub struct ResourceStatusSource<'a> {
    fetcher: &'a dyn SnapshotFetcher,
    resource_id: String,
    kind: String,
    reader: StatusReader,
    id_path: Option<FieldPath>,
}

impl<'a> ResourceStatusSource<'a> {
    pub fn new(
        fetcher: &'a dyn SnapshotFetcher,
        resource_id: impl Into<String>,
        reader: StatusReader,
    ) -> Self {
        Self {
            fetcher,
            resource_id: resource_id.into(),
            kind: "resource".to_string(),
            reader,
            id_path: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Treat a snapshot without an id at `path` as not-found
    pub fn with_id_path(mut self, path: Option<FieldPath>) -> Self {
        self.id_path = path;
        self
    }
}

#[async_trait]
impl StatusSource for ResourceStatusSource<'_> {
    fn describe(&self) -> String {
        format!("{} {}", self.kind, self.resource_id)
    }

    async fn observe(&self) -> Result<Observation> {
        let snapshot = match self.fetcher.fetch_resource(&self.resource_id).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => return Ok(Observation::NotFound),
            Err(source) => {
                return Err(CloudError::Fetch {
                    target: self.describe(),
                    source,
                });
            }
        };

        if let Some(id_path) = &self.id_path {
            if snapshot.string_at(id_path).is_none() {
                return Ok(Observation::NotFound);
            }
        }

        Ok(Observation::Status {
            status: self.reader.read(&snapshot),
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed script; repeats the last entry once exhausted
    struct Scripted {
        script: Mutex<VecDeque<Option<&'static str>>>,
        last: Mutex<Option<&'static str>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: &[Option<&'static str>]) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        fn describe(&self) -> String {
            "instance i-1".to_string()
        }

        async fn observe(&self) -> Result<Observation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                let mut last = self.last.lock().unwrap();
                if let Some(entry) = script.pop_front() {
                    *last = entry;
                }
                *last
            };
            Ok(match next {
                Some(status) => Observation::Status {
                    status: status.to_string(),
                    snapshot: ResourceSnapshot::new(json!({"status": status})),
                },
                None => Observation::NotFound,
            })
        }

        fn failure_detail(&self, snapshot: &ResourceSnapshot) -> Option<String> {
            Some(format!("snapshot {}", snapshot.document()))
        }
    }

    fn spec() -> PollSpec {
        PollSpec::new(["ACTIVE"], Duration::from_secs(60))
            .with_pending(["BUILD", "RESIZING"])
            .with_error(["abnormal", "createfail"])
            .with_interval(Duration::from_secs(5))
    }

    fn far() -> Deadline {
        Deadline::after(Duration::from_secs(3600))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_exactly_four_ticks() {
        let source = Scripted::new(&[
            Some("BUILD"),
            Some("BUILD"),
            Some("BUILD"),
            Some("ACTIVE"),
            Some("BUILD"),
        ]);

        let outcome = poll(&source, &spec(), &far()).await.unwrap();

        assert_eq!(outcome.status, "ACTIVE");
        assert_eq!(outcome.ticks, 4);
        assert_eq!(source.calls(), 4);
        assert_eq!(outcome.elapsed, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_throttled() {
        let source = Scripted::new(&[Some("BUILD")]);
        let spec = PollSpec::new(["ACTIVE"], Duration::from_millis(200))
            .with_pending(["BUILD"])
            .with_interval(Duration::ZERO);

        let err = poll(&source, &spec, &far()).await.unwrap_err();

        assert!(matches!(err, CloudError::PollTimeout { .. }));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_spec_timeout() {
        let source = Scripted::new(&[Some("BUILD")]);
        let start = Instant::now();

        let err = poll(&source, &spec(), &far()).await.unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(60));
        match err {
            CloudError::PollTimeout {
                target,
                timeout,
                last_status,
            } => {
                assert_eq!(target, "instance i-1");
                assert_eq!(timeout, Duration::from_secs(60));
                assert_eq!(last_status, "BUILD");
            }
            other => panic!("Expected PollTimeout, got {:?}", other),
        }
        // ticks at 0, 5, ..., 55
        assert_eq!(source.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_shortens_window() {
        let source = Scripted::new(&[Some("BUILD")]);
        let start = Instant::now();

        let err = poll(&source, &spec(), &Deadline::after(Duration::from_secs(12)))
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::PollTimeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(12));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_synthesises_deleted_when_accepted() {
        let source = Scripted::new(&[Some("ACTIVE"), None]);
        let spec = PollSpec::new(["DELETED"], Duration::from_secs(60)).with_pending(["ACTIVE"]);

        let outcome = poll(&source, &spec, &far()).await.unwrap();

        assert_eq!(outcome.status, DELETED_STATUS);
        assert!(outcome.snapshot.is_none());
        assert_eq!(outcome.ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_unexpected_when_deleted_not_accepted() {
        let source = Scripted::new(&[Some("BUILD"), None]);

        let err = poll(&source, &spec(), &far()).await.unwrap_err();

        assert!(matches!(
            err,
            CloudError::UnexpectedDeletion { target } if target == "instance i-1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_fails_with_detail() {
        let source = Scripted::new(&[Some("BUILD"), Some("abnormal")]);

        match poll(&source, &spec(), &far()).await.unwrap_err() {
            CloudError::UnexpectedStatus { status, detail, .. } => {
                assert_eq!(status, "abnormal");
                assert!(detail.unwrap().contains("abnormal"));
            }
            other => panic!("Expected UnexpectedStatus, got {:?}", other),
        }
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_statuses_are_tolerated_as_pending() {
        let source = Scripted::new(&[
            Some("BACKING UP"),
            Some("SOME_FUTURE_STATUS"),
            Some(""),
            Some("ACTIVE"),
        ]);

        let outcome = poll(&source, &spec(), &far()).await.unwrap();

        assert_eq!(outcome.status, "ACTIVE");
        assert_eq!(outcome.ticks, 4);
        assert_eq!(spec().classify("SOME_FUTURE_STATUS"), StatusClass::Unrecognized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_applies_once() {
        let source = Scripted::new(&[Some("BUILD"), Some("ACTIVE")]);
        let spec = spec().with_initial_delay(Duration::from_secs(10));

        let outcome = poll(&source, &spec, &far()).await.unwrap();

        assert_eq!(outcome.elapsed, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_occurrence_requires_consecutive_hits() {
        let source = Scripted::new(&[
            Some("DELETED"),
            Some("ACTIVE"),
            Some("DELETED"),
            Some("DELETED"),
        ]);
        let spec = PollSpec::new(["DELETED"], Duration::from_secs(60))
            .with_pending(["ACTIVE"])
            .with_target_occurrence(2);

        let outcome = poll(&source, &spec, &far()).await.unwrap();

        assert_eq!(outcome.ticks, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_at_tick_boundary() {
        let flag = crate::deadline::CancelFlag::new();
        let deadline = far().with_cancel(flag.clone());
        let source = Scripted::new(&[Some("BUILD")]);

        flag.cancel();
        let err = poll(&source, &spec(), &deadline).await.unwrap_err();

        assert!(matches!(err, CloudError::Cancelled { .. }));
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_classify_precedence_and_deleted_case() {
        let spec = PollSpec::new(["deleted", "ACTIVE"], Duration::from_secs(1))
            .with_error(["ACTIVE", "FAILED"])
            .with_pending(["FAILED"]);

        assert_eq!(spec.classify("ACTIVE"), StatusClass::Target);
        assert_eq!(spec.classify("DELETED"), StatusClass::Target);
        assert_eq!(spec.classify("FAILED"), StatusClass::Error);
        assert!(spec.accepts_deleted());
    }

    #[test]
    fn test_pending_action_reader() {
        let reader = StatusReader::PendingAction {
            actions_path: FieldPath::parse("actions").unwrap(),
            actions: vec!["REDUCING".to_string(), "PERIOD_RESOURCE_DELETE".to_string()],
            idle_status: "available".to_string(),
        };

        let busy = ResourceSnapshot::new(json!({"actions": ["BACKUP", "PERIOD_RESOURCE_DELETE"]}));
        let idle = ResourceSnapshot::new(json!({"actions": ["BACKUP"]}));
        let missing = ResourceSnapshot::new(json!({}));

        assert_eq!(reader.read(&busy), "REDUCING");
        assert_eq!(reader.read(&idle), "available");
        assert_eq!(reader.read(&missing), "available");
    }
}
