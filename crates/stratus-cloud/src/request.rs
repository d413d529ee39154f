//! Mutation request description

use crate::error::Result;
use crate::poller::{PollSpec, StatusReader};
use crate::remote::RemoteCall;
use crate::snapshot::{FieldPath, FieldValue, ResourceSnapshot};
use std::fmt;
use std::time::Duration;

/// Kind of asynchronous handle a mutation response may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Background job tracked through the job API
    Job,
    /// Billing order tracked through the order API (prepaid changes)
    Order,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Job => write!(f, "job"),
            HandleKind::Order => write!(f, "order"),
        }
    }
}

/// Where a handle id lives in the mutation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleExpr {
    pub path: FieldPath,
    /// Absent id is an error instead of "no handle"
    pub required: bool,
}

impl HandleExpr {
    pub fn optional(path: &str) -> Result<Self> {
        Ok(Self {
            path: FieldPath::parse(path)?,
            required: false,
        })
    }

    pub fn required(path: &str) -> Result<Self> {
        Ok(Self {
            path: FieldPath::parse(path)?,
            required: true,
        })
    }

    /// Non-empty handle id in `response`
    pub fn extract(&self, response: &ResourceSnapshot) -> Option<String> {
        response.string_at(&self.path)
    }
}

/// Resource readiness wait
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyWait {
    pub reader: StatusReader,
    pub spec: PollSpec,
    /// A snapshot without an id here counts as not-found
    pub id_path: Option<FieldPath>,
}

impl ReadyWait {
    pub fn new(reader: StatusReader, spec: PollSpec) -> Self {
        Self {
            reader,
            spec,
            id_path: None,
        }
    }

    /// Wait on the scalar status at `path`
    pub fn on_field(path: &str, spec: PollSpec) -> Result<Self> {
        Ok(Self::new(StatusReader::Field(FieldPath::parse(path)?), spec))
    }

    pub fn with_id_path(mut self, path: &str) -> Result<Self> {
        self.id_path = Some(FieldPath::parse(path)?);
        Ok(self)
    }
}

/// Post-mutation assertion on one field of a fresh read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub field: FieldPath,
    pub expected: FieldValue,
}

impl Verification {
    pub fn new(field: &str, expected: impl Into<FieldValue>) -> Result<Self> {
        Ok(Self {
            field: FieldPath::parse(field)?,
            expected: expected.into(),
        })
    }
}

/// Everything the orchestrator needs to apply one change
#[derive(Debug, Clone)]
pub struct MutationRequest {
    /// Name used in logs and errors, e.g. `resize flavor`
    pub operation: String,
    pub resource_id: String,
    /// Noun used in logs and errors, e.g. `instance`
    pub resource_kind: String,
    pub call: RemoteCall,
    /// Retry transient conflicts; off for calls that are not safe to repeat
    pub retryable: bool,
    /// Window for each wait phase and for the retry loop
    pub timeout: Duration,
    pub job: Option<HandleExpr>,
    pub order: Option<HandleExpr>,
    /// Wait for the resource to settle before issuing the call
    pub await_ready_before: Option<ReadyWait>,
    pub wait_ready: Option<ReadyWait>,
    pub verify: Option<Verification>,
}

impl MutationRequest {
    pub fn new(
        operation: impl Into<String>,
        resource_id: impl Into<String>,
        call: RemoteCall,
        timeout: Duration,
    ) -> Self {
        Self {
            operation: operation.into(),
            resource_id: resource_id.into(),
            resource_kind: "resource".to_string(),
            call,
            retryable: true,
            timeout,
            job: None,
            order: None,
            await_ready_before: None,
            wait_ready: None,
            verify: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.resource_kind = kind.into();
        self
    }

    pub fn not_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    pub fn with_job(mut self, handle: HandleExpr) -> Self {
        self.job = Some(handle);
        self
    }

    pub fn with_order(mut self, handle: HandleExpr) -> Self {
        self.order = Some(handle);
        self
    }

    pub fn with_ready_before(mut self, wait: ReadyWait) -> Self {
        self.await_ready_before = Some(wait);
        self
    }

    pub fn with_ready(mut self, wait: ReadyWait) -> Self {
        self.wait_ready = Some(wait);
        self
    }

    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verify = Some(verification);
        self
    }

    /// `instance i-1`
    pub fn target(&self) -> String {
        format!("{} {}", self.resource_kind, self.resource_id)
    }
}
