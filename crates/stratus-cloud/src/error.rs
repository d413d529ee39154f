//! Orchestration error types

use crate::orchestrator::Phase;
use crate::request::HandleKind;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single remote call, as reported by the invoker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Non-2xx response; `body` is the raw response text
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Probe the JSON body for an error code under each of `keys`, first hit wins.
    ///
    /// `Ok(None)` when the body is valid JSON without any of the keys; `Err` when it is not JSON.
    pub fn error_code(
        &self,
        keys: &[&str],
    ) -> std::result::Result<Option<String>, serde_json::Error> {
        let Self::Http { body, .. } = self else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(body)?;
        Ok(keys.iter().find_map(|key| {
            value
                .get(*key)
                .and_then(|code| code.as_str())
                .filter(|code| !code.is_empty())
                .map(str::to_string)
        }))
    }

    /// Re-label a documented "resource is gone" error as a 404.
    ///
    /// Some services answer reads of a deleted resource with e.g. a 400 carrying a
    /// specific code instead of a 404.
    pub fn convert_expected(self, status: u16, key: &str, codes: &[&str]) -> Self {
        if self.status() != Some(status) {
            return self;
        }
        match self.error_code(&[key]) {
            Ok(Some(code)) if codes.contains(&code.as_str()) => match self {
                Self::Http { body, .. } => Self::Http { status: 404, body },
                other => other,
            },
            _ => self,
        }
    }
}

/// Orchestration errors
///
/// Transient conflicts never appear here: they are retried inside the executor
/// and only surface as [`CloudError::RetryBudgetExhausted`].
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(
        "{operation}: gave up retrying after {attempts} attempts in {elapsed:?}, \
         the resource kept reporting conflict {last_code}"
    )]
    RetryBudgetExhausted {
        operation: String,
        attempts: u32,
        elapsed: Duration,
        last_code: String,
        #[source]
        last_error: ApiError,
    },

    #[error("{operation} failed: {source}")]
    TerminalApi {
        operation: String,
        #[source]
        source: ApiError,
    },

    #[error("{operation}: unable to parse the error body of HTTP {status}: {reason}")]
    UnparseableErrorBody {
        operation: String,
        status: u16,
        reason: String,
    },

    #[error("Timeout after {timeout:?} waiting for {target} (last status: {last_status})")]
    PollTimeout {
        target: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("{target} reported failure status {status}{}", detail_suffix(.detail))]
    UnexpectedStatus {
        target: String,
        status: String,
        detail: Option<String>,
    },

    #[error("{target} disappeared while it was expected to exist")]
    UnexpectedDeletion { target: String },

    #[error("{target} has no record; it vanished before completing")]
    RecordVanished { target: String },

    #[error("{operation}: response has no {kind} id at '{path}'")]
    MissingHandle {
        operation: String,
        kind: HandleKind,
        path: String,
    },

    #[error(
        "{resource}: {evidence} reported success but field '{field}' did not converge \
         (expected {expected}, observed {observed})"
    )]
    VerificationMismatch {
        resource: String,
        field: String,
        expected: String,
        observed: String,
        evidence: String,
    },

    #[error("Failed to read {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: ApiError,
    },

    #[error("Cancelled while waiting for {target}")]
    Cancelled { target: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{operation}: {phase} failed: {source}")]
    Phase {
        phase: Phase,
        operation: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] stratus_config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

impl CloudError {
    /// The underlying error with any phase wrappers removed
    pub fn root_cause(&self) -> &CloudError {
        let mut current = self;
        while let CloudError::Phase { source, .. } = current {
            current = source;
        }
        current
    }

    /// Phase that failed, when raised by the orchestrator
    pub fn phase(&self) -> Option<Phase> {
        match self {
            CloudError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.root_cause(),
            CloudError::PollTimeout { .. } | CloudError::RetryBudgetExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
