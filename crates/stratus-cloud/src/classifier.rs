//! Transient-conflict classification
//!
//! The remote API enforces one mutation at a time per resource by rejecting
//! concurrent ones with a service-specific "another operation is in progress"
//! code. Those codes are the only errors worth retrying.

use crate::error::ApiError;
use std::collections::BTreeSet;

/// HTTP statuses that can carry a transient conflict code
pub const CONFLICT_CARRIER_STATUSES: [u16; 4] = [400, 403, 409, 500];

/// Body keys probed for the error code, in order
pub const ERROR_CODE_KEYS: [&str; 2] = ["error_code", "errCode"];

/// Verdict for one failed remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Known transient conflict; the same call may be issued again
    Retry { code: String },
    /// Anything else; the call must not be repeated
    Terminal,
    /// A conflict-carrying response whose body is not JSON
    Unparseable { status: u16, reason: String },
}

impl Classification {
    pub fn is_retry(&self) -> bool {
        matches!(self, Classification::Retry { .. })
    }
}

/// Transient code table of one service family
///
/// Immutable once built; construct one per service family and share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    service: String,
    statuses: BTreeSet<u16>,
    codes: BTreeSet<String>,
}

impl RetryPolicy {
    pub fn new<I, S>(service: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.into(),
            statuses: CONFLICT_CARRIER_STATUSES.into_iter().collect(),
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Policy that never retries
    pub fn none(service: impl Into<String>) -> Self {
        Self::new(service, Vec::<String>::new())
    }

    /// Only recognise conflicts on these statuses (ignored unless they carry conflicts at all)
    pub fn on_statuses(mut self, statuses: &[u16]) -> Self {
        self.statuses = statuses
            .iter()
            .copied()
            .filter(|s| CONFLICT_CARRIER_STATUSES.contains(s))
            .collect();
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn is_transient_code(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Classify a failed call. Pure: no I/O, no state.
    pub fn classify(&self, err: &ApiError) -> Classification {
        let ApiError::Http { status, .. } = err else {
            return Classification::Terminal;
        };
        if !self.statuses.contains(status) {
            return Classification::Terminal;
        }

        match err.error_code(&ERROR_CODE_KEYS) {
            Ok(Some(code)) if self.is_transient_code(&code) => Classification::Retry { code },
            Ok(_) => Classification::Terminal,
            Err(parse_err) => Classification::Unparseable {
                status: *status,
                reason: parse_err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new("dcs", ["DCS.4026", "DCS.4113", "CBC.99003651"])
    }

    #[test]
    fn test_known_codes_retry_on_every_carrier_status() {
        let policy = policy();
        for status in CONFLICT_CARRIER_STATUSES {
            for code in ["DCS.4026", "DCS.4113", "CBC.99003651"] {
                for key in ERROR_CODE_KEYS {
                    let body = format!(r#"{{"{}":"{}","error_msg":"busy"}}"#, key, code);
                    assert_eq!(
                        policy.classify(&ApiError::http(status, body)),
                        Classification::Retry {
                            code: code.to_string()
                        },
                        "status {} key {} code {}",
                        status,
                        key,
                        code
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown_code_is_terminal() {
        let err = ApiError::http(400, r#"{"error_code":"DCS.4000","error_msg":"bad flavor"}"#);
        assert_eq!(policy().classify(&err), Classification::Terminal);
    }

    #[test]
    fn test_non_carrier_status_is_terminal_even_with_known_code() {
        for status in [401, 404, 429, 502, 503] {
            let err = ApiError::http(status, r#"{"error_code":"DCS.4026"}"#);
            assert_eq!(policy().classify(&err), Classification::Terminal);
        }
    }

    #[test]
    fn test_transport_error_is_terminal() {
        let err = ApiError::Transport("connection reset".to_string());
        assert_eq!(policy().classify(&err), Classification::Terminal);
    }

    #[test]
    fn test_body_without_code_is_terminal() {
        let err = ApiError::http(409, r#"{"message":"conflict"}"#);
        assert_eq!(policy().classify(&err), Classification::Terminal);
    }

    #[test]
    fn test_malformed_body_is_reported_as_unparseable() {
        let err = ApiError::http(500, "upstream timed out");
        match policy().classify(&err) {
            Classification::Unparseable { status, reason } => {
                assert_eq!(status, 500);
                assert!(!reason.is_empty());
            }
            other => panic!("Expected Unparseable, got {:?}", other),
        }
    }

    #[test]
    fn test_restricted_statuses() {
        let policy = RetryPolicy::new("geminidb", ["DBS.200019"]).on_statuses(&[403, 404]);
        let body = r#"{"error_code":"DBS.200019"}"#;

        assert!(policy.classify(&ApiError::http(403, body)).is_retry());
        assert_eq!(
            policy.classify(&ApiError::http(400, body)),
            Classification::Terminal
        );
        // 404 never carries conflicts, and a bad body outside the carriers is not parsed
        assert_eq!(
            policy.classify(&ApiError::http(404, "not json")),
            Classification::Terminal
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let policy = policy();
        let err = ApiError::http(400, r#"{"errCode":"CBC.99003651"}"#);
        assert_eq!(policy.classify(&err), policy.classify(&err));
        assert!(RetryPolicy::none("evs").codes().next().is_none());
    }
}
