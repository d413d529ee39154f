//! Collaborator traits the orchestrator consumes
//!
//! Each cloud service implements these once; the poller, waiters, executor and
//! verifier receive them as trait objects instead of capturing a client.

use crate::error::ApiError;
use crate::remote::RemoteCall;
use crate::snapshot::ResourceSnapshot;
use async_trait::async_trait;

/// Issues remote calls
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    /// Perform `call` once and return the parsed JSON response body
    async fn invoke(&self, call: &RemoteCall) -> std::result::Result<serde_json::Value, ApiError>;
}

/// Read-only views of a resource, its async jobs and its billing orders
///
/// Implementations must not mutate anything; a not-found condition is
/// reported as an [`ApiError`] with status 404.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_resource(&self, id: &str) -> std::result::Result<ResourceSnapshot, ApiError>;

    async fn fetch_job(&self, job_id: &str) -> std::result::Result<ResourceSnapshot, ApiError>;

    async fn fetch_order(&self, order_id: &str)
    -> std::result::Result<ResourceSnapshot, ApiError>;
}
