//! Stratus Cloud mutation orchestration
//!
//! Drives a cloud resource through a long-running change: the control plane
//! accepts mutations asynchronously (background jobs, billing orders), rejects
//! concurrent ones with transient "operation in progress" errors, and may
//! report success without having converged the field.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            resource update routine               │
//! │        (one MutationRequest per change)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 Orchestrator                     │
//! │  ┌──────────────┐ ┌──────────────┐ ┌─────────┐  │
//! │  │   Executor   │ │ Job / Order  │ │ Verifier│  │
//! │  │ + Classifier │ │   Waiters    │ │         │  │
//! │  └──────┬───────┘ └──────┬───────┘ └────┬────┘  │
//! │         │         ┌──────▼───────┐      │       │
//! │         │         │    Poller    │      │       │
//! │         │         └──────┬───────┘      │       │
//! └─────────┼────────────────┼──────────────┼───────┘
//!           │                │              │
//! ┌─────────▼──────┐ ┌───────▼──────────────▼───────┐
//! │ RemoteInvoker  │ │       SnapshotFetcher        │
//! └────────────────┘ └──────────────────────────────┘
//! ```
//!
//! Service crates (such as `stratus-cloud-huawei`) implement the two
//! collaborator traits and supply a [`RetryPolicy`] per service family.

pub mod classifier;
pub mod deadline;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod poller;
pub mod provider;
pub mod remote;
pub mod request;
pub mod snapshot;
pub mod verifier;
pub mod waiter;

// Re-exports
pub use classifier::{Classification, RetryPolicy};
pub use deadline::{CancelFlag, Deadline, MIN_TICK};
pub use error::{ApiError, CloudError, Result};
pub use executor::{Execution, MutationExecutor};
pub use orchestrator::{MutationOutcome, Orchestrator, Phase};
pub use poller::{
    DELETED_STATUS, Observation, PollOutcome, PollSpec, ResourceStatusSource, StatusClass,
    StatusReader, StatusSource, poll,
};
pub use provider::{RemoteInvoker, SnapshotFetcher};
pub use remote::{Method, RemoteCall};
pub use request::{HandleExpr, HandleKind, MutationRequest, ReadyWait, Verification};
pub use snapshot::{FieldPath, FieldValue, ResourceSnapshot};
pub use verifier::verify_field;
pub use waiter::{CompletionWaiter, Vocabulary};
