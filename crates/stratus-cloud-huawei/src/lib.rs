//! Huawei Cloud collaborators for the Stratus orchestrator
//!
//! Provides the HTTP [`RemoteInvoker`](stratus_cloud::RemoteInvoker), a
//! layout-driven [`SnapshotFetcher`](stratus_cloud::SnapshotFetcher), the
//! per-service transient code tables and the mutation builders used by the
//! GaussDB for MySQL, GeminiDB and EVS update routines.
//!
//! ```no_run
//! use stratus_cloud::Deadline;
//! use stratus_cloud_huawei::{ClientConfig, codes, connect, resources::evs};
//! use std::time::Duration;
//!
//! # async fn run() -> stratus_cloud_huawei::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let orchestrator = connect(&config, evs::layout(), codes::evs(), &Default::default())?;
//! let request = evs::extend("vol-1", 200, Default::default(), Duration::from_secs(600))?;
//! orchestrator.run(&request, &Deadline::after(Duration::from_secs(900))).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codes;
pub mod error;
pub mod fetcher;
pub mod resources;

pub use client::{ClientConfig, ServiceClient};
pub use error::{HuaweiError, Result};
pub use fetcher::{HuaweiFetcher, NotFoundRule, ServiceLayout};

use std::sync::Arc;
use stratus_cloud::{Orchestrator, RetryPolicy};
use stratus_config::Settings;

/// Orchestrator for one service, with its job vocabulary applied to `settings`
pub fn connect(
    config: &ClientConfig,
    layout: ServiceLayout,
    policy: RetryPolicy,
    settings: &Settings,
) -> Result<Orchestrator> {
    let service = Arc::new(ServiceClient::new(config)?);
    let bss = Arc::new(ServiceClient::bss(config)?);
    let settings = layout.settings(settings);
    let fetcher = Arc::new(HuaweiFetcher::new(service.clone(), bss, layout));

    tracing::debug!(
        endpoint = %service.endpoint(),
        service = %policy.service(),
        "Connecting orchestrator"
    );
    Ok(Orchestrator::from_settings(&settings, service, fetcher, policy)?)
}
