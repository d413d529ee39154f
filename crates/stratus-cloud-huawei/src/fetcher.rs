//! Read-side collaborator: resource, job and order lookups
//!
//! Services differ in where they expose a resource (single-item GET vs. a
//! filtered list), how they report a deleted resource, and what their job
//! records look like. A [`ServiceLayout`] captures those differences.

use crate::client::ServiceClient;
use async_trait::async_trait;
use std::sync::Arc;
use stratus_cloud::{ApiError, FieldPath, ResourceSnapshot, SnapshotFetcher};
use stratus_config::{JobSettings, Settings};

/// BSS order detail lookup
pub const ORDER_PATH: &str = "v2/orders/customer-orders/details/{id}";

/// A documented "resource is gone" error that is not a 404
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundRule {
    pub status: u16,
    /// Body key holding the code (`error_code` or `errCode`)
    pub key: String,
    pub codes: Vec<String>,
}

impl NotFoundRule {
    pub fn new<I, S>(status: u16, key: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status,
            key: key.to_string(),
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    fn apply(&self, err: ApiError) -> ApiError {
        let codes: Vec<&str> = self.codes.iter().map(String::as_str).collect();
        err.convert_expected(self.status, &self.key, &codes)
    }
}

/// Where one service exposes its resources and jobs
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLayout {
    /// Read path with an `{id}` placeholder
    pub resource_path: String,
    /// For list endpoints: where the single record sits, e.g. `instances[0]`
    pub resource_root: Option<FieldPath>,
    /// Job lookup path with an `{id}` placeholder; `None` when the service has no job API
    pub job_path: Option<String>,
    /// Overrides the default job vocabulary for this service
    pub job_settings: Option<JobSettings>,
    pub not_found: Vec<NotFoundRule>,
}

impl ServiceLayout {
    pub fn new(resource_path: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            resource_root: None,
            job_path: None,
            job_settings: None,
            not_found: Vec::new(),
        }
    }

    pub fn with_resource_root(mut self, root: FieldPath) -> Self {
        self.resource_root = Some(root);
        self
    }

    pub fn with_job_path(mut self, path: impl Into<String>) -> Self {
        self.job_path = Some(path.into());
        self
    }

    pub fn with_job_settings(mut self, settings: JobSettings) -> Self {
        self.job_settings = Some(settings);
        self
    }

    pub fn with_not_found(mut self, rule: NotFoundRule) -> Self {
        self.not_found.push(rule);
        self
    }

    /// `base` with this service's job vocabulary applied
    pub fn settings(&self, base: &Settings) -> Settings {
        let mut settings = base.clone();
        if let Some(job) = &self.job_settings {
            settings.job = job.clone();
        }
        settings
    }

    fn convert_not_found(&self, err: ApiError) -> ApiError {
        self.not_found.iter().fold(err, |err, rule| rule.apply(err))
    }
}

/// [`SnapshotFetcher`] over a service client and the billing client
pub struct HuaweiFetcher {
    service: Arc<ServiceClient>,
    bss: Arc<ServiceClient>,
    layout: ServiceLayout,
}

impl HuaweiFetcher {
    pub fn new(
        service: Arc<ServiceClient>,
        bss: Arc<ServiceClient>,
        layout: ServiceLayout,
    ) -> Self {
        Self {
            service,
            bss,
            layout,
        }
    }

    pub fn layout(&self) -> &ServiceLayout {
        &self.layout
    }
}

#[async_trait]
impl SnapshotFetcher for HuaweiFetcher {
    async fn fetch_resource(&self, id: &str) -> Result<ResourceSnapshot, ApiError> {
        let document = self
            .service
            .get(&self.layout.resource_path, id)
            .await
            .map_err(|e| self.layout.convert_not_found(e))?;
        select_record(document, self.layout.resource_root.as_ref(), id)
    }

    async fn fetch_job(&self, job_id: &str) -> Result<ResourceSnapshot, ApiError> {
        let Some(path) = &self.layout.job_path else {
            return Err(ApiError::Transport(format!(
                "service at {} has no job API to look up job {}",
                self.service.endpoint(),
                job_id
            )));
        };
        self.service.get(path, job_id).await.map(ResourceSnapshot::new)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<ResourceSnapshot, ApiError> {
        self.bss.get(ORDER_PATH, order_id).await.map(ResourceSnapshot::new)
    }
}

/// Narrow a list response to its single record; an empty list is not-found.
fn select_record(
    document: serde_json::Value,
    root: Option<&FieldPath>,
    id: &str,
) -> Result<ResourceSnapshot, ApiError> {
    let snapshot = ResourceSnapshot::new(document);
    let Some(root) = root else {
        return Ok(snapshot);
    };
    match snapshot.extract(root) {
        Some(record) if !record.is_null() => Ok(ResourceSnapshot::new(record)),
        _ => Err(ApiError::http(
            404,
            format!(r#"{{"error_msg":"{} is not in the list response"}}"#, id),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use serde_json::json;

    #[test]
    fn test_not_found_rules() {
        let layout = ServiceLayout::new("v3/{project_id}/instances/{id}")
            .with_not_found(NotFoundRule::new(400, "error_code", ["DBS.200939", "DBS.201028"]))
            .with_not_found(NotFoundRule::new(403, "errCode", ["CSS.0015"]));

        let gone = ApiError::http(400, r#"{"error_code":"DBS.201028"}"#);
        assert!(layout.convert_not_found(gone).is_not_found());

        let css = ApiError::http(403, r#"{"errCode":"CSS.0015"}"#);
        assert!(layout.convert_not_found(css).is_not_found());

        let busy = ApiError::http(400, r#"{"error_code":"DBS.200019"}"#);
        assert_eq!(layout.convert_not_found(busy.clone()), busy);
    }

    #[test]
    fn test_select_record_from_list() {
        let root = FieldPath::parse("instances[0]").unwrap();

        let found =
            select_record(json!({"instances": [{"id": "i-1"}]}), Some(&root), "i-1").unwrap();
        assert_eq!(found.document()["id"], "i-1");

        let missing = select_record(json!({"instances": []}), Some(&root), "i-1").unwrap_err();
        assert!(missing.is_not_found());

        let whole = select_record(json!({"instance": {"id": "i-1"}}), None, "i-1").unwrap();
        assert_eq!(whole.document()["instance"]["id"], "i-1");
    }

    #[test]
    fn test_fetch_job_without_job_api() {
        let config = ClientConfig::new("https://geminidb.example.com", "p-1", "token");
        let client = Arc::new(ServiceClient::new(&config).unwrap());
        let layout = ServiceLayout::new("v3/{project_id}/instances?id={id}");
        let fetcher = HuaweiFetcher::new(client.clone(), client, layout);

        let err = tokio_test::block_on(fetcher.fetch_job("j-1")).unwrap_err();
        assert!(matches!(err, ApiError::Transport(msg) if msg.contains("no job API")));
    }

    #[test]
    fn test_job_settings_override() {
        let evs_jobs = JobSettings {
            status_path: "status".to_string(),
            target: vec!["SUCCESS".to_string()],
            ..JobSettings::default()
        };
        let layout =
            ServiceLayout::new("v2/{project_id}/cloudvolumes/{id}").with_job_settings(evs_jobs);

        let settings = layout.settings(&Settings::default());
        assert_eq!(settings.job.status_path, "status");
        assert_eq!(settings.order, Settings::default().order);
    }
}
