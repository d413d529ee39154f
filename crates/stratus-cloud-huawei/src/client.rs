//! Huawei Cloud service client
//!
//! Token-authenticated JSON client for one service endpoint. Implements
//! [`RemoteInvoker`] so the orchestrator can issue mutations through it.

use crate::error::{HuaweiError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use stratus_cloud::{ApiError, Method, RemoteCall, RemoteInvoker};

pub const ENDPOINT_ENV: &str = "HW_ENDPOINT";
pub const PROJECT_ID_ENV: &str = "HW_PROJECT_ID";
pub const AUTH_TOKEN_ENV: &str = "HW_AUTH_TOKEN";
pub const BSS_ENDPOINT_ENV: &str = "HW_BSS_ENDPOINT";

/// Billing (BSS) endpoint used when `HW_BSS_ENDPOINT` is unset
pub const DEFAULT_BSS_ENDPOINT: &str = "https://bss.myhuaweicloud.com";

const AUTH_HEADER: &str = "X-Auth-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials and endpoints
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service endpoint, e.g. `https://gaussdb.cn-north-4.myhuaweicloud.com`
    pub endpoint: String,
    pub project_id: String,
    pub auth_token: String,
    pub bss_endpoint: String,
}

impl ClientConfig {
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            auth_token: auth_token.into(),
            bss_endpoint: DEFAULT_BSS_ENDPOINT.to_string(),
        }
    }

    /// Create ClientConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let require = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| HuaweiError::MissingEnvVar(name.to_string()))
        };

        let mut config = Self::new(
            require(ENDPOINT_ENV)?,
            require(PROJECT_ID_ENV)?,
            require(AUTH_TOKEN_ENV)?,
        );
        if let Ok(bss) = std::env::var(BSS_ENDPOINT_ENV) {
            if !bss.trim().is_empty() {
                config.bss_endpoint = bss;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_bss_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.bss_endpoint = endpoint.into();
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, url) in [
            (ENDPOINT_ENV, &self.endpoint),
            (BSS_ENDPOINT_ENV, &self.bss_endpoint),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(HuaweiError::InvalidConfig(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        Ok(())
    }
}

/// Client bound to one endpoint
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    auth_token: String,
}

impl ServiceClient {
    /// Client for the configured service endpoint
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::for_endpoint(config, &config.endpoint)
    }

    /// Client for the billing endpoint (order lookups)
    pub fn bss(config: &ClientConfig) -> Result<Self> {
        Self::for_endpoint(config, &config.bss_endpoint)
    }

    fn for_endpoint(config: &ClientConfig, endpoint: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Absolute URL of `call`, with `{project_id}` filled in
    pub fn url_for(&self, call: &RemoteCall) -> stratus_cloud::Result<String> {
        let path = call.render_path(&[("project_id", self.project_id.as_str())])?;
        Ok(format!("{}/{}", self.endpoint, path.trim_start_matches('/')))
    }

    /// GET a templated read path
    pub async fn get(&self, path_template: &str, id: &str) -> std::result::Result<Value, ApiError> {
        let call = RemoteCall::new(Method::Get, path_template).with_param("id", id);
        self.invoke(&call).await
    }
}

#[async_trait]
impl RemoteInvoker for ServiceClient {
    async fn invoke(&self, call: &RemoteCall) -> std::result::Result<Value, ApiError> {
        let url = self
            .url_for(call)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let method = match call.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self
            .http
            .request(method, &url)
            .header(AUTH_HEADER, &self.auth_token);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        tracing::debug!(method = %call.method, url = %url, "Sending request");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), url = %url, "Request rejected");
            return Err(ApiError::http(status.as_u16(), text));
        }
        parse_body(&text)
    }
}

fn parse_body(text: &str) -> std::result::Result<Value, ApiError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| ApiError::Transport(format!("invalid JSON in response: {}", e)))
}
