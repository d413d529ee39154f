//! Huawei Cloud provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HuaweiError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    Cloud(#[from] stratus_cloud::CloudError),

    #[error("Settings error: {0}")]
    Settings(#[from] stratus_config::ConfigError),
}

pub type Result<T> = std::result::Result<T, HuaweiError>;
