//! Description of one remote API call

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP method of a remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One remote operation: method, templated path and optional JSON body
///
/// `path_template` uses `{name}` placeholders, e.g.
/// `v3/{project_id}/instances/{instance_id}/action`. Placeholders that the
/// invoker owns (such as `{project_id}`) may be left for it to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCall {
    pub method: Method,
    pub path_template: String,
    pub path_params: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RemoteCall {
    pub fn new(method: Method, path_template: impl Into<String>) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            path_params: BTreeMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Substitute `path_params` plus `extra` into the template.
    ///
    /// Every placeholder must be resolved; a leftover `{...}` is an error.
    pub fn render_path(&self, extra: &[(&str, &str)]) -> Result<String> {
        let mut path = self.path_template.clone();
        for (name, value) in &self.path_params {
            path = path.replace(&format!("{{{}}}", name), value);
        }
        for (name, value) in extra {
            path = path.replace(&format!("{{{}}}", name), value);
        }

        if let Some(start) = path.find('{') {
            let end = path[start..]
                .find('}')
                .map(|offset| start + offset + 1)
                .unwrap_or(path.len());
            return Err(CloudError::InvalidRequest(format!(
                "unresolved placeholder {} in path '{}'",
                &path[start..end],
                self.path_template
            )));
        }
        Ok(path)
    }
}

impl std::fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path_template)
    }
}
