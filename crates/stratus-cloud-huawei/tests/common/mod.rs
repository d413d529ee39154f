use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use stratus_cloud::{ApiError, RemoteCall, RemoteInvoker, ResourceSnapshot, SnapshotFetcher};

pub type Reply = Result<Value, ApiError>;

/// Replays scripted replies in order; the last one repeats forever
pub struct Script {
    replies: Mutex<Vec<Reply>>,
    calls: AtomicUsize,
}

impl Script {
    pub fn new(replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "script needs at least one reply");
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies[0].clone()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Records the rendered path of every call it answers
pub struct StubInvoker {
    script: Script,
    pub paths: Mutex<Vec<String>>,
}

impl StubInvoker {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Script::new(replies),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl RemoteInvoker for StubInvoker {
    async fn invoke(&self, call: &RemoteCall) -> Result<Value, ApiError> {
        if let Ok(path) = call.render_path(&[("project_id", "p-1")]) {
            self.paths.lock().unwrap().push(path);
        }
        self.script.next()
    }
}

pub struct StubFetcher {
    pub resources: Script,
    pub jobs: Script,
    pub orders: Script,
}

impl StubFetcher {
    pub fn new(resources: Vec<Reply>) -> Self {
        Self {
            resources: Script::new(resources),
            jobs: Script::new(vec![Err(not_found())]),
            orders: Script::new(vec![Err(not_found())]),
        }
    }

    #[allow(dead_code)]
    pub fn with_jobs(mut self, jobs: Vec<Reply>) -> Self {
        self.jobs = Script::new(jobs);
        self
    }

    #[allow(dead_code)]
    pub fn with_orders(mut self, orders: Vec<Reply>) -> Self {
        self.orders = Script::new(orders);
        self
    }
}

#[async_trait]
impl SnapshotFetcher for StubFetcher {
    async fn fetch_resource(&self, _id: &str) -> Result<ResourceSnapshot, ApiError> {
        self.resources.next().map(ResourceSnapshot::new)
    }

    async fn fetch_job(&self, _job_id: &str) -> Result<ResourceSnapshot, ApiError> {
        self.jobs.next().map(ResourceSnapshot::new)
    }

    async fn fetch_order(&self, _order_id: &str) -> Result<ResourceSnapshot, ApiError> {
        self.orders.next().map(ResourceSnapshot::new)
    }
}

pub fn not_found() -> ApiError {
    ApiError::http(404, r#"{"error_code":"Common.0404","error_msg":"not found"}"#)
}
