//! GeminiDB (GaussDB for Cassandra) instance updates
//!
//! GeminiDB reports progress through the instance's `actions` list rather
//! than its status: an instance is settled once the action a change started
//! (`RESIZE_FLAVOR`, `RESIZE_VOLUME`, `GROWING`, `REDUCING`) is gone.

use super::{ChargingMode, FieldChange, with_auto_pay};
use crate::fetcher::ServiceLayout;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use stratus_cloud::{
    CloudError, FieldPath, HandleExpr, Method, MutationRequest, PollSpec, ReadyWait, RemoteCall,
    Result, StatusReader, Verification,
};

const KIND: &str = "geminidb instance";
const IDLE: &str = "available";

/// The service rejects node reductions of more than this many nodes at once
pub const MAX_NODES_PER_REDUCTION: u32 = 10;

/// GeminiDB only exposes instances through a filtered list
pub fn layout() -> Result<ServiceLayout> {
    Ok(ServiceLayout::new("v3/{project_id}/instances?id={id}")
        .with_resource_root(FieldPath::parse("instances[0]")?))
}

/// Updatable attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeminiInstance {
    pub flavor: String,
    pub volume_size: i64,
    pub node_num: u32,
    pub charging_mode: ChargingMode,
}

/// Wait until none of `actions` is listed on the instance
fn settled(
    actions: &[&str],
    timeout: Duration,
    initial_delay: Duration,
    interval: Duration,
) -> Result<ReadyWait> {
    let reader = StatusReader::PendingAction {
        actions_path: FieldPath::parse("actions")?,
        actions: actions.iter().map(|a| a.to_string()).collect(),
        idle_status: IDLE.to_string(),
    };
    let spec = PollSpec::new([IDLE], timeout)
        .with_pending(actions.iter().copied())
        .with_initial_delay(initial_delay)
        .with_interval(interval);
    ReadyWait::new(reader, spec).with_id_path("id")
}

fn call(path: &str, method: Method, instance_id: &str, body: serde_json::Value) -> RemoteCall {
    RemoteCall::new(method, path)
        .with_param("instance_id", instance_id)
        .with_body(body)
}

/// Resize every node; waits first if a resize is already running.
pub fn resize_flavor(
    instance_id: &str,
    flavor: &str,
    charging: ChargingMode,
    timeout: Duration,
) -> Result<MutationRequest> {
    let body = with_auto_pay(
        json!({"resize": {"instance_id": instance_id, "spec_code": flavor}}),
        charging,
        "is_auto_pay",
    );
    let wait = settled(&["RESIZE_FLAVOR"], timeout, Duration::ZERO, Duration::from_secs(20))?;

    Ok(MutationRequest::new(
        "resize flavor",
        instance_id,
        call("v3/{project_id}/instances/{instance_id}/resize", Method::Put, instance_id, body),
        timeout,
    )
    .with_kind(KIND)
    .with_ready_before(wait.clone())
    .with_ready(wait)
    .with_order(HandleExpr::optional("order_id")?)
    .with_verification(Verification::new("groups[*].nodes[*].spec_code", flavor)?))
}

pub fn extend_volume(
    instance_id: &str,
    size: i64,
    charging: ChargingMode,
    timeout: Duration,
) -> Result<MutationRequest> {
    let body = with_auto_pay(json!({"size": size}), charging, "is_auto_pay");
    Ok(MutationRequest::new(
        "extend volume",
        instance_id,
        call(
            "v3/{project_id}/instances/{instance_id}/extend-volume",
            Method::Post,
            instance_id,
            body,
        ),
        timeout,
    )
    .with_kind(KIND)
    .with_ready(settled(&["RESIZE_VOLUME"], timeout, Duration::ZERO, Duration::from_secs(10))?)
    .with_order(HandleExpr::optional("order_id")?)
    .with_verification(Verification::new("groups[0].volume.size", size)?))
}

/// One request to grow, or one per batch of [`MAX_NODES_PER_REDUCTION`] to shrink
pub fn change_node_count(
    instance_id: &str,
    old: u32,
    new: u32,
    charging: ChargingMode,
    timeout: Duration,
) -> Result<Vec<MutationRequest>> {
    if new == 0 {
        return Err(CloudError::InvalidRequest(format!(
            "{} needs at least one node",
            instance_id
        )));
    }

    if new > old {
        let body = with_auto_pay(json!({"num": new - old}), charging, "is_auto_pay");
        let request = MutationRequest::new(
            "enlarge nodes",
            instance_id,
            call(
                "v3/{project_id}/instances/{instance_id}/enlarge-node",
                Method::Post,
                instance_id,
                body,
            ),
            timeout,
        )
        .with_kind(KIND)
        .with_ready(settled(
            &["GROWING"],
            timeout,
            Duration::from_secs(15),
            Duration::from_secs(20),
        )?)
        .with_order(HandleExpr::optional("order_id")?);
        return Ok(vec![request]);
    }

    let mut remaining = old.saturating_sub(new);
    let mut requests = Vec::new();
    while remaining > 0 {
        let batch = remaining.min(MAX_NODES_PER_REDUCTION);
        remaining -= batch;
        let request = MutationRequest::new(
            "reduce nodes",
            instance_id,
            call(
                "v3/{project_id}/instances/{instance_id}/reduce-node",
                Method::Post,
                instance_id,
                json!({"num": batch}),
            ),
            timeout,
        )
        .with_kind(KIND)
        .with_ready(settled(
            &["REDUCING", "PERIOD_RESOURCE_DELETE"],
            timeout,
            Duration::from_secs(15),
            Duration::from_secs(20),
        )?)
        .with_order(HandleExpr::optional("order_id")?);
        requests.push(request);
    }
    Ok(requests)
}

/// Requests for every changed attribute: volume, then nodes, then flavor
pub fn plan(
    instance_id: &str,
    old: &GeminiInstance,
    new: &GeminiInstance,
    timeout: Duration,
) -> Result<Vec<MutationRequest>> {
    let mut requests = Vec::new();

    if let Some(change) = FieldChange::detect("volume_size", &old.volume_size, &new.volume_size) {
        if change.new < change.old {
            return Err(CloudError::InvalidRequest(format!(
                "volume of {} can only grow ({} -> {})",
                instance_id, change.old, change.new
            )));
        }
        requests.push(extend_volume(instance_id, change.new, new.charging_mode, timeout)?);
    }
    if let Some(change) = FieldChange::detect("node_num", &old.node_num, &new.node_num) {
        requests.extend(change_node_count(
            instance_id,
            change.old,
            change.new,
            new.charging_mode,
            timeout,
        )?);
    }
    if let Some(change) = FieldChange::detect("flavor", &old.flavor, &new.flavor) {
        requests.push(resize_flavor(instance_id, &change.new, new.charging_mode, timeout)?);
    }

    Ok(requests)
}
