//! GaussDB for MySQL instance updates
//!
//! Every mutation is retried while the instance is busy, then waits for the
//! instance to return to `ACTIVE`. Flavor and volume changes report a job
//! (postpaid) or an order (prepaid) and are verified against a fresh read.

use super::{ChargingMode, FieldChange, with_auto_pay};
use crate::fetcher::{NotFoundRule, ServiceLayout};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use stratus_cloud::{
    HandleExpr, Method, MutationRequest, PollSpec, ReadyWait, RemoteCall, Result, Verification,
};

const KIND: &str = "gaussdb mysql instance";
const ACTION_PATH: &str = "v3/{project_id}/instances/{instance_id}/action";

/// Read and job endpoints of the GaussDB for MySQL service
pub fn layout() -> ServiceLayout {
    ServiceLayout::new("v3/{project_id}/instances/{id}")
        .with_job_path("v3/{project_id}/jobs?id={id}")
        .with_not_found(NotFoundRule::new(400, "error_code", ["DBS.200939", "DBS.201028"]))
}

/// Updatable attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MysqlInstance {
    pub name: String,
    /// Write-only; `None` when unchanged or unknown
    pub password: Option<String>,
    pub flavor: String,
    pub volume_size: i64,
    pub charging_mode: ChargingMode,
}

fn active(timeout: Duration) -> Result<ReadyWait> {
    let spec = PollSpec::new(["ACTIVE"], timeout)
        .with_pending(["BUILD", "BACKING UP", "RESTORING", "MODIFYING"])
        .with_error(["FAILED"])
        .with_initial_delay(Duration::from_secs(10))
        .with_interval(Duration::from_secs(10));
    ReadyWait::on_field("instance.status", spec)?.with_id_path("instance.id")
}

fn call(method: Method, path: &str, instance_id: &str, body: serde_json::Value) -> RemoteCall {
    RemoteCall::new(method, path)
        .with_param("instance_id", instance_id)
        .with_body(body)
}

pub fn rename(instance_id: &str, name: &str, timeout: Duration) -> Result<MutationRequest> {
    let call = call(
        Method::Put,
        "v3/{project_id}/instances/{instance_id}/name",
        instance_id,
        json!({"name": name}),
    );
    Ok(MutationRequest::new("rename", instance_id, call, timeout)
        .with_kind(KIND)
        .with_ready(active(timeout)?)
        .with_job(HandleExpr::required("job_id")?)
        .with_verification(Verification::new("instance.name", name)?))
}

/// The new password cannot be read back, so nothing is verified.
pub fn reset_password(
    instance_id: &str,
    password: &str,
    timeout: Duration,
) -> Result<MutationRequest> {
    let call = call(
        Method::Post,
        "v3/{project_id}/instances/{instance_id}/password",
        instance_id,
        json!({"password": password}),
    );
    Ok(MutationRequest::new("reset password", instance_id, call, timeout)
        .with_kind(KIND)
        .with_ready(active(timeout)?))
}

pub fn resize_flavor(
    instance_id: &str,
    flavor: &str,
    charging: ChargingMode,
    timeout: Duration,
) -> Result<MutationRequest> {
    let body = with_auto_pay(
        json!({"resize_flavor": {"spec_code": flavor}}),
        charging,
        "is_auto_pay",
    );
    let call = call(Method::Post, ACTION_PATH, instance_id, body);
    Ok(MutationRequest::new("resize flavor", instance_id, call, timeout)
        .with_kind(KIND)
        .with_ready(active(timeout)?)
        .with_job(HandleExpr::optional("job_id")?)
        .with_order(HandleExpr::optional("order_id")?)
        .with_verification(Verification::new("instance.nodes[0].flavor_ref", flavor)?))
}

pub fn extend_volume(
    instance_id: &str,
    size: i64,
    charging: ChargingMode,
    timeout: Duration,
) -> Result<MutationRequest> {
    let call = call(
        Method::Post,
        "v3/{project_id}/instances/{instance_id}/volume/extend",
        instance_id,
        with_auto_pay(json!({"size": size}), charging, "is_auto_pay"),
    );
    Ok(MutationRequest::new("extend volume", instance_id, call, timeout)
        .with_kind(KIND)
        .with_ready(active(timeout)?)
        .with_job(HandleExpr::optional("job_id")?)
        .with_order(HandleExpr::optional("order_id")?)
        .with_verification(Verification::new("instance.nodes[0].volume.size", size)?))
}

/// Requests for every changed attribute, in the order the service accepts them
pub fn plan(
    instance_id: &str,
    old: &MysqlInstance,
    new: &MysqlInstance,
    timeout: Duration,
) -> Result<Vec<MutationRequest>> {
    let mut requests = Vec::new();

    if let Some(change) = FieldChange::detect("name", &old.name, &new.name) {
        requests.push(rename(instance_id, &change.new, timeout)?);
    }
    if let Some(FieldChange { new: Some(password), .. }) =
        FieldChange::detect("password", &old.password, &new.password)
    {
        requests.push(reset_password(instance_id, &password, timeout)?);
    }
    if let Some(change) = FieldChange::detect("flavor", &old.flavor, &new.flavor) {
        requests.push(resize_flavor(instance_id, &change.new, new.charging_mode, timeout)?);
    }
    if let Some(change) = FieldChange::detect("volume_size", &old.volume_size, &new.volume_size) {
        if change.new < change.old {
            return Err(stratus_cloud::CloudError::InvalidRequest(format!(
                "volume of {} can only grow ({} -> {})",
                instance_id, change.old, change.new
            )));
        }
        requests.push(extend_volume(instance_id, change.new, new.charging_mode, timeout)?);
    }

    Ok(requests)
}
