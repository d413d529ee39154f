//! Elastic Volume Service disk expansion

use super::{ChargingMode, FieldChange};
use crate::fetcher::ServiceLayout;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use stratus_cloud::{
    CloudError, HandleExpr, Method, MutationRequest, PollSpec, ReadyWait, RemoteCall, Result,
    Verification,
};
use stratus_config::JobSettings;

const KIND: &str = "evs volume";

/// EVS jobs report a top-level `status` and `fail_reason`
pub fn job_settings() -> JobSettings {
    JobSettings {
        status_path: "status".to_string(),
        pending: vec!["INIT".to_string(), "RUNNING".to_string()],
        target: vec!["SUCCESS".to_string()],
        failure: vec!["FAIL".to_string()],
        detail_path: Some("fail_reason".to_string()),
        ..JobSettings::default()
    }
}

pub fn layout() -> ServiceLayout {
    ServiceLayout::new("v2/{project_id}/cloudvolumes/{id}")
        .with_job_path("v1/{project_id}/jobs/{id}")
        .with_job_settings(job_settings())
}

/// Updatable attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvsVolume {
    pub size: i64,
    pub charging_mode: ChargingMode,
}

fn settled(timeout: Duration) -> Result<ReadyWait> {
    let spec = PollSpec::new(["available", "in-use"], timeout)
        .with_pending(["extending"])
        .with_error(["error", "error_extending"])
        .with_interval(Duration::from_secs(5));
    ReadyWait::on_field("volume.status", spec)?.with_id_path("volume.id")
}

/// Grow a volume. Prepaid volumes must report an order; a job is followed when present.
pub fn extend(
    volume_id: &str,
    size: i64,
    charging: ChargingMode,
    timeout: Duration,
) -> Result<MutationRequest> {
    let mut body = json!({"os-extend": {"new_size": size}});
    if charging.is_prepaid() {
        body["bssParam"] = json!({"isAutoPay": "true"});
    }
    let call = RemoteCall::new(Method::Post, "v2.1/{project_id}/cloudvolumes/{volume_id}/action")
        .with_param("volume_id", volume_id)
        .with_body(body);

    let mut request = MutationRequest::new("extend volume", volume_id, call, timeout)
        .with_kind(KIND)
        .with_ready(settled(timeout)?)
        .with_job(HandleExpr::optional("job_id")?)
        .with_verification(Verification::new("volume.size", size)?);
    // prepaid extensions are always billed through an order
    if charging.is_prepaid() {
        request = request.with_order(HandleExpr::required("order_id")?);
    }
    Ok(request)
}

pub fn plan(
    volume_id: &str,
    old: &EvsVolume,
    new: &EvsVolume,
    timeout: Duration,
) -> Result<Vec<MutationRequest>> {
    let Some(change) = FieldChange::detect("size", &old.size, &new.size) else {
        return Ok(Vec::new());
    };
    if change.new < change.old {
        return Err(CloudError::InvalidRequest(format!(
            "volume {} can only grow ({} -> {} GB)",
            volume_id, change.old, change.new
        )));
    }
    Ok(vec![extend(volume_id, change.new, new.charging_mode, timeout)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepaid_extend_body() {
        let request = extend("v-1", 200, ChargingMode::PrePaid, Duration::from_secs(600)).unwrap();
        assert_eq!(
            request.call.body,
            Some(json!({"os-extend": {"new_size": 200}, "bssParam": {"isAutoPay": "true"}}))
        );
        assert_eq!(
            request.call.render_path(&[("project_id", "p-1")]).unwrap(),
            "v2.1/p-1/cloudvolumes/v-1/action"
        );
    }

    #[test]
    fn test_postpaid_extend_body() {
        let request = extend("v-1", 200, ChargingMode::PostPaid, Duration::from_secs(600)).unwrap();
        assert_eq!(request.call.body, Some(json!({"os-extend": {"new_size": 200}})));
        assert!(!request.job.unwrap().required);
        assert!(request.order.is_none());
    }

    #[test]
    fn test_prepaid_extend_requires_order() {
        let request = extend("v-1", 200, ChargingMode::PrePaid, Duration::from_secs(600)).unwrap();
        assert!(request.order.unwrap().required);
        assert!(!request.job.unwrap().required);
    }

    #[test]
    fn test_plan() {
        let old = EvsVolume {
            size: 100,
            charging_mode: ChargingMode::PostPaid,
        };
        assert!(plan("v-1", &old, &old, Duration::from_secs(600)).unwrap().is_empty());

        let bigger = EvsVolume { size: 150, ..old.clone() };
        assert_eq!(plan("v-1", &old, &bigger, Duration::from_secs(600)).unwrap().len(), 1);

        let smaller = EvsVolume { size: 50, ..old.clone() };
        assert!(matches!(
            plan("v-1", &old, &smaller, Duration::from_secs(600)),
            Err(CloudError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_job_vocabulary() {
        let settings = job_settings();
        assert_eq!(settings.status_path, "status");
        assert_eq!(settings.detail_path.as_deref(), Some("fail_reason"));
    }
}
