//! Post-mutation verification
//!
//! A completed job or order is necessary but not sufficient: the mutated field
//! is read back and compared before the change is reported as applied.

use crate::error::{CloudError, Result};
use crate::provider::SnapshotFetcher;
use crate::request::Verification;
use crate::snapshot::ResourceSnapshot;
use serde_json::Value;

/// Fetch `resource_id` fresh and check `verification` against it.
///
/// `evidence` names what claimed success (e.g. `job j-1`) and is quoted in the
/// mismatch error. A projection path must yield at least one element and every
/// element must match.
pub async fn verify_field(
    fetcher: &dyn SnapshotFetcher,
    resource_id: &str,
    verification: &Verification,
    evidence: &str,
) -> Result<ResourceSnapshot> {
    let snapshot = match fetcher.fetch_resource(resource_id).await {
        Ok(snapshot) => snapshot,
        Err(e) if e.is_not_found() => {
            return Err(CloudError::UnexpectedDeletion {
                target: resource_id.to_string(),
            });
        }
        Err(source) => {
            return Err(CloudError::Fetch {
                target: resource_id.to_string(),
                source,
            });
        }
    };

    let observed = snapshot.extract(&verification.field);
    let converged = match &observed {
        None => false,
        Some(value) if verification.field.is_projection() => {
            let mut elements = Vec::new();
            flatten(value, &mut elements);
            !elements.is_empty() && elements.iter().all(|v| verification.expected.matches(v))
        }
        Some(value) => verification.expected.matches(value),
    };

    if !converged {
        let observed = observed.map_or_else(|| "<absent>".to_string(), |v| v.to_string());
        tracing::error!(
            resource = resource_id,
            field = %verification.field,
            expected = %verification.expected,
            observed = %observed,
            evidence,
            "Field did not converge"
        );
        return Err(CloudError::VerificationMismatch {
            resource: resource_id.to_string(),
            field: verification.field.to_string(),
            expected: verification.expected.to_string(),
            observed,
            evidence: evidence.to_string(),
        });
    }

    tracing::debug!(resource = resource_id, field = %verification.field, "Verified");
    Ok(snapshot)
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        other => out.push(other),
    }
}
