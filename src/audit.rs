//! Audit-trail retrieval for backed-up configs.
//!
//! Intune records configuration changes in `deviceManagement/auditEvents`.
//! When a backup runs with `--audit`, each saved config gets a sidecar
//! record (`<name>.audit.<ext>`) answering "who last touched this and
//! when" without another trip to the portal. The merge step is simple
//! list stitching: of all events that reference the resource, keep the
//! most recent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::client::GraphClient;
use crate::error::Result;
use crate::output::OutputFormat;

/// The merged audit record saved next to a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Graph ID of the audited resource.
    pub resource_id: String,
    /// Who made the change: user principal name when a person did it,
    /// application display name when automation did.
    pub actor: Option<String>,
    /// ISO 8601 timestamp of the change.
    pub activity_date_time: Option<String>,
    /// Operation type (`Create`, `Patch`, `Delete`, ...).
    pub activity_operation_type: Option<String>,
    /// Operation result (`Success`, `Failure`, ...).
    pub activity_result: Option<String>,
}

/// Fetches all audit events that reference `resource_id`.
///
/// The `$filter` uses the `resources/any(...)` lambda because one audit
/// event can touch several resources. Spaces are pre-encoded — the filter
/// is interpolated into the request path verbatim.
pub async fn fetch_audit_events(client: &GraphClient, resource_id: &str) -> Result<Vec<Value>> {
    let path = format!(
        "deviceManagement/auditEvents?$filter=resources/any(s:s/resourceId%20eq%20'{resource_id}')"
    );
    let response: Value = client.get(&path).await?;
    Ok(response
        .get("value")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Reduces an event list to the most recent event's record.
///
/// Events are compared by their `activityDateTime` string — ISO 8601
/// timestamps sort correctly lexicographically. Returns `None` for an
/// empty list (the resource has no audit history in the retention
/// window).
pub fn merge_audit_record(resource_id: &str, events: &[Value]) -> Option<AuditRecord> {
    let latest = events.iter().max_by_key(|event| {
        event
            .get("activityDateTime")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    })?;

    let str_field = |key: &str| {
        latest
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    // A person shows up as userPrincipalName, an app registration as
    // applicationDisplayName; Graph fills whichever applies.
    let actor = latest.get("actor").and_then(|actor| {
        actor
            .get("userPrincipalName")
            .or_else(|| actor.get("applicationDisplayName"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Some(AuditRecord {
        resource_id: resource_id.to_string(),
        actor,
        activity_date_time: str_field("activityDateTime"),
        activity_operation_type: str_field("activityOperationType"),
        activity_result: str_field("activityResult"),
    })
}

/// Writes the audit record as a sidecar next to its config file:
/// `<dir>/<stem>.audit.<ext>`. Returns the sidecar path.
pub fn save_audit_record(
    record: &AuditRecord,
    config_file: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    let stem = config_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audit");
    let dir = config_file.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(format!("{stem}.audit.{}", format.extension()));

    let value = serde_json::to_value(record)?;
    std::fs::write(&path, format.to_string(&value)?)?;
    Ok(path)
}
