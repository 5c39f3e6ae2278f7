//! Object filtering and key stripping applied before configs are saved.
//!
//! Graph responses carry tenant-specific and read-only metadata (object
//! IDs, timestamps, rollout counters) that would make a backup
//! non-portable: restoring it into another tenant, or even the same tenant
//! later, must not replay stale server-managed state. [`remove_keys`]
//! strips that metadata; [`check_prefix_match`] implements the optional
//! display-name prefix filter used to scope a backup run.

use serde_json::Value;

/// Read-only and tenant-specific keys stripped from every config before
/// it is written to disk. These are all server-managed: Graph either
/// rejects them on create or silently regenerates them.
const STRIP_KEYS: &[&str] = &[
    "id",
    "version",
    "createdDateTime",
    "lastModifiedDateTime",
    "modifiedDateTime",
    "lastModifiedTime",
    "sourceId",
    "supportsScopeTags",
    "isAssigned",
    "isDefault",
    "isGlobalScript",
    "highestAvailableVersion",
    "deployedAppCount",
    "secretReferenceValueId",
    "isEncrypted",
    "topicIdentifier",
    "certificate",
    "token",
];

/// Strips the standard read-only/metadata key set from a config object.
///
/// Removes every key in the strip set plus any `...@odata.context`-style
/// annotation key. Nested objects under `assignments` are cleaned of the
/// same annotation keys; their substantive content (targets, intent) is
/// preserved. Non-object values pass through unchanged.
pub fn remove_keys(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        for key in STRIP_KEYS {
            map.remove(*key);
        }
        map.retain(|k, _| !k.contains("@odata.context"));

        if let Some(assignments) = map.get_mut("assignments").and_then(Value::as_array_mut) {
            for assignment in assignments {
                if let Some(amap) = assignment.as_object_mut() {
                    amap.retain(|k, _| !k.contains("@odata.context"));
                }
            }
        }
    }
    value
}

/// Returns `true` when `name` matches the configured backup prefix.
///
/// An empty or whitespace-only prefix matches everything, so callers can
/// pass the CLI value through without special-casing "no prefix given".
pub fn check_prefix_match(name: &str, prefix: &str) -> bool {
    let prefix = prefix.trim();
    prefix.is_empty() || name.starts_with(prefix)
}
