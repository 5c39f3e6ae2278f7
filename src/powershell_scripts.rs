//! Backup and restore of Intune PowerShell scripts.
//!
//! This module covers the `deviceManagement/deviceManagementScripts`
//! resource family. Backup follows the shared pipeline:
//!
//! 1. **GET** the list endpoint for IDs and display names.
//! 2. Batch-fetch per-script details (the list response omits
//!    `scriptContent`) and, unless excluded, `/assignments` metadata.
//! 3. Apply the prefix filter, stitch assignments in, strip read-only keys.
//! 4. Save each script to `Scripts/Powershell/` and decode its
//!    `scriptContent` into `Script Data/<fileName>.ps1`.
//! 5. With `--audit`, save a `<name>.audit.<ext>` sidecar.
//!
//! Restore reads the saved configs back, re-attaches the script payload
//! (preferring the `.ps1` file on disk, which may have been edited, over
//! the embedded copy), POSTs to create the script, and re-creates
//! assignments via the `assign` action.

use serde_json::{json, Value};
use std::path::Path;

use crate::audit::{fetch_audit_events, merge_audit_record, save_audit_record};
use crate::backup::{
    config_file_name, read_script_payload, script_file_name, write_script_payload, BackupOptions,
    BackupResult,
};
use crate::batch::{batch_assignment, batch_request, get_object_assignment};
use crate::client::GraphClient;
use crate::error::{GraphError, Result};
use crate::output::{list_config_files, load_config, save_output};
use crate::transform::{check_prefix_match, remove_keys};

/// Resource path of the PowerShell script family, relative to the Graph
/// version root. Trailing slash so object IDs append directly.
const RESOURCE: &str = "deviceManagement/deviceManagementScripts/";

/// Folder under the backup root where this family is saved.
pub const BACKUP_FOLDER: &str = "Scripts/Powershell";

/// Backs up all PowerShell scripts in the tenant.
///
/// Returns the number of configs saved and their file names. An empty
/// tenant (no scripts) produces an empty result and creates no folders.
///
/// # Errors
///
/// - `GraphError::Api` — the Graph API returned a non-success status.
/// - `GraphError::ScriptDecode` — a `scriptContent` payload was not valid
///   base64/UTF-8.
/// - `GraphError::Io` — the backup directory could not be written.
pub async fn backup_powershell_scripts(
    client: &GraphClient,
    opts: &BackupOptions,
) -> Result<BackupResult> {
    let mut result = BackupResult::default();
    let family_dir = opts.path.join(BACKUP_FOLDER);

    let listing: Value = client.get("deviceManagement/deviceManagementScripts").await?;
    let ids = collect_ids(&listing);
    if ids.is_empty() {
        return Ok(result);
    }

    let assignment_responses = if opts.exclude_assignments {
        Vec::new()
    } else {
        batch_assignment(client, &ids, RESOURCE).await?
    };
    // The list response omits scriptContent, so details come from a
    // second batch fetch per object.
    let details = batch_request(client, &ids, RESOURCE, "").await?;

    for mut script in details {
        let Some(display_name) = script.get("displayName").and_then(Value::as_str) else {
            continue;
        };
        if !check_prefix_match(display_name, opts.prefix()) {
            continue;
        }
        let display_name = display_name.to_string();
        let graph_id = script
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !opts.exclude_assignments {
            let assignments = get_object_assignment(&graph_id, &assignment_responses);
            if !assignments.is_empty() {
                script["assignments"] = Value::Array(assignments);
            }
        }

        let script = remove_keys(script);
        println!("Backing up Powershell script: {display_name}");

        let fname = config_file_name(&display_name, &graph_id, opts.append_id);
        let config_path = save_output(opts.format, &family_dir, &fname, &script)?;
        result.push(fname.clone());

        if opts.audit && !graph_id.is_empty() {
            let events = fetch_audit_events(client, &graph_id).await?;
            if let Some(record) = merge_audit_record(&graph_id, &events) {
                save_audit_record(&record, &config_path, opts.format)?;
            }
        }

        if let Some(encoded) = script.get("scriptContent").and_then(Value::as_str) {
            let file_name = script
                .get("fileName")
                .and_then(Value::as_str)
                .map(|f| script_file_name(f, &graph_id, opts.append_id))
                .unwrap_or_else(|| format!("{fname}.ps1"));
            write_script_payload(&family_dir, &file_name, encoded, &display_name)?;
        }
    }

    Ok(result)
}

/// Restores PowerShell scripts from a backup directory.
///
/// For each config file under `Scripts/Powershell/`: re-attach the script
/// payload, POST to create the script, then re-create assignments via the
/// `assign` action when the backup contains any. Returns the number of
/// scripts created.
///
/// # Errors
///
/// - `GraphError::Restore` — a config has no display name, or no script
///   payload is available (neither a `Script Data/` file nor embedded
///   `scriptContent`).
/// - `GraphError::Api` — the create or assign request was rejected.
pub async fn restore_powershell_scripts(client: &GraphClient, path: &Path) -> Result<usize> {
    let family_dir = path.join(BACKUP_FOLDER);
    let mut restored = 0;

    for file in list_config_files(&family_dir)? {
        let mut config = load_config(&file)?;
        let display_name = require_display_name(&config, &file)?;

        attach_script_content(&mut config, &family_dir, "scriptContent", &display_name)?;
        let assignments = take_assignments(&mut config);

        println!("Restoring Powershell script: {display_name}");
        let created: Value = client
            .post("deviceManagement/deviceManagementScripts", &config)
            .await?;
        restored += 1;

        if let Some(assignments) = assignments {
            let id = created_id(&created, &display_name)?;
            let body = json!({ "deviceManagementScriptAssignments": assignments });
            client
                .post_no_content(
                    &format!("deviceManagement/deviceManagementScripts/{id}/assign"),
                    &body,
                )
                .await?;
        }
    }

    Ok(restored)
}

// ── Shared helpers for the script-bearing families ─────────────────────

/// Collects the `id` of every object in a `{ "value": [...] }` listing.
pub(crate) fn collect_ids(listing: &Value) -> Vec<String> {
    listing
        .get("value")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Pulls the display name out of a config, failing with a `Restore` error
/// naming the file when it is absent.
pub(crate) fn require_display_name(config: &Value, file: &Path) -> Result<String> {
    config
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GraphError::Restore {
            name: file.display().to_string(),
            reason: "config file has no displayName".to_string(),
        })
}

/// Removes and returns the `assignments` array from a config, so the
/// create request body doesn't carry a property Graph rejects.
pub(crate) fn take_assignments(config: &mut Value) -> Option<Vec<Value>> {
    let assignments = config.as_object_mut()?.remove("assignments")?;
    match assignments {
        Value::Array(list) if !list.is_empty() => Some(list),
        _ => None,
    }
}

/// Ensures `config[key]` holds a base64 script payload before upload.
///
/// The `.ps1` file under `Script Data/` wins over the embedded copy —
/// decoding it at backup time exists precisely so it can be reviewed and
/// edited. When no file matches, the embedded content is kept. Having
/// neither is a restore error.
pub(crate) fn attach_script_content(
    config: &mut Value,
    family_dir: &Path,
    key: &str,
    display_name: &str,
) -> Result<()> {
    let file_name = config
        .get("fileName")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(file_name) = file_name {
        if let Ok(encoded) = read_script_payload(family_dir, &file_name, display_name) {
            config[key] = Value::String(encoded);
            return Ok(());
        }
    }

    if config.get(key).and_then(Value::as_str).is_some() {
        return Ok(());
    }

    Err(GraphError::Restore {
        name: display_name.to_string(),
        reason: format!("no script payload available for {key}"),
    })
}

/// Extracts the `id` Graph assigned to a freshly created object.
pub(crate) fn created_id(created: &Value, display_name: &str) -> Result<String> {
    created
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GraphError::Restore {
            name: display_name.to_string(),
            reason: "create response carried no id".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collect_ids_reads_listing_value() {
        let listing = json!({"value": [{"id": "a"}, {"id": "b"}, {"displayName": "no id"}]});
        assert_eq!(collect_ids(&listing), vec!["a", "b"]);
    }

    #[test]
    fn collect_ids_of_empty_listing() {
        assert!(collect_ids(&json!({"value": []})).is_empty());
        assert!(collect_ids(&json!({})).is_empty());
    }

    #[test]
    fn take_assignments_removes_from_config() {
        let mut config = json!({
            "displayName": "A",
            "assignments": [{"target": {"groupId": "g1"}}]
        });
        let assignments = take_assignments(&mut config).unwrap();
        assert_eq!(assignments.len(), 1);
        assert!(config.get("assignments").is_none());
    }

    #[test]
    fn take_assignments_empty_list_is_none() {
        let mut config = json!({"displayName": "A", "assignments": []});
        assert!(take_assignments(&mut config).is_none());
        let mut config = json!({"displayName": "A"});
        assert!(take_assignments(&mut config).is_none());
    }

    #[test]
    fn require_display_name_errors_without_one() {
        let config = json!({"fileName": "x.ps1"});
        let err = require_display_name(&config, Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, GraphError::Restore { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn attach_script_content_prefers_script_data_file() {
        let dir = tempfile::TempDir::new().unwrap();
        crate::backup::write_script_payload(
            dir.path(),
            "edited.ps1",
            "V3JpdGUtSG9zdCAnZWRpdGVkJw==", // Write-Host 'edited'
            "A",
        )
        .unwrap();

        let mut config = json!({
            "displayName": "A",
            "fileName": "edited.ps1",
            "scriptContent": "c3RhbGU="
        });
        attach_script_content(&mut config, dir.path(), "scriptContent", "A").unwrap();
        assert_eq!(config["scriptContent"], "V3JpdGUtSG9zdCAnZWRpdGVkJw==");
    }

    #[test]
    fn attach_script_content_falls_back_to_embedded() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = json!({
            "displayName": "A",
            "fileName": "gone.ps1",
            "scriptContent": "ZW1iZWRkZWQ="
        });
        attach_script_content(&mut config, dir.path(), "scriptContent", "A").unwrap();
        assert_eq!(config["scriptContent"], "ZW1iZWRkZWQ=");
    }

    #[test]
    fn attach_script_content_errors_with_neither() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = json!({"displayName": "A"});
        let err =
            attach_script_content(&mut config, dir.path(), "scriptContent", "A").unwrap_err();
        assert!(matches!(err, GraphError::Restore { .. }));
    }

    #[test]
    fn created_id_errors_when_absent() {
        let err = created_id(&json!({"displayName": "A"}), "A").unwrap_err();
        assert!(matches!(err, GraphError::Restore { .. }));
        assert_eq!(created_id(&json!({"id": "new"}), "A").unwrap(), "new");
    }
}
