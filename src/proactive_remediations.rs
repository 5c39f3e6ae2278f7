//! Backup and restore of Intune Proactive Remediations.
//!
//! This module covers the `deviceManagement/deviceHealthScripts` resource
//! family (Proactive Remediations — paired detection/remediation
//! PowerShell scripts). The pipeline matches the other script family,
//! with two per-family variations:
//!
//! - Remediations published by `Microsoft` are built-in and cannot be
//!   created by API, so backup skips them.
//! - Each object carries **two** embedded payloads,
//!   `detectionScriptContent` and `remediationScriptContent`, decoded to
//!   `Script Data/<name>__DetectionScript.ps1` and
//!   `<name>__RemediationScript.ps1`.
//!
//! Restore re-encodes both payloads (files on disk win over the embedded
//! copies), POSTs to create, and re-creates assignments via `assign`.

use serde_json::{json, Value};
use std::path::Path;

use crate::audit::{fetch_audit_events, merge_audit_record, save_audit_record};
use crate::backup::{
    config_file_name, read_script_payload, write_script_payload, BackupOptions, BackupResult,
};
use crate::batch::{batch_assignment, batch_request, get_object_assignment};
use crate::client::GraphClient;
use crate::error::{GraphError, Result};
use crate::output::{list_config_files, load_config, save_output};
use crate::powershell_scripts::{
    collect_ids, created_id, require_display_name, take_assignments,
};
use crate::transform::{check_prefix_match, remove_keys};

/// Resource path of the Proactive Remediation family, relative to the
/// Graph version root. Trailing slash so object IDs append directly.
const RESOURCE: &str = "deviceManagement/deviceHealthScripts/";

/// Folder under the backup root where this family is saved.
pub const BACKUP_FOLDER: &str = "Proactive Remediations";

/// The two embedded payloads and their file-name suffixes.
const PAYLOAD_KEYS: [(&str, &str); 2] = [
    ("detectionScriptContent", "DetectionScript"),
    ("remediationScriptContent", "RemediationScript"),
];

/// Backs up all Proactive Remediations in the tenant.
///
/// Skips Microsoft-published remediations and objects not matching the
/// prefix filter; neither is counted in the result.
///
/// # Errors
///
/// - `GraphError::Api` — the Graph API returned a non-success status.
/// - `GraphError::ScriptDecode` — a payload was not valid base64/UTF-8.
/// - `GraphError::Io` — the backup directory could not be written.
pub async fn backup_proactive_remediations(
    client: &GraphClient,
    opts: &BackupOptions,
) -> Result<BackupResult> {
    let mut result = BackupResult::default();
    let family_dir = opts.path.join(BACKUP_FOLDER);

    let listing: Value = client.get("deviceManagement/deviceHealthScripts").await?;
    let ids = collect_ids(&listing);
    if ids.is_empty() {
        return Ok(result);
    }

    let assignment_responses = if opts.exclude_assignments {
        Vec::new()
    } else {
        batch_assignment(client, &ids, RESOURCE).await?
    };
    let details = batch_request(client, &ids, RESOURCE, "").await?;

    for mut remediation in details {
        // Built-in remediations can't be restored, so don't back them up.
        let microsoft_published = remediation
            .get("publisher")
            .and_then(Value::as_str)
            .is_some_and(|p| p == "Microsoft");
        if microsoft_published {
            continue;
        }

        let Some(display_name) = remediation.get("displayName").and_then(Value::as_str) else {
            continue;
        };
        if !check_prefix_match(display_name, opts.prefix()) {
            continue;
        }
        let display_name = display_name.to_string();
        let graph_id = remediation
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !opts.exclude_assignments {
            let assignments = get_object_assignment(&graph_id, &assignment_responses);
            if !assignments.is_empty() {
                remediation["assignments"] = Value::Array(assignments);
            }
        }

        let remediation = remove_keys(remediation);
        println!("Backing up Proactive Remediation: {display_name}");

        let fname = config_file_name(&display_name, &graph_id, opts.append_id);
        let config_path = save_output(opts.format, &family_dir, &fname, &remediation)?;
        result.push(fname.clone());

        if opts.audit && !graph_id.is_empty() {
            let events = fetch_audit_events(client, &graph_id).await?;
            if let Some(record) = merge_audit_record(&graph_id, &events) {
                save_audit_record(&record, &config_path, opts.format)?;
            }
        }

        for (key, suffix) in PAYLOAD_KEYS {
            if let Some(encoded) = remediation.get(key).and_then(Value::as_str) {
                let file_name = format!("{fname}__{suffix}.ps1");
                write_script_payload(&family_dir, &file_name, encoded, &display_name)?;
            }
        }
    }

    Ok(result)
}

/// Restores Proactive Remediations from a backup directory.
///
/// Returns the number of remediations created.
///
/// # Errors
///
/// - `GraphError::Restore` — a config has no display name, or a payload
///   is available neither on disk nor embedded.
/// - `GraphError::Api` — the create or assign request was rejected.
pub async fn restore_proactive_remediations(client: &GraphClient, path: &Path) -> Result<usize> {
    let family_dir = path.join(BACKUP_FOLDER);
    let mut restored = 0;

    for file in list_config_files(&family_dir)? {
        let mut config = load_config(&file)?;
        let display_name = require_display_name(&config, &file)?;

        // Payload files are named after the config file stem, so edited
        // and `--append-id` backups resolve to the right scripts.
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&display_name)
            .to_string();
        for (key, suffix) in PAYLOAD_KEYS {
            attach_payload(&mut config, &family_dir, &stem, key, suffix, &display_name)?;
        }
        let assignments = take_assignments(&mut config);

        println!("Restoring Proactive Remediation: {display_name}");
        let created: Value = client
            .post("deviceManagement/deviceHealthScripts", &config)
            .await?;
        restored += 1;

        if let Some(assignments) = assignments {
            let id = created_id(&created, &display_name)?;
            let body = json!({ "deviceHealthScriptAssignments": assignments });
            client
                .post_no_content(
                    &format!("deviceManagement/deviceHealthScripts/{id}/assign"),
                    &body,
                )
                .await?;
        }
    }

    Ok(restored)
}

/// Ensures `config[key]` holds a base64 payload: the
/// `Script Data/<stem>__<suffix>.ps1` file wins, the embedded copy is the
/// fallback, neither is an error.
fn attach_payload(
    config: &mut Value,
    family_dir: &Path,
    stem: &str,
    key: &str,
    suffix: &str,
    display_name: &str,
) -> Result<()> {
    let file_name = format!("{stem}__{suffix}.ps1");
    if let Ok(encoded) = read_script_payload(family_dir, &file_name, display_name) {
        config[key] = Value::String(encoded);
        return Ok(());
    }

    if config.get(key).and_then(Value::as_str).is_some() {
        return Ok(());
    }

    Err(GraphError::Restore {
        name: display_name.to_string(),
        reason: format!("no script payload available for {key}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::write_script_payload;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn payload_keys_cover_both_scripts() {
        let keys: Vec<_> = PAYLOAD_KEYS.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["detectionScriptContent", "remediationScriptContent"]);
    }

    #[test]
    fn attach_payload_prefers_file_on_disk() {
        let dir = TempDir::new().unwrap();
        write_script_payload(
            dir.path(),
            "test__DetectionScript.ps1",
            "ZnJvbSBkaXNr", // "from disk"
            "test",
        )
        .unwrap();

        let mut config = json!({"detectionScriptContent": "c3RhbGU="});
        attach_payload(
            &mut config,
            dir.path(),
            "test",
            "detectionScriptContent",
            "DetectionScript",
            "test",
        )
        .unwrap();
        assert_eq!(config["detectionScriptContent"], "ZnJvbSBkaXNr");
    }

    #[test]
    fn attach_payload_falls_back_to_embedded() {
        let dir = TempDir::new().unwrap();
        let mut config = json!({"remediationScriptContent": "ZW1iZWRkZWQ="});
        attach_payload(
            &mut config,
            dir.path(),
            "test",
            "remediationScriptContent",
            "RemediationScript",
            "test",
        )
        .unwrap();
        assert_eq!(config["remediationScriptContent"], "ZW1iZWRkZWQ=");
    }

    #[test]
    fn attach_payload_errors_with_neither() {
        let dir = TempDir::new().unwrap();
        let mut config = json!({});
        let err = attach_payload(
            &mut config,
            dir.path(),
            "test",
            "detectionScriptContent",
            "DetectionScript",
            "test",
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Restore { .. }));
    }
}
