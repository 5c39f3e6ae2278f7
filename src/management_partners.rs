//! Backup and restore of Intune Management Partner connections.
//!
//! This module covers the `deviceManagement/deviceManagementPartners`
//! resource family. Partners are the simplest family in the pipeline:
//! the list response already carries the full object, so there is no
//! batch detail fetch, and partners have neither assignments nor script
//! payloads. The per-family variations are:
//!
//! - Partners with `isConfigured == false` are placeholder rows Intune
//!   shows for every known partner; only configured connections are
//!   backed up.
//! - Partner connections cannot be created by API, so restore *updates*
//!   an existing partner matched by display name via PATCH instead of
//!   POSTing a new object.

use serde_json::Value;
use std::path::Path;

use crate::audit::{fetch_audit_events, merge_audit_record, save_audit_record};
use crate::backup::{config_file_name, BackupOptions, BackupResult};
use crate::client::GraphClient;
use crate::error::{GraphError, Result};
use crate::output::{list_config_files, load_config, save_output};
use crate::powershell_scripts::require_display_name;
use crate::transform::{check_prefix_match, remove_keys};

/// Folder under the backup root where this family is saved.
pub const BACKUP_FOLDER: &str = "Partner Connections/Management";

/// Backs up all configured Management Partner connections.
///
/// Unconfigured partners and partners not matching the prefix filter are
/// skipped and not counted.
///
/// # Errors
///
/// - `GraphError::Api` — the Graph API returned a non-success status.
/// - `GraphError::Io` — the backup directory could not be written.
pub async fn backup_management_partners(
    client: &GraphClient,
    opts: &BackupOptions,
) -> Result<BackupResult> {
    let mut result = BackupResult::default();
    let family_dir = opts.path.join(BACKUP_FOLDER);

    let listing: Value = client
        .get("deviceManagement/deviceManagementPartners")
        .await?;
    let Some(partners) = listing.get("value").and_then(Value::as_array) else {
        return Ok(result);
    };

    for partner in partners {
        let configured = partner
            .get("isConfigured")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !configured {
            continue;
        }

        let Some(display_name) = partner.get("displayName").and_then(Value::as_str) else {
            continue;
        };
        if !check_prefix_match(display_name, opts.prefix()) {
            continue;
        }
        let display_name = display_name.to_string();
        let graph_id = partner
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let partner = remove_keys(partner.clone());
        println!("Backing up Management Partner: {display_name}");

        let fname = config_file_name(&display_name, &graph_id, opts.append_id);
        let config_path = save_output(opts.format, &family_dir, &fname, &partner)?;
        result.push(fname);

        if opts.audit && !graph_id.is_empty() {
            let events = fetch_audit_events(client, &graph_id).await?;
            if let Some(record) = merge_audit_record(&graph_id, &events) {
                save_audit_record(&record, &config_path, opts.format)?;
            }
        }
    }

    Ok(result)
}

/// Restores Management Partner connections from a backup directory.
///
/// Each backed-up partner is matched to the tenant's partner list by
/// display name and updated in place via PATCH. Returns the number of
/// partners updated.
///
/// # Errors
///
/// - `GraphError::Restore` — a config has no display name, or no partner
///   with that display name exists in the tenant.
/// - `GraphError::Api` — the list or update request was rejected.
pub async fn restore_management_partners(client: &GraphClient, path: &Path) -> Result<usize> {
    let family_dir = path.join(BACKUP_FOLDER);
    let files = list_config_files(&family_dir)?;
    if files.is_empty() {
        return Ok(0);
    }

    // One listing serves every file: partners are a short, fixed set.
    let listing: Value = client
        .get("deviceManagement/deviceManagementPartners")
        .await?;
    let mut restored = 0;

    for file in files {
        let config = load_config(&file)?;
        let display_name = require_display_name(&config, &file)?;

        let id = find_partner_id(&listing, &display_name).ok_or_else(|| GraphError::Restore {
            name: display_name.clone(),
            reason: "no partner with that display name exists in the tenant".to_string(),
        })?;

        println!("Restoring Management Partner: {display_name}");
        client
            .patch(
                &format!("deviceManagement/deviceManagementPartners/{id}"),
                &config,
            )
            .await?;
        restored += 1;
    }

    Ok(restored)
}

/// Looks up a partner's Graph ID by display name in a partner listing.
fn find_partner_id(listing: &Value, display_name: &str) -> Option<String> {
    listing
        .get("value")?
        .as_array()?
        .iter()
        .find(|partner| {
            partner
                .get("displayName")
                .and_then(Value::as_str)
                .is_some_and(|name| name == display_name)
        })?
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn find_partner_id_matches_display_name() {
        let listing = json!({
            "value": [
                {"id": "p1", "displayName": "Jamf"},
                {"id": "p2", "displayName": "TeamViewer Connector"}
            ]
        });
        assert_eq!(
            find_partner_id(&listing, "TeamViewer Connector").as_deref(),
            Some("p2")
        );
        assert!(find_partner_id(&listing, "Unknown Partner").is_none());
    }

    #[test]
    fn find_partner_id_handles_malformed_listing() {
        assert!(find_partner_id(&json!({}), "Jamf").is_none());
        assert!(find_partner_id(&json!({"value": "not-a-list"}), "Jamf").is_none());
    }
}
