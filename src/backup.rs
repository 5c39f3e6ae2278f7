//! Shared backup/restore plumbing used by every object family.
//!
//! Each family module (`powershell_scripts`, `proactive_remediations`,
//! `management_partners`) follows the same fetch → filter → transform →
//! save pipeline; this module holds the pieces they share: run options,
//! the per-family result tally, deterministic file naming, and base64
//! script payload handling.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{GraphError, Result};
use crate::output::{clean_filename, OutputFormat};

/// Subfolder holding decoded script payloads next to their config files.
pub const SCRIPT_DATA_DIR: &str = "Script Data";

/// Options for one backup run, shared by every family module.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Root of the backup tree. Family folders are created beneath it.
    pub path: PathBuf,
    /// On-disk format for config files.
    pub format: OutputFormat,
    /// Skip fetching and saving assignment metadata.
    pub exclude_assignments: bool,
    /// Only back up objects whose display name starts with this prefix.
    /// `None` (or an empty string) backs up everything.
    pub prefix: Option<String>,
    /// Append `__<graph id>` to file names, so objects sharing a display
    /// name don't overwrite each other.
    pub append_id: bool,
    /// Fetch the audit trail per object and save a sidecar record.
    pub audit: bool,
}

impl BackupOptions {
    /// Options with everything optional switched off, for tests and the
    /// common CLI defaults.
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        BackupOptions {
            path: path.into(),
            format,
            exclude_assignments: false,
            prefix: None,
            append_id: false,
            audit: false,
        }
    }

    /// The configured prefix, or `""` when none was given — the empty
    /// prefix matches every display name.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// Tally of one family's backup run: how many configs were saved and
/// under which file names (without extension).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackupResult {
    pub config_count: usize,
    pub outputs: Vec<String>,
}

impl BackupResult {
    /// Records one saved config.
    pub fn push(&mut self, fname: String) {
        self.config_count += 1;
        self.outputs.push(fname);
    }
}

/// Builds the config file name (without extension) for an object:
/// the sanitized display name, with `__<id>` appended when requested.
pub fn config_file_name(display_name: &str, id: &str, append_id: bool) -> String {
    let fname = clean_filename(display_name);
    if append_id {
        format!("{fname}__{id}")
    } else {
        fname
    }
}

/// Builds the payload file name for a script: keeps the original script
/// file name, inserting `__<id>` before the extension when requested
/// (`cleanup.ps1` → `cleanup__<id>.ps1`).
pub fn script_file_name(file_name: &str, id: &str, append_id: bool) -> String {
    if !append_id {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}__{id}.{ext}"),
        None => format!("{file_name}__{id}"),
    }
}

/// Decodes a base64 script payload and writes it as UTF-8 text under the
/// family's `Script Data/` folder. Invalid base64 or non-UTF-8 content is
/// a hard error — a backup with a corrupt payload is worse than a failed
/// run.
pub fn write_script_payload(
    family_dir: &Path,
    file_name: &str,
    encoded: &str,
    display_name: &str,
) -> Result<PathBuf> {
    let decoded = decode_script_content(encoded, display_name)?;
    let script_dir = family_dir.join(SCRIPT_DATA_DIR);
    fs::create_dir_all(&script_dir)?;
    let path = script_dir.join(file_name);
    fs::write(&path, decoded)?;
    Ok(path)
}

/// Decodes a base64 script payload into UTF-8 text.
pub fn decode_script_content(encoded: &str, display_name: &str) -> Result<String> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| GraphError::ScriptDecode {
            name: display_name.to_string(),
            reason: format!("invalid base64: {e}"),
        })?;
    String::from_utf8(bytes).map_err(|e| GraphError::ScriptDecode {
        name: display_name.to_string(),
        reason: format!("decoded bytes are not valid UTF-8: {e}"),
    })
}

/// Reads a script file from the `Script Data/` folder and base64-encodes
/// it for upload during restore. A missing file is a restore error for
/// the named config, not an I/O panic.
pub fn read_script_payload(family_dir: &Path, file_name: &str, display_name: &str) -> Result<String> {
    let path = family_dir.join(SCRIPT_DATA_DIR).join(file_name);
    let bytes = fs::read(&path).map_err(|_| GraphError::Restore {
        name: display_name.to_string(),
        reason: format!("script file {} is missing from the backup", path.display()),
    })?;
    Ok(BASE64.encode(bytes))
}
