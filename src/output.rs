//! Backup file persistence: deterministic naming and JSON/YAML round-trip.
//!
//! Every family module saves configs through [`save_output`], which owns
//! folder creation and format selection, and reads them back through
//! [`load_config`] during restore. File names come from the object's
//! display name via [`clean_filename`], so the same tenant state always
//! produces the same tree on disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;

/// On-disk serialization format for backed-up configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (`.json`).
    Json,
    /// Block-style YAML (`.yaml`).
    Yaml,
}

impl OutputFormat {
    /// File extension for this format, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }

    /// Serializes a config value in this format.
    pub fn to_string(self, value: &Value) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }
}

/// Sanitizes a display name into a file name.
///
/// Characters that are illegal or troublesome in file names on Windows or
/// POSIX (`/ \ ? % * : | " < >` and control characters) are replaced with
/// `_`; trailing dots and spaces are trimmed because Windows silently
/// drops them, which would break the name↔file correspondence on restore.
/// The result is deterministic for a given input.
pub fn clean_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_end_matches(['.', ' ']).to_string()
}

/// Writes a config to `<dir>/<fname>.<ext>`, creating the directory tree
/// as needed. Returns the path of the written file.
pub fn save_output(format: OutputFormat, dir: &Path, fname: &str, data: &Value) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{fname}.{}", format.extension()));
    fs::write(&path, format.to_string(data)?)?;
    Ok(path)
}

/// Reads a backed-up config file, selecting the parser by extension.
/// Files without a `.yaml`/`.yml` extension are parsed as JSON.
pub fn load_config(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        Ok(serde_yaml::from_str(&text)?)
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}

/// Lists the restorable config files in a backup folder: regular files
/// with a JSON/YAML extension, excluding `*.audit.*` sidecar records.
/// Returns an empty list when the folder does not exist (nothing was
/// backed up for that family). Results are sorted for deterministic
/// restore order.
pub fn list_config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let has_config_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "json" | "yaml" | "yml"));
        let is_audit_sidecar = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with(".audit"));
        if has_config_ext && !is_audit_sidecar {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn clean_filename_replaces_illegal_characters() {
        assert_eq!(
            clean_filename("Fix: C:\\Temp/thing?*"),
            "Fix_ C__Temp_thing__"
        );
        assert_eq!(clean_filename("a|b\"c<d>e"), "a_b_c_d_e");
    }

    #[test]
    fn clean_filename_trims_trailing_dots_and_spaces() {
        assert_eq!(clean_filename("Cleanup v2. "), "Cleanup v2");
        assert_eq!(clean_filename("Plain name"), "Plain name");
    }

    #[test]
    fn clean_filename_is_deterministic() {
        let name = "PROD: weekly / cleanup";
        assert_eq!(clean_filename(name), clean_filename(name));
    }

    #[test]
    fn save_output_writes_json_and_loads_back() {
        let dir = TempDir::new().unwrap();
        let data = json!({"displayName": "test", "runAsAccount": "system"});

        let path = save_output(OutputFormat::Json, dir.path(), "test", &data).unwrap();
        assert_eq!(path, dir.path().join("test.json"));

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn save_output_writes_yaml_and_loads_back() {
        let dir = TempDir::new().unwrap();
        let data = json!({"displayName": "test", "enforceSignatureCheck": false});

        let path = save_output(OutputFormat::Yaml, dir.path(), "test", &data).unwrap();
        assert_eq!(path, dir.path().join("test.yaml"));

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn save_output_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Scripts").join("Powershell");

        let path = save_output(OutputFormat::Json, &nested, "cfg", &json!({})).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn list_config_files_skips_audit_sidecars_and_scripts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.yaml"), "{}").unwrap();
        std::fs::write(dir.path().join("a.audit.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("Script Data")).unwrap();

        let files = list_config_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml"]);
    }

    #[test]
    fn list_config_files_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = list_config_files(&dir.path().join("never-created")).unwrap();
        assert!(files.is_empty());
    }
}
