//! Async Rust client library for backing up and restoring Microsoft Intune
//! configuration objects via the Microsoft Graph API.
//!
//! Provides OAuth2 authentication, an authenticated HTTP client with 401
//! retry, Graph `$batch` helpers, and per-family backup/restore pipelines
//! for PowerShell scripts, Proactive Remediations, and Management Partner
//! connections. Configs are saved as JSON or YAML under a deterministic
//! folder layout, with embedded script payloads decoded alongside them.
//!
//! # Modules
//!
//! - [`audit`] — Audit-trail retrieval and sidecar records.
//! - [`auth`] — OAuth2 client credentials token provider with expiry tracking.
//! - [`backup`] — Shared run options, result tally, and payload handling.
//! - [`batch`] — Graph `$batch` requests and assignment stitching.
//! - [`client`] — Authenticated HTTP wrapper for the Graph REST API.
//! - [`error`] — Typed error hierarchy (`GraphError`) for all library operations.
//! - [`management_partners`] — Management Partner connection backup/restore.
//! - [`output`] — JSON/YAML persistence and deterministic file naming.
//! - [`powershell_scripts`] — PowerShell script backup/restore.
//! - [`proactive_remediations`] — Proactive Remediation backup/restore.
//! - [`transform`] — Key stripping and prefix filtering.
//!
//! # Quick Start
//!
//! ```ignore
//! use intune_backup::auth::TokenProvider;
//! use intune_backup::backup::BackupOptions;
//! use intune_backup::client::GraphClient;
//! use intune_backup::output::OutputFormat;
//! use intune_backup::powershell_scripts::backup_powershell_scripts;
//!
//! let tp = TokenProvider::new("tenant", "client_id", "secret");
//! let client = GraphClient::new(tp);
//! let opts = BackupOptions::new("./backup", OutputFormat::Json);
//! let result = backup_powershell_scripts(&client, &opts).await?;
//! println!("saved {} scripts", result.config_count);
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod auth;
pub mod backup;
pub mod batch;
pub mod client;
pub mod error;
pub mod management_partners;
pub mod output;
pub mod powershell_scripts;
pub mod proactive_remediations;
pub mod transform;
