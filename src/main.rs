//! CLI entry point for intune-backup — export and import Intune
//! configuration objects via the Microsoft Graph API.
//!
//! Authenticates via OAuth2 client credentials, then runs the selected
//! direction (`backup` or `restore`) across every supported object
//! family: PowerShell scripts, Proactive Remediations, and Management
//! Partner connections.
//!
//! Exit codes:
//! - 0: success
//! - 1: runtime error (auth failure, API error, I/O failure, etc.)
//! - 2: argument validation error (clap handles this automatically)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use intune_backup::auth::TokenProvider;
use intune_backup::backup::BackupOptions;
use intune_backup::client::GraphClient;
use intune_backup::error::Result;
use intune_backup::management_partners::{backup_management_partners, restore_management_partners};
use intune_backup::output::OutputFormat;
use intune_backup::powershell_scripts::{backup_powershell_scripts, restore_powershell_scripts};
use intune_backup::proactive_remediations::{
    backup_proactive_remediations, restore_proactive_remediations,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Azure AD tenant ID for OAuth2 authentication.
    #[arg(long)]
    tenant_id: String,

    /// Azure AD application (client) ID.
    #[arg(long)]
    client_id: String,

    /// Azure AD client secret. Prefer setting via the GRAPH_CLIENT_SECRET
    /// environment variable to avoid exposing the secret in process
    /// listings and shell history.
    #[arg(long, env = "GRAPH_CLIENT_SECRET")]
    secret: String,

    /// Root of the local backup tree.
    #[arg(long, default_value = "backup")]
    path: PathBuf,

    #[command(subcommand)]
    command: Direction,
}

#[derive(Subcommand)]
enum Direction {
    /// Export tenant configuration to local files.
    Backup {
        /// On-disk format for config files.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,

        /// Only back up objects whose display name starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,

        /// Skip assignment metadata entirely.
        #[arg(long)]
        exclude_assignments: bool,

        /// Append the Graph object ID to file names so objects sharing a
        /// display name don't overwrite each other.
        #[arg(long)]
        append_id: bool,

        /// Fetch the audit trail per object and save sidecar records.
        #[arg(long)]
        audit: bool,
    },
    /// Import local files back into the tenant.
    Restore,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let tp = TokenProvider::new(&args.tenant_id, &args.client_id, &args.secret);
    let client = GraphClient::new(tp);

    let outcome = match args.command {
        Direction::Backup {
            output,
            prefix,
            exclude_assignments,
            append_id,
            audit,
        } => {
            let opts = BackupOptions {
                path: args.path,
                format: output,
                exclude_assignments,
                prefix,
                append_id,
                audit,
            };
            run_backup(&client, &opts).await
        }
        Direction::Restore => run_restore(&client, &args.path).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the backup pipeline for every object family and prints a
/// per-family summary.
async fn run_backup(client: &GraphClient, opts: &BackupOptions) -> Result<()> {
    let scripts = backup_powershell_scripts(client, opts).await?;
    let remediations = backup_proactive_remediations(client, opts).await?;
    let partners = backup_management_partners(client, opts).await?;

    println!("Backed up {} Powershell scripts", scripts.config_count);
    println!(
        "Backed up {} Proactive Remediations",
        remediations.config_count
    );
    println!("Backed up {} Management Partners", partners.config_count);
    Ok(())
}

/// Runs the restore pipeline for every object family and prints a
/// per-family summary.
async fn run_restore(client: &GraphClient, path: &Path) -> Result<()> {
    let scripts = restore_powershell_scripts(client, path).await?;
    let remediations = restore_proactive_remediations(client, path).await?;
    let partners = restore_management_partners(client, path).await?;

    println!("Restored {scripts} Powershell scripts");
    println!("Restored {remediations} Proactive Remediations");
    println!("Restored {partners} Management Partners");
    Ok(())
}
