//! Typed error hierarchy for the intune-backup crate.
//!
//! `GraphError` is a structured enum that preserves diagnostic context at
//! each failure boundary. Every variant carries enough information for
//! callers to:
//! - Distinguish the failure category (auth, API, parse, I/O, network).
//! - Inspect the original cause via `source()` (thiserror derives this
//!   automatically from `#[source]` and `#[from]` fields).
//! - Display a human-readable message that includes the relevant context
//!   (status code, response body, file path, etc.).
//!
//! Design rationale:
//! - Variants map to real system boundaries, not to internal implementation
//!   details. `Auth` covers the Azure AD token endpoint; `Api` covers the
//!   Graph REST API; `Io` covers the local backup directory; etc.
//! - `Api` preserves the response body. Graph error responses contain
//!   diagnostic codes and human-readable explanations that are essential
//!   for debugging permission issues and invalid request shapes —
//!   `error_for_status()` would discard them.
//! - `Network` wraps `reqwest::Error` for transport-level failures (DNS,
//!   TCP, TLS) that don't produce an HTTP status code.

use reqwest::StatusCode;

/// Unified error type for all intune-backup library operations.
///
/// Each variant corresponds to a distinct failure boundary in the system.
/// The `#[source]` attribute on inner errors enables `Error::source()`
/// chaining so callers can traverse the full cause chain.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Authentication failure at the Azure AD token endpoint.
    ///
    /// This covers:
    /// - Non-2xx responses from `/oauth2/v2.0/token` (invalid credentials,
    ///   expired secrets, misconfigured permissions). The `message` field
    ///   contains Azure AD's AADSTS error codes when available.
    /// - Missing token after a refresh attempt (internal invariant violation).
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable description of the authentication failure,
        /// including HTTP status and Azure AD error body when available.
        message: String,
        /// The underlying transport or parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The Graph API returned a non-success HTTP status code.
    ///
    /// The full response body is preserved: Graph error responses carry an
    /// `error.code` / `error.message` pair that is essential for debugging
    /// permission problems and malformed request bodies.
    #[error("Graph API error {status}: {body}")]
    Api {
        /// The HTTP status code returned by the Graph API.
        status: StatusCode,
        /// The raw response body text. May contain JSON error details,
        /// or an empty string if the body could not be read.
        body: String,
    },

    /// A restore operation could not proceed for a specific config — for
    /// example a Management Partner display name that no longer exists in
    /// the tenant, or a script config whose sibling `.ps1` file is missing
    /// from the backup directory.
    #[error("restore failed for {name}: {reason}")]
    Restore {
        /// Display name of the config being restored.
        name: String,
        /// Why the restore could not proceed.
        reason: String,
    },

    /// An embedded script payload could not be decoded (invalid base64
    /// or the decoded bytes were not valid UTF-8).
    #[error("failed to decode script payload for {name}: {reason}")]
    ScriptDecode {
        /// Display name of the config the payload belongs to.
        name: String,
        /// The decode failure description.
        reason: String,
    },

    /// JSON serialization or deserialization failed.
    ///
    /// This can occur if the Graph API returns an unexpected response
    /// shape, or when reading a backed-up JSON file that was edited by
    /// hand.
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// YAML serialization or deserialization failed when reading or
    /// writing a backup file in YAML format.
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A filesystem operation on the backup directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A network-level failure occurred (DNS resolution, TCP connection,
    /// TLS handshake, request timeout, etc.).
    ///
    /// No HTTP status code is available because the request did not
    /// complete. This wraps the underlying `reqwest::Error` which carries
    /// detailed transport diagnostics.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Convenience alias used throughout the library.
/// Keeps function signatures concise while providing the full typed error.
pub type Result<T> = std::result::Result<T, GraphError>;
