use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an automation task
///
/// Transitions are monotonic along the listed order, except for the
/// re-entrant AwaitingVerification/Resuming cycle: a task may pass through
/// verification more than once before it reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationState {
    Idle,
    Launching,
    Connecting,
    FillingForm,
    AwaitingVerification,
    Resuming,
    Uploading,
    AwaitingFinalConfirmation,
    Completed,
    Failed,
    Cancelled,
}

impl AutomationState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AutomationState::Completed | AutomationState::Failed | AutomationState::Cancelled
        )
    }

    /// Whether a transition from `self` to `next` is a valid edge
    pub fn can_advance_to(&self, next: AutomationState) -> bool {
        use AutomationState::*;
        if self.is_terminal() {
            return false;
        }
        // Failure and cancellation are reachable from any live state
        if matches!(next, Failed | Cancelled) {
            return true;
        }
        match (self, next) {
            (Idle, Launching) => true,
            (Launching, Connecting) => true,
            (Connecting, FillingForm) => true,
            // Checkpoints may interrupt either form filling or uploads
            (FillingForm, AwaitingVerification) => true,
            (Uploading, AwaitingVerification) => true,
            (AwaitingVerification, Resuming) => true,
            // Resuming re-enters whichever phase follows the checkpoint
            (Resuming, FillingForm) => true,
            (Resuming, Uploading) => true,
            (Resuming, AwaitingFinalConfirmation) => true,
            (FillingForm, Uploading) => true,
            (Uploading, FillingForm) => true,
            (FillingForm, AwaitingFinalConfirmation) => true,
            (Uploading, AwaitingFinalConfirmation) => true,
            (AwaitingFinalConfirmation, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for AutomationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Snapshot of the automation lifecycle, shared with the presentation layer
///
/// Field names are serialized camelCase so the UI can consume the struct
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationStatus {
    pub state: AutomationState,
    pub current_step: Option<String>,
    pub progress: Option<f32>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl AutomationStatus {
    pub fn idle() -> Self {
        Self {
            state: AutomationState::Idle,
            current_step: None,
            progress: None,
            error: None,
            started_at: None,
        }
    }
}

/// Personal profile data filled into the identity stage of the appeal form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub id_card_number: String,
    /// Staged relative paths of identity document scans
    #[serde(default)]
    pub id_card_files: Vec<String>,
}

/// Intellectual-property asset data filled into the rights stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAssetSnapshot {
    pub work_name: String,
    pub work_type: String,
    pub owner: String,
    pub region: String,
    pub work_start_date: String,
    pub work_end_date: String,
    pub equity_type: String,
    pub is_agent: bool,
    pub auth_start_date: Option<String>,
    pub auth_end_date: Option<String>,
    /// Staged relative paths of authorization documents
    #[serde(default)]
    pub auth_files: Vec<String>,
    /// Staged relative paths of ownership proof documents
    #[serde(default)]
    pub work_proof_files: Vec<String>,
}

/// Everything a single appeal submission needs, frozen at start time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationTask {
    pub id: Uuid,
    pub infringing_url: String,
    pub original_url: Option<String>,
    pub profile: ProfileSnapshot,
    pub ip_asset: Option<IpAssetSnapshot>,
    pub created_at: DateTime<Utc>,
}

/// Start parameters accepted from the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRequest {
    pub infringing_url: String,
    pub original_url: Option<String>,
    pub profile: Option<ProfileSnapshot>,
    pub ip_asset: Option<IpAssetSnapshot>,
}

/// A user file copied into the application-owned staging tree
///
/// `relative_path` always uses forward slashes; it is the only value meant
/// to be persisted by the record store. Absolute resolution happens at
/// automation time, never at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFile {
    pub category: String,
    pub subcategory: String,
    pub relative_path: String,
    pub original_filename: String,
}

/// Result of picking files in the external shell's dialog
#[derive(Debug, Serialize, Deserialize)]
pub struct FileSelection {
    pub paths: Vec<String>,
}

/// How a controllable browser instance is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStrategy {
    /// Attach to an already-debuggable instance on the configured port
    AttachExisting,
    /// Launch with the application-owned persistent profile directory
    PersistentProfile,
    /// Launch against a throwaway profile on a free port
    Ephemeral,
}

impl ConnectionStrategy {
    /// Canonical fallback order when no strategy is pinned
    pub const PREFERENCE_ORDER: [ConnectionStrategy; 3] = [
        ConnectionStrategy::AttachExisting,
        ConnectionStrategy::PersistentProfile,
        ConnectionStrategy::Ephemeral,
    ];
}

impl std::str::FromStr for ConnectionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "attach" | "attach_existing" => Ok(ConnectionStrategy::AttachExisting),
            "profile" | "persistent_profile" => Ok(ConnectionStrategy::PersistentProfile),
            "ephemeral" => Ok(ConnectionStrategy::Ephemeral),
            _ => anyhow::bail!("unknown connection strategy: {}", s),
        }
    }
}

/// Outcome of one upload-strategy attempt, retained in logs and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAttempt {
    pub strategy: String,
    pub target: String,
    pub files_attempted: usize,
    pub succeeded: bool,
    /// Attached-item indicators counted after the settle wait
    pub evidence_count: usize,
}

/// Result of a successful upload call
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub attempts: Vec<UploadAttempt>,
}

impl UploadReport {
    /// The attempt that produced verified success
    pub fn winning_attempt(&self) -> Option<&UploadAttempt> {
        self.attempts.iter().find(|a| a.succeeded)
    }
}

/// File paths resolved from staged identifiers, ready for DOM attachment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAttachments {
    pub id_card: Vec<PathBuf>,
    pub auth_docs: Vec<PathBuf>,
    pub proof_docs: Vec<PathBuf>,
}

/// How a verification wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The operator confirmed completion
    Resumed,
    /// The bounded wait elapsed with no signal
    TimedOut,
    /// The task was cancelled while waiting
    Cancelled,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
