use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// One failed upload strategy, kept for diagnostics when every strategy
/// is exhausted.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    /// Name of the strategy that was tried
    pub strategy: &'static str,
    /// Why it did not produce a verified attachment
    pub reason: String,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

/// Error taxonomy for the automation engine, with exit codes for the CLI
#[derive(Debug, Error)]
pub enum AutomationError {
    /// A non-terminal task already exists (exit code 2)
    #[error("an automation task is already running")]
    TaskAlreadyRunning,

    /// Required task data is missing; detected before any browser activity (exit code 2)
    #[error("task data incomplete: {0}")]
    IncompleteTaskData(String),

    /// No personal profile is configured (exit code 2)
    #[error("no personal profile is configured for this task")]
    ProfileMissing,

    /// Source file for staging does not exist (exit code 2)
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A staged file vanished from disk between staging and use (exit code 2)
    #[error("staged file is missing on disk: {0}")]
    StagedFileMissing(String),

    /// An upload candidate is missing or empty; detected before DOM interaction (exit code 2)
    #[error("invalid upload file {}: {reason}", .path.display())]
    InvalidUploadFile { path: PathBuf, reason: String },

    /// Browser endpoint never became healthy (exit code 4)
    #[error("browser connection timed out after {attempts} attempts ({elapsed:.1?})")]
    ConnectionTimeout { attempts: u32, elapsed: Duration },

    /// Every upload strategy failed against the widget (exit code 3)
    #[error("all upload strategies exhausted for '{target}' ({})", failures_summary(.failures))]
    UploadExhausted {
        target: String,
        failures: Vec<StrategyFailure>,
    },

    /// The operator never confirmed a verification checkpoint (exit code 6)
    #[error("operator verification timed out after {0:.0?}")]
    VerificationTimeout(Duration),

    /// The task was cancelled by the operator (exit code 7)
    #[error("task cancelled by operator")]
    Cancelled,

    /// Anything unexpected (exit code 1)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn failures_summary(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AutomationError {
    /// Exit code for the CLI binding
    pub fn exit_code(&self) -> i32 {
        match self {
            AutomationError::TaskAlreadyRunning
            | AutomationError::IncompleteTaskData(_)
            | AutomationError::ProfileMissing
            | AutomationError::FileNotFound(_)
            | AutomationError::StagedFileMissing(_)
            | AutomationError::InvalidUploadFile { .. } => 2,
            AutomationError::UploadExhausted { .. } => 3,
            AutomationError::ConnectionTimeout { .. } => 4,
            AutomationError::VerificationTimeout(_) => 6,
            AutomationError::Cancelled => 7,
            AutomationError::Other(_) => 1,
        }
    }

    /// Setup errors abort before the task ever reaches Launching
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            AutomationError::IncompleteTaskData(_)
                | AutomationError::ProfileMissing
                | AutomationError::FileNotFound(_)
                | AutomationError::StagedFileMissing(_)
                | AutomationError::InvalidUploadFile { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
