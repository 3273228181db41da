//! Fallback strategies for attaching files to an opaque upload widget
//!
//! The widget's internals (hidden inputs, click-triggered native pickers)
//! are not under our control, so attachment is tried through an ordered
//! table of interaction strategies until one produces a verified
//! attached-item count. New strategies are added to the table, not to the
//! control flow.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::errors::{AutomationError, Result, StrategyFailure};
use crate::page_model::WidgetLocator;
use crate::types::{UploadAttempt, UploadReport};

/// DOM surface the strategies act against
///
/// Production implementation is `PageSession`; tests substitute a scripted
/// fake so the selection loop is exercised without a browser.
#[allow(async_fn_in_trait)]
pub trait UploadSurface {
    /// Set `files` on the widget's file input. With `require_visible` the
    /// candidate input must be visible; otherwise hidden inputs qualify.
    async fn set_files(
        &self,
        widget: &WidgetLocator,
        files: &[PathBuf],
        require_visible: bool,
    ) -> anyhow::Result<()>;

    /// Arm native file-chooser interception, click the trigger, and feed
    /// `files` into the intercepted chooser instead of a human browsing.
    async fn intercept_chooser(&self, widget: &WidgetLocator, files: &[PathBuf])
    -> anyhow::Result<()>;

    /// Click the widget trigger without interception
    async fn click_trigger(&self, widget: &WidgetLocator) -> anyhow::Result<()>;

    /// Count the widget's attached-item indicators
    async fn attached_count(&self, widget: &WidgetLocator) -> anyhow::Result<usize>;
}

/// Interaction technique a strategy applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategyKind {
    /// Set files on the input regardless of visibility
    SetOnHiddenInput,
    /// Set files only on a visible input
    SetOnVisibleInput,
    /// Intercept the native picker opened by the trigger click
    InterceptChooser,
    /// Click first, then set files on whatever input appeared
    ClickThenSet,
}

/// One entry of the ordered strategy table
#[derive(Debug, Clone, Copy)]
pub struct UploadStrategy {
    pub name: &'static str,
    pub kind: UploadStrategyKind,
}

/// Canonical strategy order, most direct technique first
pub const DEFAULT_STRATEGIES: [UploadStrategy; 4] = [
    UploadStrategy {
        name: "set-on-hidden-input",
        kind: UploadStrategyKind::SetOnHiddenInput,
    },
    UploadStrategy {
        name: "set-on-visible-input",
        kind: UploadStrategyKind::SetOnVisibleInput,
    },
    UploadStrategy {
        name: "intercept-file-chooser",
        kind: UploadStrategyKind::InterceptChooser,
    },
    UploadStrategy {
        name: "click-then-set",
        kind: UploadStrategyKind::ClickThenSet,
    },
];

/// Tries strategies in order until one produces verified success
pub struct UploadStrategySelector {
    strategies: Vec<UploadStrategy>,
    settle: Duration,
}

impl UploadStrategySelector {
    pub fn new(settle: Duration) -> Self {
        Self {
            strategies: DEFAULT_STRATEGIES.to_vec(),
            settle,
        }
    }

    /// Override the strategy table (order is significant)
    pub fn with_strategies(settle: Duration, strategies: Vec<UploadStrategy>) -> Self {
        Self { strategies, settle }
    }

    /// Attach `files` to `widget`, trying each strategy in order
    ///
    /// The first strategy whose post-settle attached-item count is non-zero
    /// wins and the loop stops immediately, so a second strategy can never
    /// double-attach. Exhaustion fails with per-strategy reasons.
    pub async fn upload<S: UploadSurface>(
        &self,
        surface: &S,
        widget: &WidgetLocator,
        files: &[PathBuf],
        cancel: &Notify,
        cancelled: impl Fn() -> bool,
    ) -> Result<UploadReport> {
        validate_files(files)?;

        let mut attempts = Vec::new();
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            if cancelled() {
                return Err(AutomationError::Cancelled);
            }

            debug!(
                "Trying upload strategy '{}' for {} ({} files)",
                strategy.name,
                widget.name,
                files.len()
            );

            let applied = self.apply(surface, strategy, widget, files, cancel, &cancelled).await;
            if let Err(e) = applied {
                if matches!(e, AutomationError::Cancelled) {
                    return Err(e);
                }
                warn!("Upload strategy '{}' failed to apply: {}", strategy.name, e);
                attempts.push(attempt(strategy, widget, files, false, 0));
                failures.push(StrategyFailure {
                    strategy: strategy.name,
                    reason: e.to_string(),
                });
                continue;
            }

            // Give the widget time to ingest the files before judging
            cancellable_sleep(self.settle, cancel).await;
            if cancelled() {
                return Err(AutomationError::Cancelled);
            }

            match surface.attached_count(widget).await {
                Ok(count) if count > 0 => {
                    info!(
                        "Upload strategy '{}' succeeded for {} ({} attached)",
                        strategy.name, widget.name, count
                    );
                    attempts.push(attempt(strategy, widget, files, true, count));
                    return Ok(UploadReport { attempts });
                }
                Ok(_) => {
                    debug!(
                        "Upload strategy '{}' produced no attached items for {}",
                        strategy.name, widget.name
                    );
                    attempts.push(attempt(strategy, widget, files, false, 0));
                    failures.push(StrategyFailure {
                        strategy: strategy.name,
                        reason: "no attached items appeared after settle".to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Could not verify upload strategy '{}' for {}: {}",
                        strategy.name, widget.name, e
                    );
                    attempts.push(attempt(strategy, widget, files, false, 0));
                    failures.push(StrategyFailure {
                        strategy: strategy.name,
                        reason: format!("verification query failed: {}", e),
                    });
                }
            }
        }

        Err(AutomationError::UploadExhausted {
            target: widget.name.clone(),
            failures,
        })
    }

    async fn apply<S: UploadSurface>(
        &self,
        surface: &S,
        strategy: &UploadStrategy,
        widget: &WidgetLocator,
        files: &[PathBuf],
        cancel: &Notify,
        cancelled: &impl Fn() -> bool,
    ) -> Result<()> {
        match strategy.kind {
            UploadStrategyKind::SetOnHiddenInput => {
                surface.set_files(widget, files, false).await?
            }
            UploadStrategyKind::SetOnVisibleInput => {
                surface.set_files(widget, files, true).await?
            }
            UploadStrategyKind::InterceptChooser => {
                surface.intercept_chooser(widget, files).await?
            }
            UploadStrategyKind::ClickThenSet => {
                surface.click_trigger(widget).await?;
                cancellable_sleep(self.settle, cancel).await;
                if cancelled() {
                    return Err(AutomationError::Cancelled);
                }
                surface.set_files(widget, files, false).await?
            }
        }
        Ok(())
    }
}

fn attempt(
    strategy: &UploadStrategy,
    widget: &WidgetLocator,
    files: &[PathBuf],
    succeeded: bool,
    evidence_count: usize,
) -> UploadAttempt {
    UploadAttempt {
        strategy: strategy.name.to_string(),
        target: widget.name.clone(),
        files_attempted: files.len(),
        succeeded,
        evidence_count,
    }
}

/// Every candidate must exist and be non-empty before any DOM interaction
fn validate_files(files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Err(AutomationError::IncompleteTaskData(
            "upload called with no files".to_string(),
        ));
    }
    for file in files {
        let metadata = std::fs::metadata(file).map_err(|_| AutomationError::InvalidUploadFile {
            path: file.clone(),
            reason: "file does not exist".to_string(),
        })?;
        if metadata.len() == 0 {
            return Err(AutomationError::InvalidUploadFile {
                path: file.clone(),
                reason: "file is empty".to_string(),
            });
        }
    }
    Ok(())
}

async fn cancellable_sleep(duration: Duration, cancel: &Notify) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.notified() => {}
    }
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod upload_test;
