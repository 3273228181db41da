//! Task lifecycle: the state machine and public command surface

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::PageSession;
use crate::config::AutomationConfig;
use crate::connection::BrowserConnectionManager;
use crate::errors::{AutomationError, Result};
use crate::handoff::VerificationHandoff;
use crate::page_model::AppealPageModel;
use crate::script::{self, AutomationSequence, CheckpointKind, Step};
use crate::staging::FileStagingService;
use crate::types::{
    AutomationRequest, AutomationState, AutomationStatus, AutomationTask, ConnectionStrategy,
    ResolvedAttachments, VerificationOutcome,
};
use crate::upload::UploadStrategySelector;

/// Hook invoked with the submitted task once it completes, so the external
/// record store can persist a case row
pub type CaseRecorder = Arc<dyn Fn(&AutomationTask) + Send + Sync>;

/// Owns the single in-flight task and publishes status snapshots
///
/// Status flows through a watch channel: the background execution task is
/// the only writer while it runs, readers never block, and a transition
/// completed before a read is visible to that read.
pub struct AutomationController {
    config: AutomationConfig,
    page_model: AppealPageModel,
    staging: Arc<FileStagingService>,
    handoff: Arc<VerificationHandoff>,
    status_tx: watch::Sender<AutomationStatus>,
    status_rx: watch::Receiver<AutomationStatus>,
    inner: std::sync::Mutex<ControllerInner>,
    case_recorder: Option<CaseRecorder>,
}

#[derive(Default)]
struct ControllerInner {
    current: Option<RunningTask>,
}

struct RunningTask {
    task_id: Uuid,
    cancel_flag: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
    _join: JoinHandle<()>,
}

impl AutomationController {
    pub fn new(config: AutomationConfig) -> Self {
        let staging = Arc::new(FileStagingService::new(config.staging_root.clone()));
        let (status_tx, status_rx) = watch::channel(AutomationStatus::idle());
        Self {
            config,
            page_model: AppealPageModel::default(),
            staging,
            handoff: Arc::new(VerificationHandoff::new()),
            status_tx,
            status_rx,
            inner: std::sync::Mutex::new(ControllerInner::default()),
            case_recorder: None,
        }
    }

    /// Install a completion hook for the external record store
    pub fn with_case_recorder(mut self, recorder: CaseRecorder) -> Self {
        self.case_recorder = Some(recorder);
        self
    }

    /// Replace the page model (e.g. after the target page changed)
    pub fn with_page_model(mut self, page_model: AppealPageModel) -> Self {
        self.page_model = page_model;
        self
    }

    /// The staging service backing this controller
    pub fn staging(&self) -> &FileStagingService {
        &self.staging
    }

    /// Start one automation task
    ///
    /// All setup validation (profile present, staged files resolvable,
    /// sequence renderable) happens here, synchronously, before any browser
    /// activity; setup failures never leave Idle. At most one task may be
    /// non-terminal at a time.
    pub fn start(
        &self,
        request: AutomationRequest,
        preferred_strategy: Option<ConnectionStrategy>,
    ) -> Result<Uuid> {
        let mut inner = self.inner.lock().expect("controller lock poisoned");

        if inner.current.is_some() && !self.status_rx.borrow().state.is_terminal() {
            return Err(AutomationError::TaskAlreadyRunning);
        }

        let profile = request.profile.ok_or(AutomationError::ProfileMissing)?;
        let task = AutomationTask {
            id: Uuid::new_v4(),
            infringing_url: request.infringing_url,
            original_url: request.original_url,
            profile,
            ip_asset: request.ip_asset,
            created_at: Utc::now(),
        };

        // Resolve staged identifiers up front so a vanished file aborts the
        // task instead of silently skipping an attachment later
        let attachments = self.resolve_attachments(&task)?;
        let sequence = script::render(&task, &attachments, &self.page_model)?;

        info!(
            "Starting automation task {} ({} steps)",
            task.id,
            sequence.len()
        );

        // Fresh status for the new task; the restart from a terminal state
        // bypasses edge validation deliberately
        let _ = self.status_tx.send(AutomationStatus {
            state: AutomationState::Launching,
            current_step: Some("acquiring browser".to_string()),
            progress: Some(0.0),
            error: None,
            started_at: Some(Utc::now()),
        });

        let cancel_flag = Arc::new(AtomicBool::new(false));
        let cancel_notify = Arc::new(Notify::new());
        let task_id = task.id;

        let join = tokio::spawn(run_task(TaskContext {
            config: self.config.clone(),
            sequence,
            task,
            preferred_strategy,
            status: StatusWriter {
                tx: self.status_tx.clone(),
            },
            handoff: self.handoff.clone(),
            cancel_flag: cancel_flag.clone(),
            cancel_notify: cancel_notify.clone(),
            case_recorder: self.case_recorder.clone(),
        }));

        inner.current = Some(RunningTask {
            task_id,
            cancel_flag,
            cancel_notify,
            _join: join,
        });
        Ok(task_id)
    }

    /// Request cancellation of the in-flight task
    ///
    /// Always succeeds; a no-op when idle. The background task observes the
    /// flag at its next blocking point and transitions to Cancelled.
    pub fn stop(&self) {
        let inner = self.inner.lock().expect("controller lock poisoned");
        if let Some(running) = &inner.current {
            if self.status_rx.borrow().state.is_terminal() {
                return;
            }
            info!("Stop requested for task {}", running.task_id);
            running.cancel_flag.store(true, Ordering::SeqCst);
            running.cancel_notify.notify_waiters();
        }
    }

    /// Snapshot of the current status; never blocks, never fails
    pub fn status(&self) -> AutomationStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status transitions (optional push alternative to polling)
    pub fn watch_status(&self) -> watch::Receiver<AutomationStatus> {
        self.status_rx.clone()
    }

    /// Operator action: "I have completed verification"
    ///
    /// No-op when no task is waiting at a checkpoint.
    pub fn continue_after_verification(&self) {
        let task_id = {
            let inner = self.inner.lock().expect("controller lock poisoned");
            inner.current.as_ref().map(|running| running.task_id)
        };
        match task_id {
            Some(task_id) => {
                if !self.handoff.signal(task_id) {
                    debug!("continue_after_verification: task {} is not waiting", task_id);
                }
            }
            None => debug!("continue_after_verification: no task in flight"),
        }
    }

    fn resolve_attachments(&self, task: &AutomationTask) -> Result<ResolvedAttachments> {
        let id_card = self.staging.resolve_all(&task.profile.id_card_files)?;
        let (auth_docs, proof_docs) = match &task.ip_asset {
            Some(asset) => (
                self.staging.resolve_all(&asset.auth_files)?,
                self.staging.resolve_all(&asset.work_proof_files)?,
            ),
            None => (Vec::new(), Vec::new()),
        };
        Ok(ResolvedAttachments {
            id_card,
            auth_docs,
            proof_docs,
        })
    }
}

/// Single writer over the status channel, enforcing the state machine's
/// edges; invalid transitions are suppressed and logged rather than
/// corrupting the published state
struct StatusWriter {
    tx: watch::Sender<AutomationStatus>,
}

impl StatusWriter {
    fn transition(&self, next: AutomationState, step: &str, progress: Option<f32>) {
        self.tx.send_modify(|status| {
            if status.state != next && !status.state.can_advance_to(next) {
                warn!(
                    "Suppressed invalid state transition {} -> {}",
                    status.state, next
                );
                return;
            }
            status.state = next;
            status.current_step = Some(step.to_string());
            if let Some(progress) = progress {
                status.progress = Some(progress);
            }
        });
    }

    /// Update the step label without touching the state
    fn note(&self, step: &str) {
        self.tx.send_modify(|status| {
            status.current_step = Some(step.to_string());
        });
    }

    fn fail(&self, message: &str) {
        self.tx.send_modify(|status| {
            if !status.state.can_advance_to(AutomationState::Failed) {
                return;
            }
            status.state = AutomationState::Failed;
            status.current_step = Some("failed".to_string());
            status.error = Some(message.to_string());
        });
    }

    fn cancelled(&self) {
        self.tx.send_modify(|status| {
            if !status.state.can_advance_to(AutomationState::Cancelled) {
                return;
            }
            status.state = AutomationState::Cancelled;
            status.current_step = Some("cancelled by operator".to_string());
        });
    }

    fn completed(&self) {
        self.tx.send_modify(|status| {
            if !status.state.can_advance_to(AutomationState::Completed) {
                warn!(
                    "Suppressed invalid state transition {} -> Completed",
                    status.state
                );
                return;
            }
            status.state = AutomationState::Completed;
            status.current_step = Some("appeal submitted".to_string());
            status.progress = Some(100.0);
        });
    }
}

struct TaskContext {
    config: AutomationConfig,
    sequence: AutomationSequence,
    task: AutomationTask,
    preferred_strategy: Option<ConnectionStrategy>,
    status: StatusWriter,
    handoff: Arc<VerificationHandoff>,
    cancel_flag: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
    case_recorder: Option<CaseRecorder>,
}

/// Background execution: everything after start()'s synchronous validation
async fn run_task(ctx: TaskContext) {
    let task_id = ctx.task.id;
    let result = execute(&ctx).await;
    match result {
        Ok(()) => {
            ctx.status.completed();
            info!("Task {} completed", task_id);
            if let Some(recorder) = &ctx.case_recorder {
                recorder(&ctx.task);
            }
        }
        Err(AutomationError::Cancelled) => {
            ctx.status.cancelled();
            info!("Task {} cancelled", task_id);
        }
        Err(e) => {
            error!("Task {} failed: {}", task_id, e);
            ctx.status.fail(&e.to_string());
        }
    }
}

async fn execute(ctx: &TaskContext) -> Result<()> {
    let cancel_flag = ctx.cancel_flag.clone();
    let cancelled = move || cancel_flag.load(Ordering::SeqCst);

    ctx.status.transition(
        AutomationState::Launching,
        "locating a controllable browser",
        Some(2.0),
    );
    let manager = BrowserConnectionManager::new(ctx.config.clone());
    let browser = manager
        .acquire(ctx.preferred_strategy, &ctx.cancel_notify, &cancelled)
        .await?;

    ctx.status.transition(
        AutomationState::Connecting,
        "opening the automation page",
        Some(8.0),
    );
    let page = match browser.page().await {
        Ok(page) => page,
        Err(e) => {
            browser.release().await;
            return Err(AutomationError::Other(e));
        }
    };
    let session = PageSession::new(page);

    let result = run_sequence(ctx, &session, &cancelled).await;
    browser.release().await;
    result
}

async fn run_sequence(
    ctx: &TaskContext,
    session: &PageSession,
    cancelled: &(impl Fn() -> bool + Clone),
) -> Result<()> {
    let selector = UploadStrategySelector::new(ctx.config.upload_settle);
    let total = ctx.sequence.len().max(1) as f32;
    let mut final_confirmed = false;

    for (index, step) in ctx.sequence.steps.iter().enumerate() {
        if cancelled() {
            return Err(AutomationError::Cancelled);
        }
        let progress = 10.0 + 85.0 * (index as f32 / total);
        debug!("Step {}/{}: {}", index + 1, ctx.sequence.len(), step.describe());

        match step {
            Step::Navigate { url } => {
                ctx.status
                    .transition(AutomationState::FillingForm, &step.describe(), Some(progress));
                session.goto(url).await?;
            }
            Step::Fill { locator, value, .. } => {
                advance_or_note(ctx, AutomationState::FillingForm, step, progress, final_confirmed);
                session.fill(locator, value).await?;
            }
            Step::SelectOption {
                trigger,
                option_scope,
                option_text,
                ..
            } => {
                advance_or_note(ctx, AutomationState::FillingForm, step, progress, final_confirmed);
                session
                    .select_option(trigger, option_scope, option_text)
                    .await?;
            }
            Step::Click { locator, .. } => {
                advance_or_note(ctx, AutomationState::FillingForm, step, progress, final_confirmed);
                session.click(locator).await?;
            }
            Step::UploadFiles { widget, files, .. } => {
                advance_or_note(ctx, AutomationState::Uploading, step, progress, final_confirmed);
                let report = selector
                    .upload(session, widget, files, &ctx.cancel_notify, cancelled.clone())
                    .await?;
                if let Some(winner) = report.winning_attempt() {
                    info!(
                        "Attached {} file(s) to {} via '{}'",
                        winner.files_attempted, winner.target, winner.strategy
                    );
                }
            }
            Step::AwaitVerification { label, kind } => {
                let state = match kind {
                    CheckpointKind::Verification => AutomationState::AwaitingVerification,
                    CheckpointKind::FinalConfirmation => {
                        AutomationState::AwaitingFinalConfirmation
                    }
                };
                ctx.status.transition(state, &step.describe(), Some(progress));

                let outcome = ctx
                    .handoff
                    .await_operator(
                        ctx.task.id,
                        ctx.config.verification_timeout,
                        &ctx.cancel_notify,
                        cancelled.clone(),
                    )
                    .await;
                match outcome {
                    VerificationOutcome::Resumed => match kind {
                        CheckpointKind::Verification => {
                            ctx.status.transition(
                                AutomationState::Resuming,
                                &format!("operator confirmed: {}", label),
                                None,
                            );
                        }
                        CheckpointKind::FinalConfirmation => {
                            final_confirmed = true;
                            ctx.status.note("operator confirmed submission");
                        }
                    },
                    VerificationOutcome::TimedOut => {
                        return Err(AutomationError::VerificationTimeout(
                            ctx.config.verification_timeout,
                        ));
                    }
                    VerificationOutcome::Cancelled => return Err(AutomationError::Cancelled),
                }
            }
            Step::Settle { millis } => {
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_millis(*millis)) => {}
                    _ = ctx.cancel_notify.notified() => {}
                }
            }
        }
    }
    Ok(())
}

/// Steps after the final confirmation keep the AwaitingFinalConfirmation
/// state (only Completed may follow it); earlier steps transition normally
fn advance_or_note(
    ctx: &TaskContext,
    state: AutomationState,
    step: &Step,
    progress: f32,
    final_confirmed: bool,
) {
    if final_confirmed {
        ctx.status.note(&step.describe());
    } else {
        ctx.status.transition(state, &step.describe(), Some(progress));
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
