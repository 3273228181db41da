//! # rightsguard
#![allow(clippy::uninlined_format_args)]
//!
//! Automation orchestration engine for a copyright-appeal submission
//! workflow.
//!
//! The engine drives a Chromium-family browser over its remote-debugging
//! (CDP) endpoint through a multi-page appeal form, stages user-supplied
//! evidence files so the page can attach them, pauses at CAPTCHA/SMS
//! checkpoints for a human operator, and falls back through several
//! DOM-interaction strategies when attaching files to the page's opaque
//! upload widgets.
//!
//! ## Library Usage
//!
//! ```no_run
//! use rightsguard::{AutomationConfig, AutomationController, AutomationRequest, ProfileSnapshot};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let controller = AutomationController::new(AutomationConfig::default());
//!
//! controller.start(
//!     AutomationRequest {
//!         infringing_url: "https://example.com/infringing-video".to_string(),
//!         original_url: None,
//!         profile: Some(ProfileSnapshot {
//!             name: "张三".to_string(),
//!             phone: "13800000000".to_string(),
//!             email: "zhangsan@example.com".to_string(),
//!             id_card_number: "110101199001011234".to_string(),
//!             id_card_files: vec!["profile/id_card/id_front_1700000000000.png".to_string()],
//!         }),
//!         ip_asset: None,
//!     },
//!     None,
//! )?;
//!
//! // Poll status until a terminal state; relay the operator's
//! // "I have completed verification" when AwaitingVerification is shown.
//! let status = controller.status();
//! println!("{:?}", status.state);
//! # Ok(())
//! # }
//! ```

/// CDP page wrapper driving the appeal form
pub mod browser;

/// Tunable knobs: endpoints, backoff schedules, timeouts, paths
pub mod config;

/// Strategy selection for obtaining a controllable browser
pub mod connection;

/// State machine and public command surface
pub mod controller;

/// Error taxonomy with CLI exit codes
pub mod errors;

/// Operator handoff at verification checkpoints
pub mod handoff;

/// Locators for the target appeal page flow
pub mod page_model;

/// Task-to-sequence rendering
pub mod script;

/// File staging into the application-owned tree
pub mod staging;

/// Data model shared with the presentation layer
pub mod types;

/// Fallback strategies for the upload widget
pub mod upload;

pub use browser::PageSession;
pub use config::AutomationConfig;
pub use connection::{BrowserConnectionManager, ControllableBrowser};
pub use controller::{AutomationController, CaseRecorder};
pub use errors::{AutomationError, Result, StrategyFailure};
pub use handoff::VerificationHandoff;
pub use page_model::{AppealPageModel, Locator, WidgetLocator};
pub use script::{AutomationSequence, CheckpointKind, Step, render};
pub use staging::FileStagingService;
pub use types::{
    AutomationRequest, AutomationState, AutomationStatus, AutomationTask, ConnectionStrategy,
    FileSelection, IpAssetSnapshot, ProfileSnapshot, ResolvedAttachments, StagedFile,
    UploadAttempt, UploadReport, VerificationOutcome,
};
pub use upload::{UploadStrategy, UploadStrategyKind, UploadStrategySelector, UploadSurface};
