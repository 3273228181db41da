//! Rendering a task into a concrete automation sequence

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{AutomationError, Result};
use crate::page_model::{AppealPageModel, Locator, WidgetLocator};
use crate::types::{AutomationTask, ResolvedAttachments};

/// Which kind of human checkpoint a pause represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointKind {
    /// Mid-flow verification (slider CAPTCHA, SMS code)
    Verification,
    /// Operator review before the final submit click
    FinalConfirmation,
}

/// One scripted interaction with the target page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Navigate {
        url: String,
    },
    Fill {
        label: String,
        locator: Locator,
        value: String,
    },
    SelectOption {
        label: String,
        trigger: Locator,
        option_scope: String,
        option_text: String,
    },
    Click {
        label: String,
        locator: Locator,
    },
    UploadFiles {
        label: String,
        widget: WidgetLocator,
        files: Vec<PathBuf>,
    },
    AwaitVerification {
        label: String,
        kind: CheckpointKind,
    },
    /// Give the page time to react before the next interaction
    Settle {
        millis: u64,
    },
}

impl Step {
    /// Short human label shown in status updates
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate { url } => format!("navigate to {}", url),
            Step::Fill { label, .. } => format!("fill {}", label),
            Step::SelectOption { label, .. } => format!("select {}", label),
            Step::Click { label, .. } => format!("click {}", label),
            Step::UploadFiles { label, files, .. } => {
                format!("upload {} ({} files)", label, files.len())
            }
            Step::AwaitVerification { label, .. } => format!("awaiting operator: {}", label),
            Step::Settle { millis } => format!("settle {}ms", millis),
        }
    }
}

/// An ordered, fully-resolved sequence of steps for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationSequence {
    pub steps: Vec<Step>,
}

impl AutomationSequence {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Render `task` into an automation sequence
///
/// Pure function: no I/O, no clock. File paths arrive pre-resolved in
/// `attachments`, so identical inputs always render identical sequences.
/// Missing required data fails fast with `IncompleteTaskData` before any
/// browser interaction can begin.
pub fn render(
    task: &AutomationTask,
    attachments: &ResolvedAttachments,
    page: &AppealPageModel,
) -> Result<AutomationSequence> {
    validate(task, attachments)?;

    let profile = &task.profile;
    let mut steps = vec![
        Step::Navigate {
            url: page.form_url.clone(),
        },
        fill("real name", &page.real_name, &profile.name),
        fill("phone number", &page.phone, &profile.phone),
        fill("email", &page.email, &profile.email),
        fill("id card number", &page.id_card_number, &profile.id_card_number),
        Step::UploadFiles {
            label: page.id_card_upload.name.clone(),
            widget: page.id_card_upload.clone(),
            files: attachments.id_card.clone(),
        },
        Step::AwaitVerification {
            label: "identity verification (captcha / SMS)".to_string(),
            kind: CheckpointKind::Verification,
        },
        click("next", &page.next_button),
        Step::Settle { millis: 2000 },
    ];

    if let Some(asset) = &task.ip_asset {
        steps.push(fill("rights owner", &page.owner, &asset.owner));
        steps.push(Step::SelectOption {
            label: "work type".to_string(),
            trigger: page.work_type_trigger.clone(),
            option_scope: page.work_type_option_scope.clone(),
            option_text: asset.work_type.clone(),
        });
        steps.push(fill("work name", &page.work_name, &asset.work_name));
        steps.push(fill("work start date", &page.work_date_start, &asset.work_start_date));
        steps.push(fill("work end date", &page.work_date_end, &asset.work_end_date));

        if let (Some(start), Some(end)) = (&asset.auth_start_date, &asset.auth_end_date) {
            steps.push(fill("authorization start date", &page.auth_date_start, start));
            steps.push(fill("authorization end date", &page.auth_date_end, end));
        }
        if !attachments.auth_docs.is_empty() {
            steps.push(Step::UploadFiles {
                label: page.auth_upload.name.clone(),
                widget: page.auth_upload.clone(),
                files: attachments.auth_docs.clone(),
            });
        }
        if !attachments.proof_docs.is_empty() {
            steps.push(Step::UploadFiles {
                label: page.proof_upload.name.clone(),
                widget: page.proof_upload.clone(),
                files: attachments.proof_docs.clone(),
            });
        }
        steps.push(click("next", &page.next_button));
        steps.push(Step::Settle { millis: 2000 });
    }

    steps.push(fill("infringing link", &page.infringing_url, &task.infringing_url));
    steps.push(fill("complaint description", &page.description, &page.description_text));
    if let Some(original) = &task.original_url {
        steps.push(fill("original link", &page.original_url, original));
    }
    steps.push(click("guarantee checkbox", &page.guarantee_checkbox));
    steps.push(Step::AwaitVerification {
        label: "final review before submission".to_string(),
        kind: CheckpointKind::FinalConfirmation,
    });
    steps.push(click("submit", &page.submit_button));
    steps.push(Step::Settle { millis: 2000 });

    Ok(AutomationSequence { steps })
}

fn validate(task: &AutomationTask, attachments: &ResolvedAttachments) -> Result<()> {
    let mut missing = Vec::new();

    if task.infringing_url.trim().is_empty() {
        missing.push("infringing URL");
    } else if Url::parse(&task.infringing_url).is_err() {
        return Err(AutomationError::IncompleteTaskData(format!(
            "infringing URL is not a valid URL: {}",
            task.infringing_url
        )));
    }

    let profile = &task.profile;
    if profile.name.trim().is_empty() {
        missing.push("profile name");
    }
    if profile.phone.trim().is_empty() {
        missing.push("profile phone");
    }
    if profile.email.trim().is_empty() {
        missing.push("profile email");
    }
    if profile.id_card_number.trim().is_empty() {
        missing.push("profile id card number");
    }
    if attachments.id_card.is_empty() {
        missing.push("staged id card documents");
    }

    if let Some(asset) = &task.ip_asset {
        if asset.owner.trim().is_empty() {
            missing.push("ip asset owner");
        }
        if asset.work_name.trim().is_empty() {
            missing.push("ip asset work name");
        }
        if asset.work_type.trim().is_empty() {
            missing.push("ip asset work type");
        }
    }

    if !missing.is_empty() {
        return Err(AutomationError::IncompleteTaskData(missing.join(", ")));
    }
    Ok(())
}

fn fill(label: &str, locator: &Locator, value: &str) -> Step {
    Step::Fill {
        label: label.to_string(),
        locator: locator.clone(),
        value: value.to_string(),
    }
}

fn click(label: &str, locator: &Locator) -> Step {
    Step::Click {
        label: label.to_string(),
        locator: locator.clone(),
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod script_test;
