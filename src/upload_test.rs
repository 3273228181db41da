// Unit tests for the upload strategy selection loop

use super::*;
use crate::page_model::{Locator, WidgetLocator};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

fn widget() -> WidgetLocator {
    WidgetLocator {
        name: "id card documents".to_string(),
        scope: Locator::labeled(".el-form-item", "证件证明", None),
        input: r#"input[type="file"]"#.to_string(),
        trigger: ".el-upload".to_string(),
        attached_item: ".el-upload-list__item".to_string(),
    }
}

fn temp_files(count: usize) -> (TempDir, Vec<PathBuf>) {
    let temp = TempDir::new().unwrap();
    let files = (0..count)
        .map(|i| {
            let path = temp.path().join(format!("evidence_{i}.png"));
            fs::write(&path, b"not-really-a-png").unwrap();
            path
        })
        .collect();
    (temp, files)
}

fn fast_selector() -> UploadStrategySelector {
    UploadStrategySelector::new(std::time::Duration::from_millis(5))
}

/// Scripted stand-in for a page: records calls, succeeds on a chosen one
#[derive(Default)]
struct MockSurface {
    calls: Mutex<Vec<String>>,
    /// Call name after which the widget reports attached items
    succeed_after: Option<&'static str>,
    attached: Mutex<usize>,
}

impl MockSurface {
    fn succeeding_after(call: &'static str) -> Self {
        Self {
            succeed_after: Some(call),
            ..Default::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
        if self.succeed_after == Some(call) {
            *self.attached.lock().unwrap() = 1;
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl UploadSurface for MockSurface {
    async fn set_files(
        &self,
        _widget: &WidgetLocator,
        _files: &[PathBuf],
        require_visible: bool,
    ) -> anyhow::Result<()> {
        let call = if require_visible {
            "set_files_visible"
        } else {
            "set_files_hidden"
        };
        self.record(call);
        Ok(())
    }

    async fn intercept_chooser(
        &self,
        _widget: &WidgetLocator,
        _files: &[PathBuf],
    ) -> anyhow::Result<()> {
        self.record("intercept_chooser");
        Ok(())
    }

    async fn click_trigger(&self, _widget: &WidgetLocator) -> anyhow::Result<()> {
        self.record("click_trigger");
        Ok(())
    }

    async fn attached_count(&self, _widget: &WidgetLocator) -> anyhow::Result<usize> {
        Ok(*self.attached.lock().unwrap())
    }
}

#[tokio::test]
async fn test_first_strategy_wins_immediately() {
    let (_temp, files) = temp_files(2);
    let surface = MockSurface::succeeding_after("set_files_hidden");
    let cancel = tokio::sync::Notify::new();

    let report = fast_selector()
        .upload(&surface, &widget(), &files, &cancel, || false)
        .await
        .unwrap();

    assert_eq!(report.attempts.len(), 1);
    assert!(report.attempts[0].succeeded);
    assert_eq!(report.attempts[0].strategy, "set-on-hidden-input");
    assert_eq!(surface.calls(), vec!["set_files_hidden"]);
}

#[tokio::test]
async fn test_third_strategy_wins_and_loop_stops() {
    let (_temp, files) = temp_files(1);
    let surface = MockSurface::succeeding_after("intercept_chooser");
    let cancel = tokio::sync::Notify::new();

    let report = fast_selector()
        .upload(&surface, &widget(), &files, &cancel, || false)
        .await
        .unwrap();

    // Exactly one succeeded attempt (the third), and no fourth is made
    assert_eq!(report.attempts.len(), 3);
    assert_eq!(
        report
            .attempts
            .iter()
            .filter(|attempt| attempt.succeeded)
            .count(),
        1
    );
    assert!(report.attempts[2].succeeded);
    assert_eq!(report.attempts[2].strategy, "intercept-file-chooser");
    assert!(
        !surface.calls().contains(&"click_trigger".to_string()),
        "click-then-set must not run after a success"
    );
}

#[tokio::test]
async fn test_exhaustion_carries_per_strategy_reasons() {
    let (_temp, files) = temp_files(1);
    let surface = MockSurface::default();
    let cancel = tokio::sync::Notify::new();

    let err = fast_selector()
        .upload(&surface, &widget(), &files, &cancel, || false)
        .await
        .unwrap_err();

    match err {
        crate::errors::AutomationError::UploadExhausted { target, failures } => {
            assert_eq!(target, "id card documents");
            assert_eq!(failures.len(), DEFAULT_STRATEGIES.len());
        }
        other => panic!("expected UploadExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_file_aborts_before_dom_interaction() {
    let surface = MockSurface::default();
    let cancel = tokio::sync::Notify::new();
    let files = vec![PathBuf::from("/definitely/not/here.png")];

    let err = fast_selector()
        .upload(&surface, &widget(), &files, &cancel, || false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        crate::errors::AutomationError::InvalidUploadFile { .. }
    ));
    assert!(surface.calls().is_empty(), "no DOM interaction expected");
}

#[tokio::test]
async fn test_empty_file_aborts_before_dom_interaction() {
    let temp = TempDir::new().unwrap();
    let empty = temp.path().join("empty.png");
    fs::write(&empty, b"").unwrap();

    let surface = MockSurface::default();
    let cancel = tokio::sync::Notify::new();

    let err = fast_selector()
        .upload(&surface, &widget(), &[empty], &cancel, || false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        crate::errors::AutomationError::InvalidUploadFile { .. }
    ));
    assert!(surface.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_the_loop() {
    let (_temp, files) = temp_files(1);
    let surface = MockSurface::default();
    let cancel = tokio::sync::Notify::new();

    let err = fast_selector()
        .upload(&surface, &widget(), &files, &cancel, || true)
        .await
        .unwrap_err();

    assert!(matches!(err, crate::errors::AutomationError::Cancelled));
    assert!(surface.calls().is_empty());
}

#[tokio::test]
async fn test_apply_failure_records_reason_and_continues() {
    // A surface whose direct set calls error, with interception succeeding
    struct FlakySurface {
        inner: MockSurface,
    }

    impl UploadSurface for FlakySurface {
        async fn set_files(
            &self,
            _widget: &WidgetLocator,
            _files: &[PathBuf],
            _require_visible: bool,
        ) -> anyhow::Result<()> {
            anyhow::bail!("no file input inside the widget")
        }

        async fn intercept_chooser(
            &self,
            widget: &WidgetLocator,
            files: &[PathBuf],
        ) -> anyhow::Result<()> {
            self.inner.intercept_chooser(widget, files).await
        }

        async fn click_trigger(&self, widget: &WidgetLocator) -> anyhow::Result<()> {
            self.inner.click_trigger(widget).await
        }

        async fn attached_count(&self, widget: &WidgetLocator) -> anyhow::Result<usize> {
            self.inner.attached_count(widget).await
        }
    }

    let (_temp, files) = temp_files(1);
    let surface = FlakySurface {
        inner: MockSurface::succeeding_after("intercept_chooser"),
    };
    let cancel = tokio::sync::Notify::new();

    let report = fast_selector()
        .upload(&surface, &widget(), &files, &cancel, || false)
        .await
        .unwrap();

    assert_eq!(report.attempts.len(), 3);
    assert!(!report.attempts[0].succeeded);
    assert!(!report.attempts[1].succeeded);
    assert!(report.attempts[2].succeeded);
}
