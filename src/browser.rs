//! CDP page wrapper for driving the appeal form

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventFileChooserOpened, SetInterceptFileChooserDialogParams,
};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::page_model::{Locator, WidgetLocator};
use crate::upload::UploadSurface;

/// Attribute used to hand a JS-located element over to native CDP calls
const MARK_ATTR: &str = "data-rg-target";

/// JS helper injected into every locator evaluation
const FIND_HELPERS: &str = r#"
function __rgFindLabeled(scope, label, inner) {
    for (const host of document.querySelectorAll(scope)) {
        if ((host.textContent || '').includes(label)) {
            if (!inner) return host;
            const el = host.querySelector(inner);
            if (el) return el;
        }
    }
    return null;
}
function __rgVisible(el) {
    return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
}
"#;

/// One page of the target site, driven over CDP
///
/// Fills go through JS with synthetic input/change events (the form's
/// widgets re-render on those); clicks go through native CDP events so the
/// page cannot tell them from a human's.
pub struct PageSession {
    page: Page,
}

impl PageSession {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Navigate and wait for the load to settle
    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .with_context(|| format!("failed to navigate to {}", url))?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    /// Fill a field and fire the events the page's widgets listen for
    pub async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        let script = format!(
            r#"(function() {{
                {helpers}
                const el = {expr};
                if (!el) return false;
                el.focus();
                el.value = {value};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            helpers = FIND_HELPERS,
            expr = locator_expr(locator),
            value = js_str(value),
        );
        if !self.eval_bool(&script).await? {
            return Err(anyhow!("element not found for fill: {}", locator));
        }
        Ok(())
    }

    /// Click an element with a native, trusted event
    pub async fn click(&self, locator: &Locator) -> Result<()> {
        self.mark(&locator_expr(locator))
            .await
            .with_context(|| format!("element not found for click: {}", locator))?;
        let result = async {
            let element = self.page.find_element(marked_selector()).await?;
            element.click().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        self.unmark().await;
        result.with_context(|| format!("click failed: {}", locator))
    }

    /// Open a dropdown and pick the option whose text contains `option_text`
    pub async fn select_option(
        &self,
        trigger: &Locator,
        option_scope: &str,
        option_text: &str,
    ) -> Result<()> {
        self.click(trigger).await?;
        // Dropdown options render detached from the trigger, after a beat
        tokio::time::sleep(Duration::from_millis(500)).await;

        let script = format!(
            r#"(function() {{
                for (const option of document.querySelectorAll({scope})) {{
                    if ((option.textContent || '').includes({text})) {{
                        option.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            scope = js_str(option_scope),
            text = js_str(option_text),
        );
        if !self.eval_bool(&script).await? {
            return Err(anyhow!(
                "no dropdown option containing {:?} under {}",
                option_text,
                option_scope
            ));
        }
        Ok(())
    }

    async fn eval_bool(&self, script: &str) -> Result<bool> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JavaScript evaluation failed")?;
        Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn eval_string(&self, script: &str) -> Result<String> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JavaScript evaluation failed")?;
        Ok(result
            .value()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// Tag the element produced by `expr` so native CDP calls can find it
    async fn mark(&self, expr: &str) -> Result<()> {
        let script = format!(
            r#"(function() {{
                {helpers}
                const el = {expr};
                if (!el) return false;
                el.setAttribute('{attr}', '');
                return true;
            }})()"#,
            helpers = FIND_HELPERS,
            expr = expr,
            attr = MARK_ATTR,
        );
        if !self.eval_bool(&script).await? {
            return Err(anyhow!("no element matched"));
        }
        Ok(())
    }

    async fn unmark(&self) {
        let script = format!(
            r#"(function() {{
                for (const el of document.querySelectorAll('[{attr}]')) {{
                    el.removeAttribute('{attr}');
                }}
            }})()"#,
            attr = MARK_ATTR,
        );
        if let Err(e) = self.page.evaluate(script).await {
            warn!("Failed to clear element mark: {}", e);
        }
    }

    /// Locate the widget's file input in JS and mark it for CDP
    ///
    /// Returns an error naming what was missing (scope or input) so the
    /// strategy loop can record a precise failure reason.
    async fn mark_file_input(&self, widget: &WidgetLocator, require_visible: bool) -> Result<()> {
        let script = format!(
            r#"(function() {{
                {helpers}
                const host = {scope_expr};
                if (!host) return 'scope-missing';
                for (const input of host.querySelectorAll({input})) {{
                    if ({require_visible} && !__rgVisible(input)) continue;
                    input.setAttribute('{attr}', '');
                    return 'ok';
                }}
                return 'input-missing';
            }})()"#,
            helpers = FIND_HELPERS,
            scope_expr = locator_expr(&widget.scope),
            input = js_str(&widget.input),
            require_visible = require_visible,
            attr = MARK_ATTR,
        );
        match self.eval_string(&script).await?.as_str() {
            "ok" => Ok(()),
            "scope-missing" => Err(anyhow!("upload widget container not found")),
            "input-missing" => {
                if require_visible {
                    Err(anyhow!("no visible file input inside the widget"))
                } else {
                    Err(anyhow!("no file input inside the widget"))
                }
            }
            other => Err(anyhow!("unexpected mark result: {}", other)),
        }
    }

    /// Feed `files` into the currently marked file input via CDP
    async fn set_files_on_marked(&self, files: &[PathBuf]) -> Result<()> {
        let result = async {
            let element = self.page.find_element(marked_selector()).await?;
            self.page
                .execute(SetFileInputFilesParams {
                    files: files
                        .iter()
                        .map(|p| p.to_string_lossy().to_string())
                        .collect(),
                    node_id: None,
                    backend_node_id: Some(element.backend_node_id.clone()),
                    object_id: None,
                })
                .await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        self.unmark().await;
        result.context("DOM.setFileInputFiles failed")
    }
}

impl UploadSurface for PageSession {
    async fn set_files(
        &self,
        widget: &WidgetLocator,
        files: &[PathBuf],
        require_visible: bool,
    ) -> Result<()> {
        self.mark_file_input(widget, require_visible).await?;
        self.set_files_on_marked(files).await
    }

    async fn intercept_chooser(&self, widget: &WidgetLocator, files: &[PathBuf]) -> Result<()> {
        let mut chooser_events = self
            .page
            .event_listener::<EventFileChooserOpened>()
            .await
            .context("failed to listen for file chooser events")?;
        self.page
            .execute(SetInterceptFileChooserDialogParams { enabled: true })
            .await
            .context("failed to arm file chooser interception")?;

        let result = async {
            self.click_trigger(widget).await?;
            // The chooser event confirms the widget asked for files; with
            // interception armed no native dialog blocks the page
            tokio::time::timeout(Duration::from_secs(5), chooser_events.next())
                .await
                .map_err(|_| anyhow!("file chooser never opened after trigger click"))?
                .ok_or_else(|| anyhow!("file chooser event stream closed"))?;
            self.set_files(widget, files, false).await
        }
        .await;

        if let Err(e) = self
            .page
            .execute(SetInterceptFileChooserDialogParams { enabled: false })
            .await
        {
            warn!("Failed to disarm file chooser interception: {}", e);
        }
        result
    }

    async fn click_trigger(&self, widget: &WidgetLocator) -> Result<()> {
        let script_expr = format!(
            r#"(function() {{
                {helpers}
                const host = {scope_expr};
                if (!host) return null;
                return host.querySelector({trigger});
            }})()"#,
            helpers = FIND_HELPERS,
            scope_expr = locator_expr(&widget.scope),
            trigger = js_str(&widget.trigger),
        );
        self.mark(&script_expr)
            .await
            .with_context(|| format!("upload trigger not found for {}", widget.name))?;
        let result = async {
            let element = self.page.find_element(marked_selector()).await?;
            element.click().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        self.unmark().await;
        result.with_context(|| format!("trigger click failed for {}", widget.name))
    }

    async fn attached_count(&self, widget: &WidgetLocator) -> Result<usize> {
        let script = format!(
            r#"(function() {{
                {helpers}
                const host = {scope_expr};
                if (!host) return 0;
                return host.querySelectorAll({item}).length;
            }})()"#,
            helpers = FIND_HELPERS,
            scope_expr = locator_expr(&widget.scope),
            item = js_str(&widget.attached_item),
        );
        let result = self
            .page
            .evaluate(script)
            .await
            .context("attached-item count query failed")?;
        Ok(result
            .value()
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize)
    }
}

fn marked_selector() -> String {
    format!("[{}]", MARK_ATTR)
}

/// JS expression evaluating to the located element or null
fn locator_expr(locator: &Locator) -> String {
    match locator {
        Locator::Css(css) => format!("document.querySelector({})", js_str(css)),
        Locator::Labeled { scope, label, inner } => format!(
            "__rgFindLabeled({}, {}, {})",
            js_str(scope),
            js_str(label),
            inner
                .as_deref()
                .map(js_str)
                .unwrap_or_else(|| "null".to_string()),
        ),
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}
