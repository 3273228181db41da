//! Obtaining a controllable browser over the remote-debugging endpoint

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AutomationConfig;
use crate::errors::{AutomationError, Result};
use crate::types::ConnectionStrategy;

/// A live CDP connection plus ownership of whatever backs it
///
/// Attached browsers stay running after release; browser processes we
/// spawned are killed. The ephemeral profile directory lives exactly as
/// long as the connection.
pub struct ControllableBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
    process: Option<Child>,
    _ephemeral_dir: Option<TempDir>,
    strategy: ConnectionStrategy,
}

impl ControllableBrowser {
    /// Which strategy produced this connection
    pub fn strategy(&self) -> ConnectionStrategy {
        self.strategy
    }

    /// A page to drive: the browser's first existing page, or a fresh one
    pub async fn page(&self) -> anyhow::Result<Page> {
        if let Ok(pages) = self.browser.pages().await
            && let Some(page) = pages.into_iter().next()
        {
            return Ok(page);
        }
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open a page on the connected browser")?;
        Ok(page)
    }

    /// Release the connection, killing the browser process if we own it
    pub async fn release(mut self) {
        self.handler_task.abort();
        if let Some(mut child) = self.process.take() {
            match child.kill() {
                Ok(()) => {
                    let _ = child.wait();
                    info!("Stopped automation browser process");
                }
                Err(e) => warn!("Failed to stop automation browser process: {}", e),
            }
        }
    }
}

impl std::fmt::Debug for ControllableBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllableBrowser")
            .field("strategy", &self.strategy)
            .field("owns_process", &self.process.is_some())
            .finish()
    }
}

/// Decides how to obtain a controllable browser instance
///
/// Strategies are tried in the canonical order AttachExisting →
/// PersistentProfile → Ephemeral. A pinned strategy is tried alone and its
/// failure surfaces directly, with no fallback.
pub struct BrowserConnectionManager {
    config: AutomationConfig,
}

impl BrowserConnectionManager {
    pub fn new(config: AutomationConfig) -> Self {
        Self { config }
    }

    /// Acquire a connection, optionally pinned to one strategy
    pub async fn acquire(
        &self,
        preferred: Option<ConnectionStrategy>,
        cancel: &Notify,
        cancelled: impl Fn() -> bool + Copy,
    ) -> Result<ControllableBrowser> {
        if let Some(strategy) = preferred {
            info!("Connection strategy pinned to {:?}", strategy);
            return self.try_strategy(strategy, cancel, cancelled).await;
        }

        let mut last_error: Option<AutomationError> = None;
        for strategy in ConnectionStrategy::PREFERENCE_ORDER {
            if cancelled() {
                return Err(AutomationError::Cancelled);
            }
            match self.try_strategy(strategy, cancel, cancelled).await {
                Ok(browser) => return Ok(browser),
                Err(AutomationError::Cancelled) => return Err(AutomationError::Cancelled),
                Err(e) => {
                    warn!("Connection strategy {:?} failed: {}", strategy, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("no connection strategies configured").into()))
    }

    async fn try_strategy(
        &self,
        strategy: ConnectionStrategy,
        cancel: &Notify,
        cancelled: impl Fn() -> bool + Copy,
    ) -> Result<ControllableBrowser> {
        match strategy {
            ConnectionStrategy::AttachExisting => self.attach_existing(cancel, cancelled).await,
            ConnectionStrategy::PersistentProfile => {
                self.launch_persistent(cancel, cancelled).await
            }
            ConnectionStrategy::Ephemeral => self.launch_ephemeral(cancel, cancelled).await,
        }
    }

    /// Poll the configured endpoint for an already-debuggable browser
    async fn attach_existing(
        &self,
        cancel: &Notify,
        cancelled: impl Fn() -> bool,
    ) -> Result<ControllableBrowser> {
        let endpoint = self.config.debug_endpoint();
        let start = Instant::now();

        for attempt in 1..=self.config.attach_attempts {
            if cancelled() {
                return Err(AutomationError::Cancelled);
            }
            match fetch_ws_url(&endpoint).await {
                Ok(ws_url) => {
                    debug!("Found debuggable browser at {} (attempt {})", endpoint, attempt);
                    let (browser, handler_task) = self.connect(&ws_url).await?;
                    return Ok(ControllableBrowser {
                        browser,
                        handler_task,
                        process: None,
                        _ephemeral_dir: None,
                        strategy: ConnectionStrategy::AttachExisting,
                    });
                }
                Err(e) => {
                    debug!(
                        "Attach probe {}/{} at {} failed: {}",
                        attempt, self.config.attach_attempts, endpoint, e
                    );
                }
            }
            if attempt < self.config.attach_attempts {
                cancellable_sleep(self.config.attach_interval, cancel).await;
            }
        }

        Err(AutomationError::ConnectionTimeout {
            attempts: self.config.attach_attempts,
            elapsed: start.elapsed(),
        })
    }

    /// Launch with the application-owned persistent profile directory
    ///
    /// Browsers reject remote debugging against the user's default profile,
    /// so a dedicated directory is created and reused across sessions to
    /// preserve login state.
    async fn launch_persistent(
        &self,
        cancel: &Notify,
        cancelled: impl Fn() -> bool,
    ) -> Result<ControllableBrowser> {
        let profile_dir = self.config.browser_profile_dir.clone();
        std::fs::create_dir_all(&profile_dir).map_err(|e| {
            anyhow::anyhow!("failed to create browser profile dir {:?}: {}", profile_dir, e)
        })?;

        let child = self.spawn_browser(&profile_dir, self.config.debug_port)?;
        info!(
            "Launched browser with persistent profile {:?} on port {}",
            profile_dir, self.config.debug_port
        );

        let endpoint = self.config.debug_endpoint();
        match self.wait_until_healthy(&endpoint, cancel, &cancelled).await {
            Ok(ws_url) => {
                let (browser, handler_task) = self.connect(&ws_url).await?;
                Ok(ControllableBrowser {
                    browser,
                    handler_task,
                    process: Some(child),
                    _ephemeral_dir: None,
                    strategy: ConnectionStrategy::PersistentProfile,
                })
            }
            Err(e) => {
                cleanup_child(child);
                Err(e)
            }
        }
    }

    /// Launch against a throwaway profile on an OS-assigned free port
    async fn launch_ephemeral(
        &self,
        cancel: &Notify,
        cancelled: impl Fn() -> bool,
    ) -> Result<ControllableBrowser> {
        let temp_dir = tempfile::Builder::new()
            .prefix("rightsguard-ephemeral-")
            .tempdir()
            .map_err(|e| anyhow::anyhow!("failed to create ephemeral profile dir: {}", e))?;
        let port = find_free_port()?;

        let child = self.spawn_browser(temp_dir.path(), port)?;
        info!("Launched ephemeral browser on port {}", port);

        let endpoint = format!("http://{}:{}", self.config.debug_host, port);
        match self.wait_until_healthy(&endpoint, cancel, &cancelled).await {
            Ok(ws_url) => {
                let (browser, handler_task) = self.connect(&ws_url).await?;
                Ok(ControllableBrowser {
                    browser,
                    handler_task,
                    process: Some(child),
                    _ephemeral_dir: Some(temp_dir),
                    strategy: ConnectionStrategy::Ephemeral,
                })
            }
            Err(e) => {
                cleanup_child(child);
                Err(e)
            }
        }
    }

    /// Health-check polling with the configured backoff ladder
    async fn wait_until_healthy(
        &self,
        endpoint: &str,
        cancel: &Notify,
        cancelled: &impl Fn() -> bool,
    ) -> Result<String> {
        let start = Instant::now();
        for attempt in 1..=self.config.launch_attempts {
            cancellable_sleep(self.config.launch_delay(attempt), cancel).await;
            if cancelled() {
                return Err(AutomationError::Cancelled);
            }
            match fetch_ws_url(endpoint).await {
                Ok(ws_url) => {
                    info!(
                        "Debug endpoint {} healthy after {} probe(s)",
                        endpoint, attempt
                    );
                    return Ok(ws_url);
                }
                Err(e) => debug!(
                    "Health probe {}/{} at {} failed: {}",
                    attempt, self.config.launch_attempts, endpoint, e
                ),
            }
        }
        Err(AutomationError::ConnectionTimeout {
            attempts: self.config.launch_attempts,
            elapsed: start.elapsed(),
        })
    }

    /// Complete the CDP handshake and start pumping protocol events
    async fn connect(&self, ws_url: &str) -> Result<(Browser, JoinHandle<()>)> {
        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .context("CDP handshake failed")?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok((browser, handler_task))
    }

    fn spawn_browser(&self, user_data_dir: &Path, port: u16) -> Result<Child> {
        let binary = self.find_browser_binary()?;
        let child = Command::new(&binary)
            .args([
                format!("--remote-debugging-port={}", port),
                format!("--user-data-dir={}", user_data_dir.display()),
                "--no-first-run".to_string(),
                "--no-default-browser-check".to_string(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch browser process {:?}", binary))?;
        Ok(child)
    }

    fn find_browser_binary(&self) -> Result<PathBuf> {
        if let Some(binary) = &self.config.browser_binary {
            return Ok(binary.clone());
        }
        for candidate in default_binary_candidates() {
            if Path::new(candidate).exists() {
                return Ok(PathBuf::from(candidate));
            }
        }
        for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if command_exists(name) {
                return Ok(PathBuf::from(name));
            }
        }
        Err(anyhow::anyhow!(
            "no Chromium-family browser found; install one or configure an explicit binary path"
        )
        .into())
    }
}

fn cleanup_child(mut child: Child) {
    if child.kill().is_ok() {
        let _ = child.wait();
    }
}

/// Ask the debug endpoint for its WebSocket debugger URL
async fn fetch_ws_url(endpoint: &str) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let version: serde_json::Value = client
        .get(format!("{}/json/version", endpoint))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("debug endpoint returned no webSocketDebuggerUrl"))
}

fn default_binary_candidates() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &[
            "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
            "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
        ]
    }
    #[cfg(target_os = "macos")]
    {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    }
}

fn command_exists(command: &str) -> bool {
    #[cfg(unix)]
    {
        Command::new("which")
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        Command::new("where")
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

fn find_free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

async fn cancellable_sleep(duration: Duration, cancel: &Notify) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.notified() => {}
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;
