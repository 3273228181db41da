use std::path::PathBuf;
use std::time::Duration;

/// Tunable knobs for the automation engine
///
/// Defaults match the live appeal workflow; tests shrink the timings and
/// point paths at temp directories.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Host of the remote-debugging endpoint
    pub debug_host: String,
    /// Port used for AttachExisting and PersistentProfile connections
    pub debug_port: u16,
    /// Attempts when probing an already-running debuggable browser
    pub attach_attempts: u32,
    /// Delay between attach probes
    pub attach_interval: Duration,
    /// Delay before the first health probe after launching a browser
    pub launch_initial_delay: Duration,
    /// Backoff ladder for post-launch health probes; the last entry repeats
    pub launch_backoff: Vec<Duration>,
    /// Maximum post-launch health probes before ConnectionTimeout
    pub launch_attempts: u32,
    /// Wait after each upload strategy before counting attached items
    pub upload_settle: Duration,
    /// Bound on each operator verification wait
    pub verification_timeout: Duration,
    /// Root of the staged-file tree
    pub staging_root: PathBuf,
    /// Persistent browser profile directory for PersistentProfile launches
    pub browser_profile_dir: PathBuf,
    /// Explicit browser binary, bypassing discovery
    pub browser_binary: Option<PathBuf>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        let app_data = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rightsguard");

        Self {
            debug_host: "127.0.0.1".to_string(),
            debug_port: 9222,
            attach_attempts: 3,
            attach_interval: Duration::from_millis(500),
            launch_initial_delay: Duration::from_millis(500),
            launch_backoff: vec![
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            launch_attempts: 10,
            upload_settle: Duration::from_millis(1500),
            verification_timeout: Duration::from_secs(600),
            staging_root: app_data.join("staging"),
            browser_profile_dir: app_data.join("browser-profile"),
            browser_binary: None,
        }
    }
}

impl AutomationConfig {
    /// Base URL of the remote-debugging HTTP endpoint
    pub fn debug_endpoint(&self) -> String {
        format!("http://{}:{}", self.debug_host, self.debug_port)
    }

    /// Backoff delay before launch-health probe number `attempt` (1-based)
    pub fn launch_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.launch_initial_delay;
        }
        let idx = (attempt as usize - 2).min(self.launch_backoff.len().saturating_sub(1));
        self.launch_backoff
            .get(idx)
            .copied()
            .unwrap_or(self.launch_initial_delay)
    }
}
