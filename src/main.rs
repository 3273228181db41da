#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rightsguard::{
    AutomationConfig, AutomationController, AutomationError, AutomationRequest, AutomationState,
    ConnectionStrategy, FileStagingService, IpAssetSnapshot, ProfileSnapshot,
};

#[derive(Parser)]
#[command(name = "rightsguard")]
#[command(about = "Copyright-appeal submission automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the staging/profile data root
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one appeal submission to a terminal state
    Appeal {
        /// Link to the infringing content
        #[arg(long)]
        infringing_url: String,

        /// Link to the original content
        #[arg(long)]
        original_url: Option<String>,

        /// JSON file holding the personal profile snapshot
        #[arg(long)]
        profile: Option<PathBuf>,

        /// JSON file holding the IP-asset snapshot
        #[arg(long)]
        ip_asset: Option<PathBuf>,

        /// Pin one connection strategy (attach|profile|ephemeral)
        #[arg(long)]
        strategy: Option<ConnectionStrategy>,

        /// Remote-debugging port to attach to or launch on
        #[arg(long)]
        debug_port: Option<u16>,

        /// Explicit browser binary, bypassing discovery
        #[arg(long)]
        browser_binary: Option<PathBuf>,

        /// Bound on each operator verification wait, in seconds
        #[arg(long)]
        verification_timeout: Option<u64>,
    },

    /// Copy a file into the application-owned staging tree
    Stage {
        /// File to stage
        source: PathBuf,

        /// Staging category (e.g. "profile")
        #[arg(long)]
        category: String,

        /// Staging subcategory (e.g. "id_card")
        #[arg(long)]
        subcategory: String,
    },

    /// Resolve a staged relative identifier to an absolute path
    Resolve {
        /// Relative identifier returned by `stage`
        relative_path: String,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => {}
        Err(err) => {
            let error_json = json!({
                "error": true,
                "message": err.to_string(),
                "exit_code": err.exit_code(),
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );
            eprintln!("Error: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}

async fn run() -> Result<(), AutomationError> {
    // Logs to stderr so JSON output on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rightsguard=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AutomationConfig::default();
    if let Some(root) = &cli.data_root {
        config.staging_root = root.join("staging");
        config.browser_profile_dir = root.join("browser-profile");
    }

    match cli.command {
        Commands::Appeal {
            infringing_url,
            original_url,
            profile,
            ip_asset,
            strategy,
            debug_port,
            browser_binary,
            verification_timeout,
        } => {
            if let Some(port) = debug_port {
                config.debug_port = port;
            }
            if let Some(binary) = browser_binary {
                config.browser_binary = Some(binary);
            }
            if let Some(secs) = verification_timeout {
                config.verification_timeout = Duration::from_secs(secs);
            }

            let profile = profile.map(load_json::<ProfileSnapshot>).transpose()?;
            let ip_asset = ip_asset.map(load_json::<IpAssetSnapshot>).transpose()?;

            run_appeal(
                config,
                AutomationRequest {
                    infringing_url,
                    original_url,
                    profile,
                    ip_asset,
                },
                strategy,
            )
            .await
        }

        Commands::Stage {
            source,
            category,
            subcategory,
        } => {
            let staging = FileStagingService::new(config.staging_root);
            let staged = staging.stage(&source, &category, &subcategory)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&staged)
                    .map_err(|e| AutomationError::Other(e.into()))?
            );
            Ok(())
        }

        Commands::Resolve { relative_path } => {
            let staging = FileStagingService::new(config.staging_root);
            let absolute = staging.resolve(&relative_path)?;
            println!(
                "{}",
                json!({ "relativePath": relative_path, "absolutePath": absolute })
            );
            Ok(())
        }
    }
}

/// Drive one task to a terminal state, relaying operator confirmations
async fn run_appeal(
    config: AutomationConfig,
    request: AutomationRequest,
    strategy: Option<ConnectionStrategy>,
) -> Result<(), AutomationError> {
    let controller = Arc::new(AutomationController::new(config));
    controller.start(request, strategy)?;

    // Ctrl-C requests cooperative cancellation instead of killing the run
    let interrupt_controller = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, stopping the task...");
            interrupt_controller.stop();
        }
    });

    let mut last_step: Option<String> = None;
    let mut prompt: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        let status = controller.status();

        if status.current_step != last_step {
            if let Some(step) = &status.current_step {
                eprintln!("[{}] {}", status.state, step);
            }
            last_step = status.current_step.clone();
        }

        let at_checkpoint = matches!(
            status.state,
            AutomationState::AwaitingVerification | AutomationState::AwaitingFinalConfirmation
        );
        if at_checkpoint && prompt.as_ref().is_none_or(|task| task.is_finished()) {
            let confirm_controller = controller.clone();
            prompt = Some(tokio::task::spawn_blocking(move || {
                eprintln!("Complete the verification in the browser, then press Enter...");
                let mut line = String::new();
                let _ = std::io::stdin().read_line(&mut line);
                confirm_controller.continue_after_verification();
            }));
        }

        if status.state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let status = controller.status();
    println!(
        "{}",
        serde_json::to_string_pretty(&status).map_err(|e| AutomationError::Other(e.into()))?
    );

    match status.state {
        AutomationState::Completed => Ok(()),
        AutomationState::Cancelled => Err(AutomationError::Cancelled),
        _ => Err(AutomationError::Other(anyhow::anyhow!(
            "{}",
            status
                .error
                .unwrap_or_else(|| "automation failed".to_string())
        ))),
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: PathBuf) -> Result<T, AutomationError> {
    let raw = std::fs::read_to_string(&path)
        .map_err(|_| AutomationError::FileNotFound(path.clone()))?;
    serde_json::from_str(&raw).map_err(|e| {
        AutomationError::IncompleteTaskData(format!("could not parse {:?}: {}", path, e))
    })
}
