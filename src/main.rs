//! Migrate-then-serve startup orchestrator.
//!
//! Brings the database schema to the latest version, then becomes the
//! application server. Intended as a container entrypoint.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                     STARTUP ORCHESTRATOR                          │
//!   │                                                                   │
//!   │  ┌────────┐   ┌──────────┐   ┌───────────┐   exit 0   ┌────────┐ │
//!   │  │ config │──▶│ identity │──▶│ migrating │──────────▶│serving │─┼──▶ uvicorn --host 0.0.0.0
//!   │  └────────┘   └──────────┘   └─────┬─────┘            └───┬────┘ │     --port 8000 --proxy-headers
//!   │                                    │ non-zero /            │      │
//!   │                                    │ unlaunchable          │      │
//!   │                                    ▼                       │      │
//!   │                               ┌────────┐     signals ──────┘      │
//!   │                               │ failed │     (forwarded)          │
//!   │                               └────────┘                          │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use startup_orchestrator::config::resolve_config;
use startup_orchestrator::error::EXIT_SOFTWARE;
use startup_orchestrator::observability::init_logging;
use startup_orchestrator::{launch, OrchestratorError, StartupPlan};

#[derive(Parser)]
#[command(name = "startup-orchestrator")]
#[command(about = "Run schema migrations, then exec the application server", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML file overriding the built-in command lines and policies.
    #[arg(short, long, env = "STARTUP_ORCHESTRATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Print the resolved startup plan as JSON and exit without running it.
    #[arg(long)]
    print_plan: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let e = OrchestratorError::from(e);
            eprintln!("startup-orchestrator: {e}");
            return exit_code(e.exit_code());
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("startup-orchestrator: logging disabled: {e}");
    }

    if cli.print_plan {
        let plan = StartupPlan::from_config(&config);
        return match serde_json::to_string_pretty(&plan) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render startup plan");
                exit_code(EXIT_SOFTWARE)
            }
        };
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "startup-orchestrator starting"
    );

    match launch(&config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            tracing::error!(error = %e, exit_code = code, "Startup orchestration ended");
            exit_code(code)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
