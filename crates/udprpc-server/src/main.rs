//! udprpc server
//!
//! - UDP endpoint, one datagram per request/reply
//! - at-most-once (default) or at-least-once invocation semantics
//! - facility booking service with monitor notifications
//! - metrics snapshot logged on Ctrl-C

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use udprpc_server::app_state::AppState;
use udprpc_server::config::{self, Semantics};
use udprpc_server::transport::UdpServer;

#[derive(Debug, Parser)]
#[command(name = "udprpc-server", about = "UDP facility booking server")]
struct Args {
    /// YAML config file; defaults apply when it does not exist.
    #[arg(long, default_value = "udprpc.yaml")]
    config: PathBuf,

    /// Overrides `server.semantics` from the config file.
    #[arg(long, value_enum)]
    semantics: Option<Semantics>,

    /// Overrides `server.listen` from the config file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.status_code().as_str(), error = %e, "udprpc-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> udprpc_core::Result<()> {
    let mut cfg = config::load_or_default(&args.config)?;
    if let Some(semantics) = args.semantics {
        cfg.server.semantics = semantics;
    }
    if let Some(listen) = args.listen {
        cfg.server.listen = listen;
    }

    let state = AppState::new(cfg)?;
    let metrics = state.metrics();
    let server = UdpServer::bind(state).await?;

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler failed, shutting down");
            }
        })
        .await?;

    tracing::info!(metrics = %metrics.render(), "final metrics");
    Ok(())
}
