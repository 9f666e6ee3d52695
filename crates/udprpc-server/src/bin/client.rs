//! udprpc client: send one request and print the reply payload.
//!
//! ```text
//! udprpc-client --op read facility,ALL
//! udprpc-client --op monitor register,Weekday1,60 --listen-secs 60
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use udprpc_core::Operation;
use udprpc_server::client::{ClientOptions, RpcClient};

#[derive(Debug, Parser)]
#[command(name = "udprpc-client", about = "Send one request to a udprpc server")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:6789")]
    server: SocketAddr,

    /// READ, WRITE, UPDATE, DELETE, MONITOR, ECHO or RATING.
    #[arg(long)]
    op: Operation,

    /// Comma-separated payload, e.g. `facility,ALL`.
    #[arg(default_value = "")]
    payload: String,

    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 5)]
    attempts: u32,

    /// After the reply, print monitor notifications for this long.
    #[arg(long, default_value_t = 0)]
    listen_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.status_code().as_str(), error = %e, "request failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> udprpc_core::Result<()> {
    let opts = ClientOptions {
        timeout: Duration::from_millis(args.timeout_ms),
        max_attempts: args.attempts.max(1),
        ..ClientOptions::default()
    };
    let client = RpcClient::with_options(args.server, opts).await?;

    let reply = client.call(args.op, &args.payload).await?;
    println!("{}", reply.payload());

    if args.listen_secs > 0 {
        let notes = client
            .listen_notifications(Duration::from_secs(args.listen_secs))
            .await?;
        for note in notes {
            println!("--- update (monitor #{})\n{}", note.request_id(), note.payload());
        }
    }
    Ok(())
}
