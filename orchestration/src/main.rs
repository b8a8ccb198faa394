//! Debate orchestrator server.
//!
//! Serves the HTTP lifecycle endpoints and the realtime hub from one
//! axum router. Configuration comes from the environment (`ARENA_*`
//! variables) with a few per-invocation flag overrides.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use orchestration::app::AppState;
use orchestration::config::ServerConfig;
use orchestration::hub::room::RoomRegistry;
use orchestration::judge::{HttpJudgeGateway, JudgeGateway};
use orchestration::orchestrator::Orchestrator;
use orchestration::http;
use orchestration::store::MemoryStore;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket address to bind (overrides ARENA_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Judging gateway endpoint (overrides ARENA_JUDGE_URL)
    #[arg(long)]
    judge_url: Option<String>,

    /// Allow non-participants to join session rooms as observers
    #[arg(long, default_value_t = false)]
    allow_observers: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::default();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(judge_url) = args.judge_url {
        config.judge_url = judge_url;
    }
    if args.allow_observers {
        config.allow_observers = true;
    }

    let tokens = config.token_service();
    let gateway: Arc<dyn JudgeGateway> = Arc::new(HttpJudgeGateway::new(
        config.judge_url.clone(),
        Duration::from_secs(config.judge_timeout_secs),
    ));
    let orchestrator = Orchestrator::new(
        MemoryStore::new().shared(),
        gateway,
        tokens.clone(),
        config.orchestrator_settings(),
    )
    .shared();

    let state = AppState {
        orchestrator,
        tokens,
        rooms: Arc::new(RoomRegistry::new()),
        allow_observers: config.allow_observers,
        heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        judge = %config.judge_url,
        observers = config.allow_observers,
        "Debate orchestrator listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
