//! Terminal client: join a session room and stream its state.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use arena_client::{ArenaClient, ClientConfig, ClientEvent};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Realtime endpoint of the orchestrator
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Transport token asserting your identity
    #[arg(long)]
    token: String,

    /// Session to join
    #[arg(long)]
    session: String,
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
    let (client, mut events) = ArenaClient::connect(ClientConfig::new(args.server, args.token));

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Connected => {
                info!(session = %args.session, "Connected; joining session room");
                client.join_session(&args.session)?;
            }
            ClientEvent::StateUpdated(snapshot) => {
                info!(
                    status = %snapshot.session.status,
                    turns = snapshot.turns.len(),
                    "Session state"
                );
            }
            ClientEvent::TurnReady {
                speaker,
                order_index,
            } => {
                info!(speaker = %speaker, order_index, "Turn open");
            }
            ClientEvent::Adjudicated { winner, .. } => {
                info!(winner = %winner, "Session settled");
            }
            ClientEvent::ServerError { code, message } => {
                warn!(code = %code, "Server error: {}", message);
            }
            ClientEvent::SyncFailed { attempts } => {
                warn!(attempts, "Realtime sync failed; giving up");
                break;
            }
            ClientEvent::Disconnected => {
                info!("Disconnected");
                break;
            }
        }
    }

    Ok(())
}
