//! Geostrike Sync Client
//!
//! Connects to the game server, pulls every fetchable collection, and logs
//! entity updates and connection state changes until Ctrl-C.

use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geostrike_sync::{EntityKind, SyncContext, SyncEvent, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Geostrike Sync v{}", VERSION);

    let ctx = SyncContext::from_env().context("failed to build sync context")?;
    info!(endpoint = %ctx.config().connection.endpoint, "connecting");

    let mut events = ctx.subscribe_all();
    ctx.start().await.context("initial connection failed")?;

    for kind in EntityKind::ALL {
        if kind.fetch_request().is_some() {
            ctx.request(kind)
                .with_context(|| format!("failed to request {}", kind))?;
        }
    }

    let mut report = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
            event = events.recv() => match event {
                Some(SyncEvent::EntitiesUpdated { kinds, generation }) => {
                    for kind in kinds {
                        let count = match kind {
                            EntityKind::Missile => ctx.missiles().len(),
                            EntityKind::Landmine => ctx.landmines().len(),
                            EntityKind::Loot => ctx.loot().len(),
                            EntityKind::Other => ctx.others().len(),
                            EntityKind::Player => ctx.player_positions().len(),
                        };
                        info!(%kind, count, generation, "collection updated");
                    }
                }
                Some(SyncEvent::ConnectionStateChanged(status)) => {
                    info!(
                        state = ?status.state,
                        attempt = status.reconnect_attempt,
                        "connection state"
                    );
                }
                None => {
                    warn!("event bus closed");
                    break;
                }
            },
            _ = report.tick() => {
                let status = ctx.status();
                info!(
                    state = ?status.state,
                    healthy = ctx.connection_healthy(),
                    missiles = ctx.missiles().len(),
                    landmines = ctx.landmines().len(),
                    loot = ctx.loot().len(),
                    players = ctx.player_positions().len(),
                    "status"
                );
            }
        }
    }

    ctx.shutdown();
    Ok(())
}
