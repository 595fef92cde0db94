//! One server and two clients running a race cycle in-process.
//!
//! ```text
//! cargo run -p local-race [config.json]
//! RUST_LOG=kartlobby=debug cargo run -p local-race
//! ```

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use kartlobby::DriverHandle;
use kartlobby::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) -> Result<(), Box<dyn Error>> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("timed out waiting for {what}").into());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    info!("{what}");
    Ok(())
}

fn load_config() -> Result<LobbyConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(LobbyConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(LobbyConfig {
            voting_timeout: 5.0,
            start_race_delay_ms: 500,
            ..Default::default()
        }),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    let (server_transport, server_inbox) = ChannelTransport::new(HostId::SERVER);
    let server = Lobby::create(
        ServerLobby::new(config.clone(), server_transport.clone() as Arc<dyn Transport>),
        LobbyBase::with_system_clock(GameSetup::shared()),
    )?;
    let mut drivers: Vec<DriverHandle> = vec![spawn_driver(
        Arc::clone(&server),
        server_inbox,
        TickScheduler::new(config.tick_config()),
    )];

    // Clients are bots sharing this process, so they stay out of the registry.
    let mut clients = Vec::new();
    for (id, name) in [(1, "Ana"), (2, "Bo")] {
        let (transport, inbox) = ChannelTransport::new(HostId(id));
        ChannelTransport::link(&server_transport, &transport);
        let client = Lobby::detached(
            ClientLobby::new(name, HostId::SERVER, transport as Arc<dyn Transport>),
            LobbyBase::with_system_clock(GameSetup::shared()),
        );
        drivers.push(spawn_driver(
            Arc::clone(&client),
            inbox,
            TickScheduler::new(TickConfig::default()),
        ));
        clients.push(client);
    }

    wait_for("both players admitted", || {
        server.with_role(|s, _| s.player_count()) == 2
    })
    .await?;

    // The registered lobby is reachable from anywhere in the process.
    let active = Lobby::<ServerLobby>::get().ok_or("server lobby not registered")?;
    active.with_role(|s, base| s.start_selection(base))?;
    wait_for("selection started", || {
        clients.iter().all(|c| c.state() == LobbyState::Selection)
    })
    .await?;

    for (client, kart) in clients.iter().zip(["tux", "nolok"]) {
        client.with_role(|c, base| c.select_kart(base, kart))?;
    }
    wait_for("voting open", || server.state() == LobbyState::Voting).await?;

    clients[0].with_role(|c, base| c.vote(base, "zengarden", 2, false))?;
    clients[1].with_role(|c, base| c.vote(base, "lighthouse", 4, true))?;

    wait_for("world loading", || server.state() == LobbyState::Loading).await?;
    if let Some(race) = server.snapshot().race {
        info!(track = %race.track, laps = race.laps, reverse = race.reverse, "race picked");
    }

    for client in &clients {
        client.finished_loading_world()?;
    }
    server.finished_loading_world()?;
    wait_for("race started", || {
        server.is_racing() && clients.iter().all(|c| c.is_racing())
    })
    .await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    server.with_role(|s, base| s.race_finished(base))?;
    wait_for("results shown", || {
        clients.iter().all(|c| c.state() == LobbyState::Result)
    })
    .await?;

    for client in &clients {
        client.with_role(|c, base| c.acknowledge_result(base))?;
    }
    wait_for("lobby reopened", || server.state() == LobbyState::Accepting).await?;

    println!("{}", serde_json::to_string_pretty(&server.snapshot())?);

    drop(active);
    for driver in drivers {
        driver.shutdown().await;
    }
    Ok(())
}
