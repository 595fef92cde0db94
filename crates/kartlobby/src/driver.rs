//! Lobby driver: a Tokio task that feeds one lobby.
//!
//! The driver owns the transport inbox and a [`TickScheduler`]. Packets go
//! to [`Lobby::handle_message`], disconnects to
//! [`Lobby::host_disconnected`], and every tick to [`Lobby::update`]. All
//! role access for the lobby happens on this one task.

use std::sync::Arc;

use kartlobby_tick::TickScheduler;
use kartlobby_transport::TransportEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{Lobby, LobbyRole, LobbyState};

/// Handle to a running driver task.
///
/// Dropping the handle stops the driver as well.
pub struct DriverHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stops the driver and waits for it to release the lobby.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "lobby driver task failed");
        }
    }

    /// `true` once the driver loop has exited on its own (transport
    /// closed or lobby terminated).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a driver for `lobby` and runs its `setup` first.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_driver<R: LobbyRole>(
    lobby: Arc<Lobby<R>>,
    inbox: mpsc::UnboundedReceiver<TransportEvent>,
    scheduler: TickScheduler,
) -> DriverHandle {
    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(run(lobby, inbox, scheduler, rx));
    DriverHandle { shutdown: tx, task }
}

async fn run<R: LobbyRole>(
    lobby: Arc<Lobby<R>>,
    mut inbox: mpsc::UnboundedReceiver<TransportEvent>,
    mut scheduler: TickScheduler,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!(tick_rate_hz = scheduler.tick_rate_hz(), "lobby driver started");

    if let Err(e) = lobby.setup() {
        error!(error = %e, "lobby setup failed");
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("lobby driver shutting down");
                break;
            }
            event = inbox.recv() => match event {
                Some(TransportEvent::Data(packet)) => {
                    // Failures are logged by the lobby.
                    let _ = lobby.handle_message(packet.from, &packet.data);
                }
                Some(TransportEvent::Connected(host)) => {
                    debug!(%host, "peer connected");
                }
                Some(TransportEvent::Disconnected(host)) => {
                    if let Err(e) = lobby.host_disconnected(host) {
                        warn!(%host, error = %e, "disconnect handling failed");
                    }
                }
                None => {
                    info!("transport inbox closed");
                    break;
                }
            },
            tick = scheduler.wait_for_tick() => {
                if let Err(e) = lobby.update(tick.ticks) {
                    warn!(tick = tick.tick, error = %e, "lobby update failed");
                }
            }
        }

        if lobby.state() == LobbyState::Terminal {
            info!("lobby terminated");
            break;
        }
    }

    // The last reference may have to join the race-start worker.
    if let Err(e) = tokio::task::spawn_blocking(move || drop(lobby)).await {
        error!(error = %e, "lobby teardown failed");
    }
    info!("lobby driver stopped");
}
