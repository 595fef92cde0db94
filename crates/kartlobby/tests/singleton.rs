//! The one-lobby-per-process registry.
//!
//! Every test here touches process-wide state, so they take `SERIAL`
//! first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kartlobby::{
    ClientLobby, GameSetup, Lobby, LobbyBase, LobbyConfig, LobbyError, LobbyState, ServerLobby,
    lobby_is_active,
};
use kartlobby_tick::{Clock, ManualClock};
use kartlobby_transport::{ChannelTransport, HostId, Transport};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn base() -> LobbyBase {
    LobbyBase::new(GameSetup::shared(), Arc::new(ManualClock::new()) as Arc<dyn Clock>)
}

fn server() -> ServerLobby {
    let (transport, _inbox) = ChannelTransport::new(HostId::SERVER);
    ServerLobby::new(LobbyConfig::default(), transport as Arc<dyn Transport>)
}

fn client() -> ClientLobby {
    let (transport, _inbox) = ChannelTransport::new(HostId(1));
    ClientLobby::new("Ana", HostId::SERVER, transport as Arc<dyn Transport>)
}

#[test]
fn test_second_create_fails_while_first_is_alive() {
    let _serial = serial();
    let first = Lobby::create(server(), base()).unwrap();
    assert!(lobby_is_active());

    assert!(matches!(
        Lobby::create(server(), base()),
        Err(LobbyError::AlreadyActive)
    ));
    assert!(matches!(
        Lobby::create(client(), base()),
        Err(LobbyError::AlreadyActive)
    ));

    drop(first);
    assert!(!lobby_is_active());
}

#[test]
fn test_get_returns_the_live_lobby_of_matching_role() {
    let _serial = serial();
    let lobby = Lobby::create(server(), base()).unwrap();

    let found = Lobby::<ServerLobby>::get().expect("server lobby registered");
    assert!(Arc::ptr_eq(&found, &lobby));
    assert!(Lobby::<ClientLobby>::get().is_none());
}

#[test]
fn test_get_returns_none_after_drop() {
    let _serial = serial();
    let lobby = Lobby::create(client(), base()).unwrap();
    drop(lobby);

    assert!(Lobby::<ClientLobby>::get().is_none());
    assert!(!lobby_is_active());
}

#[test]
fn test_create_succeeds_again_after_drop() {
    let _serial = serial();
    drop(Lobby::create(server(), base()).unwrap());
    let again = Lobby::create(client(), base()).unwrap();
    assert_eq!(again.state(), LobbyState::Init);
}

#[test]
fn test_lookup_handle_keeps_lobby_alive() {
    let _serial = serial();
    let lobby = Lobby::create(server(), base()).unwrap();
    let found = Lobby::<ServerLobby>::get().unwrap();

    drop(lobby);
    assert!(lobby_is_active(), "a looked-up handle is an owner too");
    drop(found);
    assert!(!lobby_is_active());
}

#[test]
fn test_detached_lobbies_stay_out_of_the_registry() {
    let _serial = serial();
    let detached = Lobby::detached(server(), base());
    assert!(!lobby_is_active());
    assert!(Lobby::<ServerLobby>::get().is_none());

    let registered = Lobby::create(client(), base()).unwrap();
    drop(detached);
    assert!(lobby_is_active(), "dropping a detached lobby leaves the slot alone");
    drop(registered);
}

#[test]
fn test_worker_is_finished_once_the_lobby_is_gone() {
    let _serial = serial();
    let lobby = Lobby::create(server(), base()).unwrap();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    lobby
        .base()
        .spawn_start_game_worker(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    drop(lobby);
    assert!(finished.load(Ordering::SeqCst));
    assert!(!lobby_is_active());
}
