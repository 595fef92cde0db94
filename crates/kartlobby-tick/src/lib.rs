//! Time for the kart lobby.
//!
//! Three pieces live here:
//!
//! - [`Clock`] — the engine's monotonic millisecond clock, with a real
//!   [`SystemClock`] and a hand-driven [`ManualClock`] for tests and
//!   replays.
//! - [`VotingTimer`] — the lock-free voting deadline shared by the game
//!   thread, the network thread and the lobby roles.
//! - [`TickScheduler`] — a fixed-rate loop that tells the lobby how many
//!   game ticks elapsed since its last `update`.
//!
//! # Integration
//!
//! The scheduler sits inside the lobby driver's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = inbox.recv() => { /* dispatch to the lobby */ }
//!         info = scheduler.wait_for_tick() => lobby.update(info.ticks),
//!     }
//! }
//! ```

mod clock;
mod scheduler;
mod voting;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{TickConfig, TickInfo, TickScheduler};
pub use voting::VotingTimer;
