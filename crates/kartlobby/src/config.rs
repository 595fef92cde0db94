//! Lobby configuration and state machine.

use std::time::Duration;

use kartlobby_tick::TickConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Settings a server lobby runs with.
///
/// Every field has a default, so a partial JSON document is a valid
/// config. Call [`validated`](Self::validated) before use;
/// [`from_json`](Self::from_json) does so for you.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Maximum players admitted while accepting connections.
    pub max_players: usize,

    /// Length of the voting period in seconds.
    pub voting_timeout: f32,

    /// Tracks the server may pick from when nobody votes.
    pub tracks: Vec<String>,

    /// Lap count used when the server picks the race itself.
    pub default_laps: u8,

    /// Kart bound to players who never sent a selection.
    pub default_kart: String,

    /// Pause between everybody reporting loaded and `START_RACE`.
    pub start_race_delay_ms: u64,

    /// Rate of the driver's `update(ticks)` calls. 0 = only on messages.
    pub tick_rate_hz: u32,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            voting_timeout: 30.0,
            tracks: default_tracks(),
            default_laps: 3,
            default_kart: "tux".to_owned(),
            start_race_delay_ms: 1000,
            tick_rate_hz: 10,
        }
    }
}

fn default_tracks() -> Vec<String> {
    ["lighthouse", "zengarden", "cocoa_temple", "snowmountain", "hacienda"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

impl LobbyConfig {
    /// Upper bound on `max_players`: player lists carry a one-byte count.
    pub const MAX_PLAYERS: usize = u8::MAX as usize;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_players` within 1..=[`Self::MAX_PLAYERS`].
    /// - `voting_timeout` finite and non-negative, else the default.
    /// - `default_laps` at least 1.
    /// - an empty `tracks` list falls back to the built-in list.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.max_players == 0 || self.max_players > Self::MAX_PLAYERS {
            tracing::warn!(
                max_players = self.max_players,
                "max_players out of range, clamping"
            );
            self.max_players = self.max_players.clamp(1, Self::MAX_PLAYERS);
        }
        if !self.voting_timeout.is_finite() || self.voting_timeout < 0.0 {
            tracing::warn!(
                voting_timeout = self.voting_timeout,
                "invalid voting_timeout, using default"
            );
            self.voting_timeout = defaults.voting_timeout;
        }
        self.default_laps = self.default_laps.max(1);
        if self.tracks.is_empty() {
            tracing::warn!("no tracks configured, using built-in list");
            self.tracks = defaults.tracks;
        }
        self
    }

    /// Parses and validates a JSON config.
    #[cfg(feature = "json")]
    pub fn from_json(text: &str) -> Result<Self, crate::LobbyError> {
        serde_json::from_str::<Self>(text)
            .map(Self::validated)
            .map_err(crate::LobbyError::Config)
    }

    /// Voting window in whole milliseconds, as sent in `START_SELECTION`.
    pub fn voting_window_ms(&self) -> u32 {
        (f64::from(self.voting_timeout) * 1000.0).round() as u32
    }

    /// Pause between the last world loaded and `START_RACE`.
    pub fn start_race_delay(&self) -> Duration {
        Duration::from_millis(self.start_race_delay_ms)
    }

    /// Scheduler settings for the lobby driver.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig::with_rate(self.tick_rate_hz)
    }
}

// ---------------------------------------------------------------------------
// LobbyState
// ---------------------------------------------------------------------------

/// Where a lobby is in its race cycle.
///
/// ```text
/// Init → Connecting (client) ┐
/// Init → Accepting  (server) ┴→ Selection → Voting → Loading → Racing → Result → Init
/// ```
///
/// - **Init**: constructed, or back from a finished race.
/// - **Connecting**: client waiting for the server's answer and for
///   `START_SELECTION`.
/// - **Accepting**: server admitting players.
/// - **Selection**: players choosing karts.
/// - **Voting**: the voting period is running.
/// - **Loading**: race config fixed, worlds loading.
/// - **Racing**: `START_RACE` seen.
/// - **Result**: race over, waiting for acknowledgements.
/// - **Terminal**: the lobby is being torn down. Reachable from anywhere.
///
/// A server whose roster empties anywhere between Selection and Result
/// falls back to Init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LobbyState {
    Init = 0,
    Connecting,
    Accepting,
    Selection,
    Voting,
    Loading,
    Racing,
    Result,
    Terminal,
}

impl LobbyState {
    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        use LobbyState::*;
        match (self, target) {
            (Terminal, _) => false,
            (_, Terminal) => true,
            (Init, Connecting | Accepting) => true,
            (Connecting | Accepting, Selection) => true,
            (Selection, Voting) => true,
            (Selection | Voting | Loading | Racing, Init) => true,
            (Voting, Loading) => true,
            (Loading, Racing) => true,
            (Racing, Result) => true,
            (Result, Init) => true,
            _ => false,
        }
    }

    /// Returns `true` while votes may still be cast.
    pub fn accepts_votes(self) -> bool {
        matches!(self, Self::Selection | Self::Voting)
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Init,
            1 => Self::Connecting,
            2 => Self::Accepting,
            3 => Self::Selection,
            4 => Self::Voting,
            5 => Self::Loading,
            6 => Self::Racing,
            7 => Self::Result,
            _ => Self::Terminal,
        }
    }
}

impl From<LobbyState> for u8 {
    fn from(state: LobbyState) -> u8 {
        state as u8
    }
}

impl std::fmt::Display for LobbyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::Connecting => "Connecting",
            Self::Accepting => "Accepting",
            Self::Selection => "Selection",
            Self::Voting => "Voting",
            Self::Loading => "Loading",
            Self::Racing => "Racing",
            Self::Result => "Result",
            Self::Terminal => "Terminal",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LobbyState; 9] = [
        LobbyState::Init,
        LobbyState::Connecting,
        LobbyState::Accepting,
        LobbyState::Selection,
        LobbyState::Voting,
        LobbyState::Loading,
        LobbyState::Racing,
        LobbyState::Result,
        LobbyState::Terminal,
    ];

    #[test]
    fn test_race_cycle_transitions_are_allowed() {
        use LobbyState::*;
        let cycle = [Init, Accepting, Selection, Voting, Loading, Racing, Result, Init];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Init.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Selection));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        use LobbyState::*;
        assert!(!Init.can_transition_to(Selection));
        assert!(!Selection.can_transition_to(Loading));
        assert!(!Voting.can_transition_to(Racing));
        assert!(!Accepting.can_transition_to(Voting));
        assert!(!Loading.can_transition_to(Voting));
        assert!(!Racing.can_transition_to(Loading));
    }

    #[test]
    fn test_abandoned_race_may_return_to_init() {
        use LobbyState::*;
        for state in [Selection, Voting, Loading, Racing, Result] {
            assert!(state.can_transition_to(Init), "{state} -> Init");
        }
        assert!(!Connecting.can_transition_to(Init));
        assert!(!Accepting.can_transition_to(Init));
    }

    #[test]
    fn test_terminal_is_reachable_from_everywhere_and_final() {
        for state in ALL {
            if state != LobbyState::Terminal {
                assert!(state.can_transition_to(LobbyState::Terminal));
            }
            assert!(!LobbyState::Terminal.can_transition_to(state));
        }
    }

    #[test]
    fn test_state_u8_round_trip() {
        for state in ALL {
            assert_eq!(LobbyState::from_u8(u8::from(state)), state);
        }
    }

    #[test]
    fn test_accepts_votes() {
        assert!(LobbyState::Selection.accepts_votes());
        assert!(LobbyState::Voting.accepts_votes());
        assert!(!LobbyState::Loading.accepts_votes());
        assert!(!LobbyState::Accepting.accepts_votes());
    }

    #[test]
    fn test_lobby_state_display() {
        assert_eq!(LobbyState::Voting.to_string(), "Voting");
        assert_eq!(LobbyState::Terminal.to_string(), "Terminal");
    }

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.max_players, 8);
        assert_eq!(config.voting_timeout, 30.0);
        assert_eq!(config.default_laps, 3);
        assert_eq!(config.default_kart, "tux");
        assert!(!config.tracks.is_empty());
        assert_eq!(config.voting_window_ms(), 30_000);
    }

    #[test]
    fn test_validated_clamps_bad_values() {
        let config = LobbyConfig {
            max_players: 0,
            voting_timeout: f32::NAN,
            tracks: Vec::new(),
            default_laps: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.max_players, 1);
        assert_eq!(config.voting_timeout, 30.0);
        assert_eq!(config.default_laps, 1);
        assert_eq!(config.tracks, default_tracks());

        let config = LobbyConfig {
            max_players: 1000,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.max_players, LobbyConfig::MAX_PLAYERS);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_from_json_fills_missing_fields() {
        let config =
            LobbyConfig::from_json(r#"{"max_players": 4, "tracks": ["hacienda"]}"#).unwrap();
        assert_eq!(config.max_players, 4);
        assert_eq!(config.tracks, vec!["hacienda".to_owned()]);
        assert_eq!(config.default_kart, "tux");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            LobbyConfig::from_json("{not json"),
            Err(crate::LobbyError::Config(_))
        ));
    }
}
