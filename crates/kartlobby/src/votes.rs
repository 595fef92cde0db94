//! The per-race vote map and its tally.

use std::collections::BTreeMap;

use kartlobby_protocol::PeerVote;
use kartlobby_transport::HostId;

use crate::RaceConfig;

/// Votes cast during the current race cycle, one per host.
///
/// Keys are sparse; iteration is in ascending host id order. Not
/// synchronized: [`LobbyBase`](crate::LobbyBase) keeps it behind a mutex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSet {
    votes: BTreeMap<HostId, PeerVote>,
}

impl VoteSet {
    /// Creates an empty vote set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `vote` for `host`, replacing any earlier vote.
    pub fn add(&mut self, host: HostId, vote: PeerVote) {
        self.votes.insert(host, vote);
    }

    /// The vote cast by `host`, if any.
    pub fn get(&self, host: HostId) -> Option<&PeerVote> {
        self.votes.get(&host)
    }

    /// Drops the vote of `host`, returning it.
    pub fn remove(&mut self, host: HostId) -> Option<PeerVote> {
        self.votes.remove(&host)
    }

    /// Number of hosts that have voted.
    pub fn count(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Returns `true` if `host` has voted.
    pub fn contains(&self, host: HostId) -> bool {
        self.votes.contains_key(&host)
    }

    /// `(host, vote)` pairs in ascending host id order.
    pub fn iter(&self) -> impl Iterator<Item = (HostId, &PeerVote)> {
        self.votes.iter().map(|(host, vote)| (*host, vote))
    }

    /// Forgets every vote.
    pub fn clear(&mut self) {
        self.votes.clear();
    }

    /// Picks the race configuration with the most votes.
    ///
    /// Votes count per `(track, laps, reverse)` combination. On a tie the
    /// lowest lap count wins, then forward over reverse, then the smallest
    /// track name. `None` when nobody voted.
    pub fn tally(&self) -> Option<RaceConfig> {
        // Key order is the tie-break order.
        let mut counts: BTreeMap<(u8, bool, &str), usize> = BTreeMap::new();
        for vote in self.votes.values() {
            *counts
                .entry((vote.num_laps, vote.reverse, vote.track_name.as_str()))
                .or_default() += 1;
        }

        let mut best: Option<((u8, bool, &str), usize)> = None;
        for (key, count) in counts {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((key, count)),
            }
        }

        best.map(|((laps, reverse, track), _)| RaceConfig::new(track, laps, reverse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(track: &str, laps: u8, reverse: bool) -> PeerVote {
        PeerVote::new("player", track, laps, reverse)
    }

    #[test]
    fn test_revote_replaces_previous_vote() {
        let mut votes = VoteSet::new();
        votes.add(HostId(7), vote("lighthouse", 3, false));
        votes.add(HostId(7), vote("zengarden", 5, true));

        assert_eq!(votes.count(), 1);
        assert_eq!(votes.get(HostId(7)), Some(&vote("zengarden", 5, true)));
    }

    #[test]
    fn test_sparse_host_ids() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), vote("lighthouse", 3, false));
        votes.add(HostId(1000), vote("lighthouse", 3, false));

        assert_eq!(votes.count(), 2);
        assert!(votes.get(HostId(500)).is_none());
        let hosts: Vec<HostId> = votes.iter().map(|(host, _)| host).collect();
        assert_eq!(hosts, vec![HostId(1), HostId(1000)]);
    }

    #[test]
    fn test_iteration_is_ordered_by_host() {
        let mut votes = VoteSet::new();
        for id in [42, -3, 9, 0] {
            votes.add(HostId(id), PeerVote::default());
        }
        let hosts: Vec<i32> = votes.iter().map(|(host, _)| host.0).collect();
        assert_eq!(hosts, vec![-3, 0, 9, 42]);
    }

    #[test]
    fn test_tally_majority_wins() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), vote("hacienda", 5, true));
        votes.add(HostId(2), vote("hacienda", 5, true));
        votes.add(HostId(3), vote("lighthouse", 1, false));

        assert_eq!(votes.tally(), Some(RaceConfig::new("hacienda", 5, true)));
    }

    #[test]
    fn test_tally_tie_prefers_forward() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), vote("lighthouse", 3, true));
        votes.add(HostId(2), vote("lighthouse", 3, false));

        assert_eq!(votes.tally(), Some(RaceConfig::new("lighthouse", 3, false)));
    }

    #[test]
    fn test_tally_tie_prefers_fewer_laps() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), vote("lighthouse", 5, false));
        votes.add(HostId(2), vote("lighthouse", 3, false));

        assert_eq!(votes.tally(), Some(RaceConfig::new("lighthouse", 3, false)));
    }

    #[test]
    fn test_tally_laps_outrank_direction_in_tie_break() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), vote("lighthouse", 2, true));
        votes.add(HostId(2), vote("lighthouse", 4, false));

        assert_eq!(votes.tally(), Some(RaceConfig::new("lighthouse", 2, true)));
    }

    #[test]
    fn test_tally_tie_prefers_smallest_track_name() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), vote("zengarden", 3, false));
        votes.add(HostId(2), vote("cocoa_temple", 3, false));

        assert_eq!(votes.tally(), Some(RaceConfig::new("cocoa_temple", 3, false)));
    }

    #[test]
    fn test_tally_of_nothing_is_none() {
        assert_eq!(VoteSet::new().tally(), None);
    }

    #[test]
    fn test_clear_and_remove() {
        let mut votes = VoteSet::new();
        votes.add(HostId(1), PeerVote::default());
        votes.add(HostId(2), PeerVote::default());

        assert!(votes.remove(HostId(1)).is_some());
        assert!(!votes.contains(HostId(1)));
        votes.clear();
        assert!(votes.is_empty());
    }
}
