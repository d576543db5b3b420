//! Decision metrics: counters for the observability feed
//!
//! Counters are plain atomics so producers on any thread can bump them
//! without locking; [`DecisionMetrics::snapshot`] gives a serialisable copy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::ResolutionStrategy;

/// Shared reference to DecisionMetrics
pub type SharedMetrics = Arc<DecisionMetrics>;

/// Live counters for the decision subsystem
#[derive(Debug, Default)]
pub struct DecisionMetrics {
    proposals_opened: AtomicU64,
    consensus_reached: AtomicU64,
    consensus_failed: AtomicU64,
    proposals_expired: AtomicU64,
    proposals_cancelled: AtomicU64,
    responses_recorded: AtomicU64,
    responses_rejected: AtomicU64,
    revotes_opened: AtomicU64,
    unresolved_conflicts: AtomicU64,
    auctions_held: AtomicU64,
    auctions_without_bidder: AtomicU64,
    /// Indexed by position in [`ResolutionStrategy::all`]
    by_strategy: [AtomicU64; 5],
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub proposals_opened: u64,
    pub consensus_reached: u64,
    pub consensus_failed: u64,
    pub proposals_expired: u64,
    pub proposals_cancelled: u64,
    pub responses_recorded: u64,
    pub responses_rejected: u64,
    pub revotes_opened: u64,
    pub unresolved_conflicts: u64,
    pub auctions_held: u64,
    pub auctions_without_bidder: u64,
    pub by_resolution_strategy: BTreeMap<String, u64>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedMetrics {
        Arc::new(self)
    }

    pub fn proposal_opened(&self) {
        bump(&self.proposals_opened);
    }

    pub fn consensus_reached(&self) {
        bump(&self.consensus_reached);
    }

    pub fn consensus_failed(&self) {
        bump(&self.consensus_failed);
    }

    pub fn proposal_expired(&self) {
        bump(&self.proposals_expired);
    }

    pub fn proposal_cancelled(&self) {
        bump(&self.proposals_cancelled);
    }

    pub fn response_recorded(&self) {
        bump(&self.responses_recorded);
    }

    pub fn response_rejected(&self) {
        bump(&self.responses_rejected);
    }

    pub fn revote_opened(&self) {
        bump(&self.revotes_opened);
    }

    pub fn unresolved_conflict(&self) {
        bump(&self.unresolved_conflicts);
    }

    /// Count an auction, and whether it ended without any eligible bidder
    pub fn auction_held(&self, had_bidder: bool) {
        bump(&self.auctions_held);
        if !had_bidder {
            bump(&self.auctions_without_bidder);
        }
    }

    /// Count a resolution by the strategy that produced it
    pub fn resolution(&self, strategy: ResolutionStrategy) {
        if let Some(i) = ResolutionStrategy::all().iter().position(|s| *s == strategy) {
            bump(&self.by_strategy[i]);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            proposals_opened: load(&self.proposals_opened),
            consensus_reached: load(&self.consensus_reached),
            consensus_failed: load(&self.consensus_failed),
            proposals_expired: load(&self.proposals_expired),
            proposals_cancelled: load(&self.proposals_cancelled),
            responses_recorded: load(&self.responses_recorded),
            responses_rejected: load(&self.responses_rejected),
            revotes_opened: load(&self.revotes_opened),
            unresolved_conflicts: load(&self.unresolved_conflicts),
            auctions_held: load(&self.auctions_held),
            auctions_without_bidder: load(&self.auctions_without_bidder),
            by_resolution_strategy: ResolutionStrategy::all()
                .iter()
                .zip(self.by_strategy.iter())
                .map(|(s, c)| (s.to_string(), load(c)))
                .filter(|(_, n)| *n > 0)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = DecisionMetrics::new();
        metrics.proposal_opened();
        metrics.proposal_opened();
        metrics.consensus_failed();
        metrics.resolution(ResolutionStrategy::Revote);
        metrics.resolution(ResolutionStrategy::Revote);
        metrics.resolution(ResolutionStrategy::LeaderFallback);
        metrics.auction_held(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.proposals_opened, 2);
        assert_eq!(snapshot.consensus_failed, 1);
        assert_eq!(snapshot.by_resolution_strategy.get("revote"), Some(&2));
        assert_eq!(snapshot.by_resolution_strategy.get("leader_fallback"), Some(&1));
        assert!(!snapshot.by_resolution_strategy.contains_key("compromise"));
        assert_eq!(snapshot.auctions_without_bidder, 1);
    }

    #[test]
    fn test_strategy_slots_cover_all() {
        let metrics = DecisionMetrics::new();
        for s in ResolutionStrategy::all() {
            metrics.resolution(*s);
        }
        assert_eq!(
            metrics.snapshot().by_resolution_strategy.len(),
            ResolutionStrategy::all().len()
        );
    }
}
