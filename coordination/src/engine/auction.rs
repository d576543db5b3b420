//! Task allocation by reverse auction
//!
//! Each eligible candidate bids a cost for the task; the lowest cost wins.
//! Quality only matters when two costs are within `tie_epsilon`.

use tracing::debug;

use crate::state::{AuctionOutcome, Bid, Participant, ParticipantStatus, Task, TaskId};

/// Cost per unit of distance to the task
pub const COST_PER_DISTANCE: f64 = 0.5;
/// Cost multiplier when the candidate's role is not the preferred one
pub const ROLE_MISMATCH_PENALTY: f64 = 1.3;
/// Quality every bid starts from
pub const BASE_QUALITY: f64 = 50.0;
/// Quality added per unit of resource level
pub const RESOURCE_QUALITY: f64 = 30.0;
/// Quality added for an active candidate
pub const ACTIVE_BONUS: f64 = 10.0;
/// Quality added for a candidate standing on the task
pub const MAX_PROXIMITY_BONUS: f64 = 20.0;
/// Distance at which the proximity bonus reaches zero
pub const PROXIMITY_RANGE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AuctionConfig {
    /// Costs within this distance are compared on quality
    pub tie_epsilon: f64,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self { tie_epsilon: 0.01 }
    }
}

/// Reverse auction over a candidate roster
#[derive(Debug, Clone, Default)]
pub struct Auction {
    config: AuctionConfig,
}

impl Auction {
    pub fn new(config: AuctionConfig) -> Self {
        Self { config }
    }

    /// Price one candidate's bid, or `None` when it is not eligible
    pub fn compute_bid(task: &Task, candidate: &Participant) -> Option<Bid> {
        if candidate.status == ParticipantStatus::Offline {
            return None;
        }
        if candidate.resource_level < task.minimum_resource_level {
            return None;
        }

        let distance = candidate.position.distance_to(&task.target_location);
        let level = candidate.resource_level.clamp(0.0, 1.0);
        let battery_penalty = 2.0 - level;
        let role_penalty = match task.preferred_role {
            Some(role) if role != candidate.role => ROLE_MISMATCH_PENALTY,
            _ => 1.0,
        };
        let cost = distance * COST_PER_DISTANCE * battery_penalty * role_penalty;

        let active_bonus = if candidate.status == ParticipantStatus::Active {
            ACTIVE_BONUS
        } else {
            0.0
        };
        let proximity_bonus = MAX_PROXIMITY_BONUS * (1.0 - distance / PROXIMITY_RANGE).max(0.0);
        let quality = BASE_QUALITY + level * RESOURCE_QUALITY + active_bonus + proximity_bonus;

        Some(Bid::new(candidate.id.clone(), cost, quality))
    }

    /// Run the auction; `None` means no candidate was eligible
    pub fn conduct_auction(&self, task: &Task, candidates: &[Participant]) -> Option<AuctionOutcome> {
        let bids: Vec<Bid> = candidates
            .iter()
            .filter_map(|c| Self::compute_bid(task, c))
            .collect();
        debug!(
            task_id = %task.id,
            candidates = candidates.len(),
            bids = bids.len(),
            "Auction bids collected"
        );
        self.select_winner(&task.id, bids)
    }

    /// Pick the winning bid from already-priced bids.
    ///
    /// The cheapest bid sets the band: only bids within `tie_epsilon` of the
    /// minimum cost compete, and among those the highest quality wins. Equal
    /// quality keeps the earlier bid.
    pub fn select_winner(&self, task_id: &TaskId, bids: Vec<Bid>) -> Option<AuctionOutcome> {
        let min_cost = bids.iter().map(|b| b.cost).reduce(f64::min)?;
        let ceiling = min_cost + self.config.tie_epsilon;
        let mut best: Option<&Bid> = None;
        for bid in bids.iter().filter(|b| b.cost <= ceiling) {
            best = match best {
                Some(current) if bid.quality <= current.quality => Some(current),
                _ => Some(bid),
            };
        }
        let winning_bid = best?.clone();

        let average_cost = bids.iter().map(|b| b.cost).sum::<f64>() / bids.len() as f64;
        Some(AuctionOutcome {
            task_id: task_id.clone(),
            cost_savings: average_cost - winning_bid.cost,
            winning_bid,
            all_bids: bids,
            average_cost,
        })
    }
}
