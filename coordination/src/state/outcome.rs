//! Result types produced by the decision mechanisms and the conflict resolver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Bid, ParticipantId, ProposalId, TaskId};

/// Marker prefix carried by a revote resolution's `chosen_option`
pub const REVOTE_PREFIX: &str = "REVOTE:";

/// Separator joining the two option names of a compromise label
pub const COMPROMISE_SEPARATOR: &str = "+";

/// Why an outcome did or did not reach consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    /// Leader cleared threshold and quorum
    Consensus,
    /// Every counted response chose the same option
    Unanimous,
    /// Two or more options share the highest tally
    Tie,
    /// Leader's share is under the required threshold
    BelowThreshold,
    /// Fewer responses than the required quorum
    QuorumNotMet,
    /// Deadline passed before consensus
    Timeout,
    /// Cancelled externally before closing
    Cancelled,
}

impl OutcomeReason {
    pub fn is_reached(&self) -> bool {
        matches!(self, Self::Consensus | Self::Unanimous)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::Unanimous => "unanimous",
            Self::Tie => "tie",
            Self::BelowThreshold => "below_threshold",
            Self::QuorumNotMet => "quorum_not_met",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a plain consensus check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub proposal_id: ProposalId,
    pub reached: bool,
    /// Set only when `reached` is true
    pub winning_option: Option<String>,
    /// Option with the highest tally, reached or not
    pub leading_option: Option<String>,
    /// Leader's share of received responses (0.0–1.0)
    pub agreement_level: f64,
    /// Response count per option, zero entries included
    pub tally: BTreeMap<String, u32>,
    pub reason: OutcomeReason,
    /// Human-readable account of the numbers behind `reason`
    pub detail: String,
    pub participant_ids: Vec<ParticipantId>,
    pub total_expected: usize,
    pub total_received: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl Outcome {
    pub fn is_unanimous(&self) -> bool {
        self.reason == OutcomeReason::Unanimous
    }

    /// Tally entries ordered by count descending, ties in name order
    pub fn ranked_tally(&self) -> Vec<(&str, u32)> {
        let mut ranked: Vec<(&str, u32)> =
            self.tally.iter().map(|(o, c)| (o.as_str(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Re-tag an outcome as a forced failure, keeping the collected numbers
    pub(crate) fn into_failure(mut self, reason: OutcomeReason, detail: String) -> Self {
        self.reached = false;
        self.winning_option = None;
        self.reason = reason;
        self.detail = detail;
        self.evaluated_at = Utc::now();
        self
    }
}

/// Result of expertise-weighted voting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedOutcome {
    pub proposal_id: ProposalId,
    pub reached: bool,
    pub winning_option: Option<String>,
    pub leading_option: Option<String>,
    /// Winner's share of the total weight
    pub agreement_level: f64,
    /// Summed weight per option
    pub tally: BTreeMap<String, f64>,
    /// Plain response count per option, for comparison with the weighted result
    pub count_tally: BTreeMap<String, u32>,
    /// Computed weight of every counted response
    pub participant_weights: BTreeMap<ParticipantId, f64>,
    pub total_weight: f64,
    pub reason: OutcomeReason,
    pub detail: String,
    pub total_expected: usize,
    pub total_received: usize,
}

impl WeightedOutcome {
    /// Express the weighted result as a plain outcome for storage and resolution
    pub fn to_outcome(&self) -> Outcome {
        Outcome {
            proposal_id: self.proposal_id.clone(),
            reached: self.reached,
            winning_option: self.winning_option.clone(),
            leading_option: self.leading_option.clone(),
            agreement_level: self.agreement_level,
            tally: self.count_tally.clone(),
            reason: self.reason,
            detail: format!("weighted: {}", self.detail),
            participant_ids: self.participant_weights.keys().cloned().collect(),
            total_expected: self.total_expected,
            total_received: self.total_received,
            evaluated_at: Utc::now(),
        }
    }
}

/// Result of a multi-criteria evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiCriteriaOutcome {
    pub best_option: String,
    pub best_score: f64,
    pub runner_up: Option<String>,
    /// Best minus second-best; equals `best_score` when there is no runner-up
    pub margin: f64,
    pub per_option_score: BTreeMap<String, f64>,
    /// option → criterion name → normalized 0–100 score
    pub per_option_per_criterion_score: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Result of an auction with at least one eligible bidder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub task_id: TaskId,
    pub winning_bid: Bid,
    pub all_bids: Vec<Bid>,
    pub average_cost: f64,
    /// `average_cost - winning_bid.cost`
    pub cost_savings: f64,
}

/// Fallback algorithm applied when consensus fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Leader's own response, else highest raw tally
    LeaderFallback,
    /// Blend two close leading options
    Compromise,
    /// Reopen with the top options only
    Revote,
    /// Eliminate the least popular option until one wins
    MultiStage,
    /// Compromise, then leader fallback
    Hybrid,
}

impl ResolutionStrategy {
    pub fn all() -> &'static [ResolutionStrategy] {
        &[
            Self::LeaderFallback,
            Self::Compromise,
            Self::Revote,
            Self::MultiStage,
            Self::Hybrid,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaderFallback => "leader_fallback",
            Self::Compromise => "compromise",
            Self::Revote => "revote",
            Self::MultiStage => "multi_stage",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "leader_fallback" | "leader" => Ok(Self::LeaderFallback),
            "compromise" => Ok(Self::Compromise),
            "revote" => Ok(Self::Revote),
            "multi_stage" | "multistage" => Ok(Self::MultiStage),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown resolution strategy '{}'", other)),
        }
    }
}

/// Result of conflict resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub proposal_id: ProposalId,
    pub resolved: bool,
    /// Committed option, a compromise label, or a `REVOTE:` marker
    pub chosen_option: Option<String>,
    /// Strategy that produced this result
    pub strategy_used: ResolutionStrategy,
    /// Every strategy tried, in order
    pub attempted: Vec<ResolutionStrategy>,
    /// Tally and threshold numbers behind the decision
    pub explanation: String,
    /// New proposal opened by a revote
    pub successor: Option<ProposalId>,
}

impl ResolutionOutcome {
    pub fn is_revote(&self) -> bool {
        self.successor.is_some()
    }

    /// No answer and no follow-up round: the terminal failure case
    pub fn is_unresolved(&self) -> bool {
        !self.resolved && self.successor.is_none()
    }

    /// Options named by a revote marker
    pub fn revote_options(&self) -> Option<Vec<String>> {
        self.chosen_option
            .as_deref()?
            .strip_prefix(REVOTE_PREFIX)
            .map(|rest| rest.split(',').map(str::to_string).collect())
    }
}

/// Render a tally as `a=3, b=2` in the given option order
pub fn describe_tally<V: std::fmt::Display>(order: &[String], tally: &BTreeMap<String, V>) -> String {
    order
        .iter()
        .filter_map(|o| tally.get(o).map(|v| format!("{}={}", o, v)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "multi-stage".parse::<ResolutionStrategy>().unwrap(),
            ResolutionStrategy::MultiStage
        );
        assert_eq!(
            "Leader_Fallback".parse::<ResolutionStrategy>().unwrap(),
            ResolutionStrategy::LeaderFallback
        );
        assert!("coin_flip".parse::<ResolutionStrategy>().is_err());
    }

    #[test]
    fn test_revote_options() {
        let outcome = ResolutionOutcome {
            proposal_id: "p".to_string(),
            resolved: false,
            chosen_option: Some(format!("{}north,east", REVOTE_PREFIX)),
            strategy_used: ResolutionStrategy::Revote,
            attempted: vec![ResolutionStrategy::Revote],
            explanation: String::new(),
            successor: Some("p-r1".to_string()),
        };
        assert!(outcome.is_revote());
        assert!(!outcome.is_unresolved());
        assert_eq!(
            outcome.revote_options().unwrap(),
            vec!["north".to_string(), "east".to_string()]
        );
    }

    #[test]
    fn test_describe_tally_order() {
        let order = vec!["b".to_string(), "a".to_string()];
        let tally: BTreeMap<String, u32> =
            [("a".to_string(), 1), ("b".to_string(), 2)].into_iter().collect();
        assert_eq!(describe_tally(&order, &tally), "b=2, a=1");
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(OutcomeReason::BelowThreshold.to_string(), "below_threshold");
        assert_eq!(OutcomeReason::Timeout.as_str(), "timeout");
        assert!(OutcomeReason::Unanimous.is_reached());
        assert!(!OutcomeReason::Cancelled.is_reached());
    }
}
