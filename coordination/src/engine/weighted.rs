//! Expertise-weighted voting
//!
//! Each response contributes `1.0 × expertise × resource × confidence`
//! instead of a single unit, so a small bloc of specialists can outvote a
//! larger bloc of depleted or unsure generalists.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::voting::{judge, rank_options, Ballot};
use crate::state::{
    roster_index, Participant, ParticipantRole, Proposal, ProposalKind, Response, WeightedOutcome,
};

/// Weight every response starts from
pub const BASE_WEIGHT: f64 = 1.0;

/// Weighted shares closer than this count as tied
const WEIGHT_TIE_EPSILON: f64 = 1e-9;

/// Multipliers applied to each response's weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightingConfig {
    /// Role voting on the kind it specialises in
    pub specialty_multiplier: f64,
    /// Leader role, whatever the kind
    pub leader_multiplier: f64,
    /// Resource multiplier at 0% resources; rises linearly to 1.0 at 100%
    pub resource_floor: f64,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            specialty_multiplier: 1.5,
            leader_multiplier: 1.3,
            resource_floor: 0.5,
        }
    }
}

/// Expertise multiplier for a role voting on a proposal kind
pub fn expertise_multiplier(role: ParticipantRole, kind: ProposalKind, config: &WeightingConfig) -> f64 {
    if role.specialty() == Some(kind) {
        config.specialty_multiplier
    } else if role.is_leader() {
        config.leader_multiplier
    } else {
        1.0
    }
}

/// Resource multiplier: `floor + (1 - floor) × level`
pub fn resource_multiplier(level: f64, floor: f64) -> f64 {
    floor + (1.0 - floor) * level.clamp(0.0, 1.0)
}

/// Weighted voting mechanism
#[derive(Debug, Clone, Default)]
pub struct WeightedVoting {
    config: WeightingConfig,
}

impl WeightedVoting {
    pub fn new(config: WeightingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightingConfig {
        &self.config
    }

    /// Weight of one response on a proposal of the given kind
    pub fn response_weight(&self, response: &Response, kind: ProposalKind) -> f64 {
        BASE_WEIGHT
            * expertise_multiplier(response.participant_role, kind, &self.config)
            * resource_multiplier(response.participant_resource_level, self.config.resource_floor)
            * response.confidence.clamp(0.0, 1.0)
    }

    /// Tally weighted shares and apply the proposal's threshold and quorum.
    ///
    /// When `participants` is non-empty, responses from ids outside the
    /// roster are not counted.
    pub fn conduct_weighted_vote(
        &self,
        proposal: &Proposal,
        responses: &[Response],
        participants: &[Participant],
    ) -> WeightedOutcome {
        let roster = roster_index(participants);

        let mut tally: BTreeMap<String, f64> =
            proposal.options.iter().map(|o| (o.clone(), 0.0)).collect();
        let mut count_tally: BTreeMap<String, u32> =
            proposal.options.iter().map(|o| (o.clone(), 0)).collect();
        let mut participant_weights = BTreeMap::new();

        for response in responses {
            if !roster.is_empty() && !roster.contains_key(response.participant_id.as_str()) {
                debug!(
                    proposal_id = %proposal.id,
                    participant_id = %response.participant_id,
                    "Skipping response from participant outside roster"
                );
                continue;
            }
            let (Some(weight_sum), Some(count)) = (
                tally.get_mut(&response.chosen_option),
                count_tally.get_mut(&response.chosen_option),
            ) else {
                continue;
            };
            let weight = self.response_weight(response, proposal.kind);
            *weight_sum += weight;
            *count += 1;
            participant_weights.insert(response.participant_id.clone(), weight);
        }

        let received = participant_weights.len();
        let total_weight: f64 = tally.values().sum();
        let ranked = rank_options(&proposal.options, |o| tally.get(o).copied().unwrap_or(0.0));
        let verdict = judge(Ballot {
            ranked: &ranked,
            total: total_weight,
            received,
            threshold: proposal.required_threshold,
            quorum: proposal.required_quorum,
            tie_epsilon: WEIGHT_TIE_EPSILON,
            precision: 2,
        });

        debug!(
            proposal_id = %proposal.id,
            reached = verdict.reached,
            total_weight,
            detail = %verdict.detail,
            "Weighted vote evaluated"
        );

        let total_expected = if participants.is_empty() {
            proposal.expected_or_quorum()
        } else {
            participants.len()
        };

        WeightedOutcome {
            proposal_id: proposal.id.clone(),
            reached: verdict.reached,
            winning_option: verdict.leader.clone().filter(|_| verdict.reached),
            leading_option: verdict.leader,
            agreement_level: verdict.agreement,
            tally,
            count_tally,
            participant_weights,
            total_weight,
            reason: verdict.reason,
            detail: verdict.detail,
            total_expected,
            total_received: received,
        }
    }
}

/// Multiplier for every role on a given kind, for reporting
pub fn multiplier_table(kind: ProposalKind, config: &WeightingConfig) -> HashMap<ParticipantRole, f64> {
    [
        ParticipantRole::Leader,
        ParticipantRole::Navigator,
        ParticipantRole::FormationSpecialist,
        ParticipantRole::Coordinator,
        ParticipantRole::Responder,
        ParticipantRole::Worker,
        ParticipantRole::Scout,
    ]
    .into_iter()
    .map(|role| (role, expertise_multiplier(role, kind, config)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{OutcomeReason, ProposalDraft};
    use chrono::Utc;

    fn nav_proposal(threshold: f64) -> Proposal {
        ProposalDraft::new("Which heading?", vec!["ridge", "valley"], ProposalKind::Navigation)
            .threshold(threshold)
            .quorum(1)
            .into_proposal(Utc::now())
            .unwrap()
    }

    #[test]
    fn test_expertise_multipliers() {
        let config = WeightingConfig::default();
        let kind = ProposalKind::Navigation;
        assert_eq!(expertise_multiplier(ParticipantRole::Navigator, kind, &config), 1.5);
        assert_eq!(expertise_multiplier(ParticipantRole::Leader, kind, &config), 1.3);
        assert_eq!(expertise_multiplier(ParticipantRole::Scout, kind, &config), 1.0);
        assert_eq!(
            expertise_multiplier(ParticipantRole::Worker, ProposalKind::Task, &config),
            1.5
        );

        let table = multiplier_table(ProposalKind::Formation, &config);
        assert_eq!(table[&ParticipantRole::FormationSpecialist], 1.5);
        assert_eq!(table[&ParticipantRole::Navigator], 1.0);
    }

    #[test]
    fn test_resource_multiplier_floor() {
        assert_eq!(resource_multiplier(0.0, 0.5), 0.5);
        assert_eq!(resource_multiplier(1.0, 0.5), 1.0);
        assert!((resource_multiplier(0.4, 0.5) - 0.7).abs() < 1e-12);
        // Out-of-range levels are clamped
        assert_eq!(resource_multiplier(1.7, 0.5), 1.0);
        assert_eq!(resource_multiplier(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_high_weight_minority_wins() {
        let proposal = nav_proposal(0.5);
        let mut responses = vec![Response::new(&proposal.id, "nav-1", "ridge")
            .with_role(ParticipantRole::Navigator)
            .with_confidence(0.9)];
        for i in 0..3 {
            responses.push(
                Response::new(&proposal.id, format!("worker-{}", i), "valley")
                    .with_role(ParticipantRole::Worker)
                    .with_resource_level(0.4)
                    .with_confidence(0.6),
            );
        }

        let outcome = WeightedVoting::default().conduct_weighted_vote(&proposal, &responses, &[]);

        assert!(outcome.reached);
        assert_eq!(outcome.winning_option.as_deref(), Some("ridge"));
        assert!((outcome.tally["ridge"] - 1.35).abs() < 1e-9);
        assert!((outcome.tally["valley"] - 1.26).abs() < 1e-9);
        assert_eq!(outcome.count_tally["valley"], 3);
        assert_eq!(outcome.count_tally["ridge"], 1);
        assert!((outcome.participant_weights["worker-0"] - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_roster_filters_responses() {
        let proposal = nav_proposal(0.6);
        let responses = vec![
            Response::new(&proposal.id, "a", "ridge"),
            Response::new(&proposal.id, "ghost", "valley"),
        ];
        let roster = vec![
            Participant::new("a", ParticipantRole::Scout),
            Participant::new("b", ParticipantRole::Scout),
        ];

        let outcome = WeightedVoting::default().conduct_weighted_vote(&proposal, &responses, &roster);
        assert_eq!(outcome.total_received, 1);
        assert_eq!(outcome.total_expected, 2);
        assert!(!outcome.participant_weights.contains_key("ghost"));
    }

    #[test]
    fn test_weighted_tie_fails() {
        let proposal = nav_proposal(0.5);
        let responses = vec![
            Response::new(&proposal.id, "a", "ridge"),
            Response::new(&proposal.id, "b", "valley"),
        ];
        let outcome = WeightedVoting::default().conduct_weighted_vote(&proposal, &responses, &[]);
        assert!(!outcome.reached);
        assert_eq!(outcome.reason, OutcomeReason::Tie);
        assert!(outcome.to_outcome().winning_option.is_none());
    }
}
