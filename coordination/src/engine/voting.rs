//! Plain consensus voting
//!
//! One response counts as one vote. A proposal reaches consensus when the
//! leading option's share of *received* responses clears the threshold, the
//! quorum is met, and the leader strictly beats the runner-up.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::events::{DecisionEvent, SharedEventBus};
use crate::metrics::SharedMetrics;
use crate::state::{
    Outcome, OutcomeReason, Proposal, ProposalDraft, Response, Settlement,
    SharedProposalStore, StoreResult, SubmitReceipt,
};

/// Threshold comparisons tolerate this much floating point error
const THRESHOLD_EPSILON: f64 = 1e-9;

// ============================================================================
// Shared evaluation helpers
// ============================================================================

/// Options ranked by score, highest first; equal scores keep option order
pub(crate) fn rank_options(options: &[String], score: impl Fn(&str) -> f64) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = options
        .iter()
        .map(|o| (o.clone(), score(o)))
        .collect();
    // sort_by is stable, so ties stay in declared order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Consensus verdict over a ranked tally
#[derive(Debug, Clone)]
pub(crate) struct Verdict {
    pub reached: bool,
    pub leader: Option<String>,
    pub agreement: f64,
    pub reason: OutcomeReason,
    pub detail: String,
}

/// Inputs to [`judge`]
pub(crate) struct Ballot<'a> {
    pub ranked: &'a [(String, f64)],
    /// Sum of all scores (count or weight)
    pub total: f64,
    pub received: usize,
    pub threshold: f64,
    pub quorum: usize,
    /// Scores within this distance of the leader count as a tie
    pub tie_epsilon: f64,
    /// Decimal places used when printing scores
    pub precision: usize,
}

/// Apply the quorum, tie, and threshold tests in that order
pub(crate) fn judge(ballot: Ballot<'_>) -> Verdict {
    let prec = ballot.precision;
    let tally = ballot
        .ranked
        .iter()
        .map(|(o, s)| format!("{}={:.*}", o, prec, s))
        .collect::<Vec<_>>()
        .join(", ");
    let leader = ballot.ranked.first().map(|(o, _)| o.clone());
    let lead_score = ballot.ranked.first().map(|(_, s)| *s).unwrap_or(0.0);
    let runner_up = ballot.ranked.get(1).map(|(_, s)| *s).unwrap_or(0.0);
    let agreement = if ballot.total > 0.0 {
        lead_score / ballot.total
    } else {
        0.0
    };

    let fail = |reason: OutcomeReason, detail: String| Verdict {
        reached: false,
        leader: leader.clone(),
        agreement,
        reason,
        detail,
    };

    if ballot.received == 0 || ballot.received < ballot.quorum {
        return fail(
            OutcomeReason::QuorumNotMet,
            format!(
                "{} of {} required responses received [{}]",
                ballot.received, ballot.quorum, tally
            ),
        );
    }
    if lead_score - runner_up <= ballot.tie_epsilon {
        return fail(
            OutcomeReason::Tie,
            format!(
                "top options tied at {:.*} of {:.*} [{}]",
                prec, lead_score, prec, ballot.total, tally
            ),
        );
    }
    if ballot.total <= 0.0 || agreement + THRESHOLD_EPSILON < ballot.threshold {
        return fail(
            OutcomeReason::BelowThreshold,
            format!(
                "agreement {:.3} below threshold {:.3} [{}]",
                agreement, ballot.threshold, tally
            ),
        );
    }

    let supporters = ballot.ranked.iter().filter(|(_, s)| *s > 0.0).count();
    let reason = if supporters == 1 {
        OutcomeReason::Unanimous
    } else {
        OutcomeReason::Consensus
    };
    Verdict {
        reached: true,
        leader,
        agreement,
        reason,
        detail: format!(
            "agreement {:.3} >= threshold {:.3}, {} responses (quorum {}) [{}]",
            agreement, ballot.threshold, ballot.received, ballot.quorum, tally
        ),
    }
}

/// Evaluate plain consensus over a set of responses.
///
/// Responses naming an option the proposal does not offer are ignored. The
/// returned tally has an entry for every option, zero counts included.
pub fn evaluate_consensus(proposal: &Proposal, responses: &[Response]) -> Outcome {
    let mut tally: BTreeMap<String, u32> =
        proposal.options.iter().map(|o| (o.clone(), 0)).collect();
    let mut participant_ids = Vec::with_capacity(responses.len());
    for response in responses {
        if let Some(count) = tally.get_mut(&response.chosen_option) {
            *count += 1;
            participant_ids.push(response.participant_id.clone());
        }
    }
    let received = participant_ids.len();

    let ranked = rank_options(&proposal.options, |o| {
        tally.get(o).copied().unwrap_or(0) as f64
    });
    let verdict = judge(Ballot {
        ranked: &ranked,
        total: received as f64,
        received,
        threshold: proposal.required_threshold,
        quorum: proposal.required_quorum,
        tie_epsilon: 0.0,
        precision: 0,
    });

    Outcome {
        proposal_id: proposal.id.clone(),
        reached: verdict.reached,
        winning_option: verdict.leader.clone().filter(|_| verdict.reached),
        leading_option: verdict.leader,
        agreement_level: verdict.agreement,
        tally,
        reason: verdict.reason,
        detail: verdict.detail,
        participant_ids,
        total_expected: proposal.expected_or_quorum(),
        total_received: received,
        evaluated_at: Utc::now(),
    }
}

// ============================================================================
// Voting System
// ============================================================================

/// Front door for plain voting: wraps the store with logging, events, and metrics
pub struct VotingSystem {
    store: SharedProposalStore,
    event_bus: SharedEventBus,
    metrics: SharedMetrics,
}

impl VotingSystem {
    pub fn new(store: SharedProposalStore, event_bus: SharedEventBus, metrics: SharedMetrics) -> Self {
        Self {
            store,
            event_bus,
            metrics,
        }
    }

    pub fn store(&self) -> &SharedProposalStore {
        &self.store
    }

    /// Open a proposal and announce it
    pub fn open(&self, draft: ProposalDraft) -> StoreResult<Proposal> {
        let proposal = self.store.open_draft(draft)?;
        self.announce_opened(&proposal);
        Ok(proposal)
    }

    pub(crate) fn announce_opened(&self, proposal: &Proposal) {
        info!(
            proposal_id = %proposal.id,
            kind = %proposal.kind,
            options = ?proposal.options,
            threshold = proposal.required_threshold,
            quorum = proposal.required_quorum,
            round = proposal.revote_round,
            "Proposal opened"
        );
        self.metrics.proposal_opened();
        self.event_bus.publish(DecisionEvent::ProposalOpened {
            proposal_id: proposal.id.clone(),
            kind: proposal.kind,
            options: proposal.options.clone(),
            revote_round: proposal.revote_round,
            timestamp: Utc::now(),
        });
    }

    /// Submit a response. A rejected response leaves the proposal untouched.
    pub fn submit(&self, response: Response) -> StoreResult<SubmitReceipt> {
        let proposal_id = response.proposal_id.clone();
        let participant_id = response.participant_id.clone();
        let option = response.chosen_option.clone();

        match self.store.submit(response) {
            Ok(receipt) => {
                debug!(
                    proposal_id = %proposal_id,
                    participant_id = %participant_id,
                    option = %option,
                    ?receipt,
                    "Response submitted"
                );
                if receipt != SubmitReceipt::IgnoredStale {
                    self.metrics.response_recorded();
                    self.event_bus.publish(DecisionEvent::ResponseRecorded {
                        proposal_id,
                        participant_id,
                        option,
                        timestamp: Utc::now(),
                    });
                }
                Ok(receipt)
            }
            Err(e) => {
                warn!(
                    proposal_id = %proposal_id,
                    participant_id = %participant_id,
                    option = %option,
                    error = %e,
                    "Response rejected"
                );
                self.metrics.response_rejected();
                self.event_bus.publish(DecisionEvent::ResponseRejected {
                    proposal_id,
                    participant_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Check consensus; announces the outcome only on the call that closes it
    pub fn check_consensus(&self, proposal_id: &str) -> StoreResult<Outcome> {
        let evaluation = self.store.evaluate(proposal_id)?;
        if evaluation.closed_now {
            self.announce_closed(&evaluation.outcome);
        } else {
            debug!(
                proposal_id,
                reason = %evaluation.outcome.reason,
                received = evaluation.outcome.total_received,
                "Consensus check"
            );
        }
        Ok(evaluation.outcome)
    }

    /// Evaluate with another mechanism's tally, closing atomically when final
    pub fn settle_with(
        &self,
        proposal_id: &str,
        tally: impl FnOnce(&Proposal, &[Response]) -> Settlement,
    ) -> StoreResult<Outcome> {
        let evaluation = self.store.evaluate_with(proposal_id, tally)?;
        if evaluation.closed_now {
            self.announce_closed(&evaluation.outcome);
        }
        Ok(evaluation.outcome)
    }

    /// Force-close every proposal past its deadline
    pub fn expire_stale(&self, now: DateTime<Utc>) -> StoreResult<Vec<Outcome>> {
        let expired = self.store.expire_stale(now)?;
        for outcome in &expired {
            info!(
                proposal_id = %outcome.proposal_id,
                received = outcome.total_received,
                expected = outcome.total_expected,
                "Proposal expired"
            );
            self.metrics.proposal_expired();
            self.event_bus.publish(DecisionEvent::ProposalExpired {
                proposal_id: outcome.proposal_id.clone(),
                responses: outcome.total_received,
                timestamp: Utc::now(),
            });
            self.announce_closed(outcome);
        }
        Ok(expired)
    }

    /// Cancel an open proposal (e.g. mission abort)
    pub fn cancel(&self, proposal_id: &str, reason: &str) -> StoreResult<Outcome> {
        let outcome = self.store.cancel(proposal_id, reason)?;
        info!(proposal_id, reason, "Proposal cancelled");
        self.metrics.proposal_cancelled();
        self.event_bus.publish(DecisionEvent::ProposalCancelled {
            proposal_id: proposal_id.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        self.announce_closed(&outcome);
        Ok(outcome)
    }

    fn announce_closed(&self, outcome: &Outcome) {
        match (&outcome.winning_option, outcome.reached) {
            (Some(winner), true) => {
                info!(
                    proposal_id = %outcome.proposal_id,
                    option = %winner,
                    agreement = outcome.agreement_level,
                    unanimous = outcome.is_unanimous(),
                    "Consensus reached"
                );
                self.metrics.consensus_reached();
                self.event_bus.publish(DecisionEvent::ConsensusReached {
                    proposal_id: outcome.proposal_id.clone(),
                    winner: winner.clone(),
                    agreement_level: outcome.agreement_level,
                    unanimous: outcome.is_unanimous(),
                    timestamp: Utc::now(),
                });
            }
            _ => {
                info!(
                    proposal_id = %outcome.proposal_id,
                    reason = %outcome.reason,
                    detail = %outcome.detail,
                    "Consensus failed"
                );
                self.metrics.consensus_failed();
                self.event_bus.publish(DecisionEvent::ConsensusFailed {
                    proposal_id: outcome.proposal_id.clone(),
                    reason: outcome.reason,
                    detail: outcome.detail.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
