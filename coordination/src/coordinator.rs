//! Decision coordinator - owns the decision mechanisms and drives them
//!
//! The coordinator is the single place that turns proposal outcomes into
//! committed answers: a reached consensus is committed directly, a failed one
//! goes through the conflict resolver, and a revote hands back the successor
//! proposal for the next round. Only an unresolved conflict surfaces as an
//! error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::DecisionConfig;
use crate::engine::{
    Auction, ConflictResolver, CriteriaError, MultiCriteriaAnalysis, OptionProfile,
    ResolutionError, ScoringContext, VotingSystem, WeightedVoting,
};
use crate::events::{DecisionEvent, DecisionMessage, EventBus, FilteredReceiver, SharedEventBus};
use crate::metrics::{DecisionMetrics, MetricsSnapshot, SharedMetrics};
use crate::state::{
    AuctionOutcome, DecisionCriterion, MultiCriteriaOutcome, Outcome, Participant, Proposal,
    ProposalDraft, ProposalId, ProposalKind, ProposalStatus, ProposalStore, ResolutionOutcome,
    Response, Settlement, SharedProposalStore, StoreError, SubmitReceipt, Task, WeightedOutcome,
};

/// Error type for coordinator operations
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Criteria error: {0}")]
    Criteria(#[from] CriteriaError),

    #[error("Conflict on proposal {proposal_id} could not be resolved: {explanation}")]
    UnresolvedConflict {
        proposal_id: ProposalId,
        explanation: String,
    },

    #[error("Proposal {proposal_id} was superseded by {successor:?}")]
    Superseded {
        proposal_id: ProposalId,
        successor: Option<ProposalId>,
    },
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Shared reference to Coordinator
pub type SharedCoordinator = Arc<Coordinator>;

/// Consensus mechanism used by [`Coordinator::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// One response, one vote
    #[default]
    Plain,
    /// Expertise, resource, and confidence weighted
    Weighted,
}

/// What the coordinator concluded about a proposal
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// An option is final, by consensus or by resolution
    Committed {
        proposal_id: ProposalId,
        option: String,
        outcome: Outcome,
        resolution: Option<ResolutionOutcome>,
    },
    /// Still collecting responses
    Pending(Outcome),
    /// A narrowed successor proposal replaces this one
    Revote {
        previous: ProposalId,
        successor: Proposal,
        resolution: ResolutionOutcome,
    },
}

impl Decision {
    pub fn committed_option(&self) -> Option<&str> {
        match self {
            Self::Committed { option, .. } => Some(option),
            _ => None,
        }
    }
}

/// Central orchestrator for collective decisions
pub struct Coordinator {
    config: DecisionConfig,
    store: SharedProposalStore,
    event_bus: SharedEventBus,
    metrics: SharedMetrics,
    voting: VotingSystem,
    weighted: WeightedVoting,
    auction: Auction,
    resolver: ConflictResolver,
}

impl Coordinator {
    /// Create a coordinator with its own store, bus, and metrics
    pub fn new(config: DecisionConfig) -> Self {
        let store = ProposalStore::new().shared();
        let event_bus = EventBus::with_capacity(config.event_capacity).shared();
        Self::with_parts(store, event_bus, config)
    }

    /// Create a coordinator around an existing store and bus
    pub fn with_parts(
        store: SharedProposalStore,
        event_bus: SharedEventBus,
        config: DecisionConfig,
    ) -> Self {
        let metrics = DecisionMetrics::new().shared();
        let voting = VotingSystem::new(store.clone(), event_bus.clone(), metrics.clone());
        let resolver = ConflictResolver::new(
            store.clone(),
            event_bus.clone(),
            metrics.clone(),
            config.resolver(),
        );

        Self {
            weighted: WeightedVoting::new(config.weighting()),
            auction: Auction::new(config.auction()),
            config,
            store,
            event_bus,
            metrics,
            voting,
            resolver,
        }
    }

    /// Create a shared reference to this coordinator
    pub fn shared(self) -> SharedCoordinator {
        Arc::new(self)
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedProposalStore {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DecisionEvent> {
        self.event_bus.subscribe()
    }

    pub fn subscribe_proposal(&self, proposal_id: &str) -> FilteredReceiver {
        self.event_bus.subscribe_proposal(proposal_id)
    }

    // =========================================================================
    // Proposals
    // =========================================================================

    /// Draft carrying the configured default threshold, quorum, and ttl
    pub fn draft<S: Into<String>>(
        &self,
        question: impl Into<String>,
        options: Vec<S>,
        kind: ProposalKind,
    ) -> ProposalDraft {
        ProposalDraft::new(question, options, kind)
            .threshold(self.config.default_threshold)
            .quorum(self.config.default_quorum)
            .ttl(self.config.default_ttl())
    }

    pub fn open_proposal(&self, draft: ProposalDraft) -> CoordinatorResult<Proposal> {
        Ok(self.voting.open(draft)?)
    }

    pub fn submit(&self, response: Response) -> CoordinatorResult<SubmitReceipt> {
        Ok(self.voting.submit(response)?)
    }

    pub fn check_consensus(&self, proposal_id: &str) -> CoordinatorResult<Outcome> {
        Ok(self.voting.check_consensus(proposal_id)?)
    }

    pub fn cancel(&self, proposal_id: &str, reason: &str) -> CoordinatorResult<Outcome> {
        Ok(self.voting.cancel(proposal_id, reason)?)
    }

    pub fn expire_stale(&self, now: DateTime<Utc>) -> CoordinatorResult<Vec<Outcome>> {
        Ok(self.voting.expire_stale(now)?)
    }

    /// Weighted tally of the responses stored so far; does not close the proposal
    pub fn weighted_vote(
        &self,
        proposal_id: &str,
        participants: &[Participant],
    ) -> CoordinatorResult<WeightedOutcome> {
        let proposal = self.store.get(proposal_id)?;
        let responses = self.store.responses(proposal_id)?;
        Ok(self
            .weighted
            .conduct_weighted_vote(&proposal, &responses, participants))
    }

    /// Evaluate a proposal and commit, defer, or resolve it.
    ///
    /// Returns [`Decision::Pending`] while the proposal is open without a
    /// final result. A failed proposal goes through the configured resolution
    /// strategy; if that yields nothing, `UnresolvedConflict` is returned.
    pub fn decide(
        &self,
        proposal_id: &str,
        mechanism: Mechanism,
        participants: &[Participant],
        leader_id: Option<&str>,
    ) -> CoordinatorResult<Decision> {
        let proposal = self.store.get(proposal_id)?;
        if self.store.status(proposal_id)? == ProposalStatus::Superseded {
            return Err(CoordinatorError::Superseded {
                proposal_id: proposal_id.to_string(),
                successor: self.store.successor(proposal_id)?,
            });
        }

        let outcome = match mechanism {
            Mechanism::Plain => self.voting.check_consensus(proposal_id)?,
            Mechanism::Weighted => self.weighted_outcome(&proposal, participants)?,
        };

        if let (true, Some(option)) = (outcome.reached, outcome.winning_option.clone()) {
            return Ok(Decision::Committed {
                proposal_id: proposal.id,
                option,
                outcome,
                resolution: None,
            });
        }
        if self.store.status(proposal_id)? == ProposalStatus::Open {
            debug!(
                proposal_id,
                reason = %outcome.reason,
                received = outcome.total_received,
                "Decision pending"
            );
            return Ok(Decision::Pending(outcome));
        }

        let resolution =
            self.resolver
                .resolve_conflict(&outcome, &proposal, participants, leader_id)?;

        if let Some(successor_id) = &resolution.successor {
            let successor = self.store.get(successor_id)?;
            return Ok(Decision::Revote {
                previous: proposal.id,
                successor,
                resolution,
            });
        }
        match (resolution.resolved, resolution.chosen_option.clone()) {
            (true, Some(option)) => Ok(Decision::Committed {
                proposal_id: proposal.id,
                option,
                outcome,
                resolution: Some(resolution),
            }),
            _ => Err(CoordinatorError::UnresolvedConflict {
                proposal_id: proposal.id,
                explanation: resolution.explanation,
            }),
        }
    }

    /// Stored outcome if closed, else a weighted evaluation that closes the
    /// proposal once it is final. Tally and close share the proposal's lock.
    fn weighted_outcome(
        &self,
        proposal: &Proposal,
        participants: &[Participant],
    ) -> CoordinatorResult<Outcome> {
        let weighted = &self.weighted;
        let outcome = self
            .voting
            .settle_with(&proposal.id, |proposal, responses| {
                let vote = weighted.conduct_weighted_vote(proposal, responses, participants);
                let everyone_answered =
                    vote.total_expected > 0 && vote.total_received >= vote.total_expected;
                Settlement {
                    outcome: vote.to_outcome(),
                    is_final: everyone_answered,
                }
            })?;
        Ok(outcome)
    }

    // =========================================================================
    // Multi-criteria and auctions
    // =========================================================================

    pub fn evaluate_multi_criteria(
        &self,
        options: &[OptionProfile],
        criteria: &[DecisionCriterion],
        context: &ScoringContext,
    ) -> CoordinatorResult<MultiCriteriaOutcome> {
        let analysis = MultiCriteriaAnalysis::new(criteria.to_vec())?;
        let outcome = analysis.evaluate(options, context)?;
        info!(
            best = %outcome.best_option,
            score = outcome.best_score,
            margin = outcome.margin,
            "Options evaluated"
        );
        Ok(outcome)
    }

    /// Allocate a task by auction; `None` means no eligible bidder
    pub fn allocate_task(&self, task: &Task, candidates: &[Participant]) -> Option<AuctionOutcome> {
        let outcome = self.auction.conduct_auction(task, candidates);
        match &outcome {
            Some(o) => info!(
                task_id = %task.id,
                winner = %o.winning_bid.participant_id,
                cost = o.winning_bid.cost,
                savings = o.cost_savings,
                bids = o.all_bids.len(),
                "Task allocated"
            ),
            None => warn!(
                task_id = %task.id,
                candidates = candidates.len(),
                "No eligible bidder"
            ),
        }
        self.metrics.auction_held(outcome.is_some());
        self.event_bus.publish(DecisionEvent::AuctionCompleted {
            task_id: task.id.clone(),
            winner: outcome.as_ref().map(|o| o.winning_bid.participant_id.clone()),
            bids: outcome.as_ref().map(|o| o.all_bids.len()).unwrap_or(0),
            timestamp: Utc::now(),
        });
        outcome
    }

    // =========================================================================
    // Message handling and background loops
    // =========================================================================

    /// Apply one inbound message
    pub fn handle_message(&self, message: DecisionMessage) -> CoordinatorResult<()> {
        match message {
            DecisionMessage::Response(response) => {
                self.submit(response)?;
            }
            DecisionMessage::Cancel {
                proposal_id,
                reason,
            } => {
                self.cancel(&proposal_id, &reason)?;
            }
        }
        Ok(())
    }

    /// Pump the inbox until every sender is dropped, returning how many
    /// messages were applied. A bad message is logged and discarded.
    pub async fn run_inbox(self: Arc<Self>, mut inbox: mpsc::Receiver<DecisionMessage>) -> usize {
        let mut applied = 0;
        while let Some(message) = inbox.recv().await {
            let proposal_id = message.proposal_id().to_string();
            match self.handle_message(message) {
                Ok(()) => applied += 1,
                Err(e) => warn!(proposal_id = %proposal_id, error = %e, "Discarded message"),
            }
        }
        info!(applied, "Inbox closed");
        applied
    }

    /// Sweep expired proposals on an interval until `shutdown` turns true.
    ///
    /// Returns the number of proposals expired over the loop's lifetime.
    pub async fn run_expiry_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = tokio::time::interval(self.config.expiry_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut expired_total = 0;

        info!(
            poll_ms = self.config.expiry_poll_ms,
            "Starting expiry loop"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.expire_stale(Utc::now()) {
                        Ok(expired) if !expired.is_empty() => {
                            debug!(count = expired.len(), "Expired proposals");
                            expired_total += expired.len();
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Expiry sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(expired_total, "Expiry loop stopped");
                        break;
                    }
                }
            }
        }
        expired_total
    }
}
