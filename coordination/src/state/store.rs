//! In-memory proposal store
//!
//! Holds open and closed proposals together with their responses. Each
//! proposal sits behind its own mutex so that submitting to one proposal
//! never waits on another; the outer map lock is only held to look up or
//! insert entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::outcome::{Outcome, OutcomeReason};
use super::types::*;
use crate::engine::voting::evaluate_consensus;

/// Error type for proposal store operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Option '{option}' is not offered by proposal {proposal_id}")]
    InvalidOption { proposal_id: String, option: String },

    #[error("Proposal {proposal_id} is already {status}")]
    ProposalClosed {
        proposal_id: String,
        status: ProposalStatus,
    },

    #[error("Confidence {0} outside 0.0..=1.0")]
    InvalidConfidence(f64),

    #[error("Proposal {proposal_id} cannot be superseded while {status}")]
    NotSupersedable {
        proposal_id: String,
        status: ProposalStatus,
    },

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for proposal store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to ProposalStore
pub type SharedProposalStore = Arc<ProposalStore>;

/// What happened to a submitted response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReceipt {
    /// First response from this participant
    Recorded,
    /// Replaced an older response from the same participant
    Replaced,
    /// Older than the stored response; kept the stored one
    IgnoredStale,
}

/// Result of evaluating a proposal, with whether this call closed it
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub closed_now: bool,
}

/// A tally computed for [`ProposalStore::evaluate_with`]
#[derive(Debug, Clone)]
pub struct Settlement {
    pub outcome: Outcome,
    /// No further response can change the result
    pub is_final: bool,
}

#[derive(Debug)]
struct ProposalEntry {
    proposal: Proposal,
    responses: HashMap<ParticipantId, Response>,
    status: ProposalStatus,
    outcome: Option<Outcome>,
    successor: Option<ProposalId>,
}

impl ProposalEntry {
    fn new(proposal: Proposal) -> Self {
        Self {
            proposal,
            responses: HashMap::new(),
            status: ProposalStatus::Open,
            outcome: None,
            successor: None,
        }
    }

    /// Responses ordered by participant id
    fn sorted_responses(&self) -> Vec<Response> {
        let mut responses: Vec<Response> = self.responses.values().cloned().collect();
        responses.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        responses
    }

    fn evaluate(&self) -> Outcome {
        evaluate_consensus(&self.proposal, &self.sorted_responses())
    }

    /// Single transition out of `Open`
    fn close(&mut self, outcome: Outcome) -> Outcome {
        self.status = if outcome.reached {
            ProposalStatus::Reached
        } else {
            ProposalStatus::Failed
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn closed_error(&self) -> StoreError {
        StoreError::ProposalClosed {
            proposal_id: self.proposal.id.clone(),
            status: self.status,
        }
    }
}

/// Store of proposals with per-proposal locking
#[derive(Debug, Default)]
pub struct ProposalStore {
    entries: RwLock<HashMap<ProposalId, Arc<Mutex<ProposalEntry>>>>,
}

impl ProposalStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedProposalStore {
        Arc::new(self)
    }

    fn entry(&self, proposal_id: &str) -> StoreResult<Arc<Mutex<ProposalEntry>>> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        entries
            .get(proposal_id)
            .cloned()
            .ok_or_else(|| StoreError::ProposalNotFound(proposal_id.to_string()))
    }

    fn with_entry<T>(
        &self,
        proposal_id: &str,
        f: impl FnOnce(&mut ProposalEntry) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let entry = self.entry(proposal_id)?;
        let mut guard = entry.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut guard)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a proposal and return its id
    pub fn open(
        &self,
        question: impl Into<String>,
        options: Vec<String>,
        kind: ProposalKind,
        threshold: f64,
        quorum: usize,
        ttl: Duration,
    ) -> StoreResult<ProposalId> {
        let draft = ProposalDraft::new(question, options, kind)
            .threshold(threshold)
            .quorum(quorum)
            .ttl(ttl);
        self.open_draft(draft).map(|p| p.id)
    }

    /// Open a proposal from a fully specified draft
    pub fn open_draft(&self, draft: ProposalDraft) -> StoreResult<Proposal> {
        let proposal = draft
            .into_proposal(Utc::now())
            .map_err(StoreError::InvalidProposal)?;

        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        if entries.contains_key(&proposal.id) {
            return Err(StoreError::InvalidProposal(format!(
                "proposal {} already exists",
                proposal.id
            )));
        }
        entries.insert(
            proposal.id.clone(),
            Arc::new(Mutex::new(ProposalEntry::new(proposal.clone()))),
        );
        Ok(proposal)
    }

    /// Record a response; last write wins by `submitted_at`
    pub fn submit(&self, response: Response) -> StoreResult<SubmitReceipt> {
        if !(0.0..=1.0).contains(&response.confidence) {
            return Err(StoreError::InvalidConfidence(response.confidence));
        }

        let proposal_id = response.proposal_id.clone();
        self.with_entry(&proposal_id, move |entry| {
            if entry.status.is_closed() {
                return Err(entry.closed_error());
            }
            if !entry.proposal.has_option(&response.chosen_option) {
                return Err(StoreError::InvalidOption {
                    proposal_id: entry.proposal.id.clone(),
                    option: response.chosen_option.clone(),
                });
            }

            let previous = entry
                .responses
                .get(&response.participant_id)
                .map(|r| r.submitted_at);
            let receipt = match previous {
                Some(at) if at > response.submitted_at => return Ok(SubmitReceipt::IgnoredStale),
                Some(_) => SubmitReceipt::Replaced,
                None => SubmitReceipt::Recorded,
            };
            entry
                .responses
                .insert(response.participant_id.clone(), response);
            Ok(receipt)
        })
    }

    /// Check consensus, closing the proposal when the result is final.
    ///
    /// A closed proposal returns its stored outcome unchanged.
    pub fn check_consensus(&self, proposal_id: &str) -> StoreResult<Outcome> {
        self.evaluate(proposal_id).map(|e| e.outcome)
    }

    /// Like [`check_consensus`](Self::check_consensus), reporting whether this call closed it
    pub fn evaluate(&self, proposal_id: &str) -> StoreResult<Evaluation> {
        self.evaluate_with(proposal_id, |proposal, responses| {
            let outcome = evaluate_consensus(proposal, responses);
            let expected = proposal.expected_participants;
            Settlement {
                is_final: expected > 0 && outcome.total_received >= expected,
                outcome,
            }
        })
    }

    /// Evaluate with a caller-supplied tally, closing when the result is final.
    ///
    /// The tally and the close happen under the proposal's lock, so a
    /// concurrent submit lands either before the tally or after the close.
    /// A closed proposal returns its stored outcome without calling `tally`.
    pub fn evaluate_with(
        &self,
        proposal_id: &str,
        tally: impl FnOnce(&Proposal, &[Response]) -> Settlement,
    ) -> StoreResult<Evaluation> {
        self.with_entry(proposal_id, |entry| {
            if let Some(outcome) = &entry.outcome {
                return Ok(Evaluation {
                    outcome: outcome.clone(),
                    closed_now: false,
                });
            }

            let settlement = tally(&entry.proposal, &entry.sorted_responses());
            if settlement.outcome.reached || settlement.is_final {
                Ok(Evaluation {
                    outcome: entry.close(settlement.outcome),
                    closed_now: true,
                })
            } else {
                Ok(Evaluation {
                    outcome: settlement.outcome,
                    closed_now: false,
                })
            }
        })
    }

    /// Force-close every open proposal whose deadline has passed
    pub fn expire_stale(&self, now: DateTime<Utc>) -> StoreResult<Vec<Outcome>> {
        let candidates: Vec<Arc<Mutex<ProposalEntry>>> = {
            let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
            entries.values().cloned().collect()
        };

        let mut expired = Vec::new();
        for candidate in candidates {
            let mut entry = candidate.lock().map_err(|_| StoreError::LockPoisoned)?;
            if entry.status.is_closed() || !entry.proposal.is_past_deadline(now) {
                continue;
            }
            let detail = format!(
                "deadline {} passed with {} of {} responses",
                entry.proposal.deadline.to_rfc3339(),
                entry.responses.len(),
                entry.proposal.expected_or_quorum()
            );
            let outcome = entry
                .evaluate()
                .into_failure(OutcomeReason::Timeout, detail);
            expired.push(entry.close(outcome));
        }
        Ok(expired)
    }

    /// Cancel an open proposal
    pub fn cancel(&self, proposal_id: &str, reason: &str) -> StoreResult<Outcome> {
        self.with_entry(proposal_id, |entry| {
            if entry.status.is_closed() {
                return Err(entry.closed_error());
            }
            let detail = format!(
                "cancelled with {} responses: {}",
                entry.responses.len(),
                reason
            );
            let outcome = entry
                .evaluate()
                .into_failure(OutcomeReason::Cancelled, detail);
            Ok(entry.close(outcome))
        })
    }

    /// Replace a failed or open proposal with a revote successor.
    ///
    /// The successor is inserted and the original marked superseded while
    /// the map is write-locked, so no reader sees one without the other.
    pub fn supersede(
        &self,
        proposal_id: &str,
        failed: Outcome,
        mut draft: ProposalDraft,
    ) -> StoreResult<Proposal> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let original_entry = entries
            .get(proposal_id)
            .cloned()
            .ok_or_else(|| StoreError::ProposalNotFound(proposal_id.to_string()))?;
        let mut original = original_entry
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;

        match original.status {
            ProposalStatus::Open | ProposalStatus::Failed => {}
            status => {
                return Err(StoreError::NotSupersedable {
                    proposal_id: proposal_id.to_string(),
                    status,
                })
            }
        }

        draft.lineage = Some(Lineage {
            parent_id: original.proposal.id.clone(),
            origin_id: original.proposal.origin_id.clone(),
            round: original.proposal.revote_round + 1,
        });
        let successor = draft
            .into_proposal(Utc::now())
            .map_err(StoreError::InvalidProposal)?;
        if entries.contains_key(&successor.id) {
            return Err(StoreError::InvalidProposal(format!(
                "proposal {} already exists",
                successor.id
            )));
        }

        if original.outcome.is_none() {
            original.outcome = Some(failed);
        }
        original.status = ProposalStatus::Superseded;
        original.successor = Some(successor.id.clone());

        entries.insert(
            successor.id.clone(),
            Arc::new(Mutex::new(ProposalEntry::new(successor.clone()))),
        );
        Ok(successor)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, proposal_id: &str) -> StoreResult<Proposal> {
        self.with_entry(proposal_id, |entry| Ok(entry.proposal.clone()))
    }

    /// Current responses, ordered by participant id
    pub fn responses(&self, proposal_id: &str) -> StoreResult<Vec<Response>> {
        self.with_entry(proposal_id, |entry| Ok(entry.sorted_responses()))
    }

    pub fn status(&self, proposal_id: &str) -> StoreResult<ProposalStatus> {
        self.with_entry(proposal_id, |entry| Ok(entry.status))
    }

    /// Stored outcome of a closed proposal
    pub fn outcome(&self, proposal_id: &str) -> StoreResult<Option<Outcome>> {
        self.with_entry(proposal_id, |entry| Ok(entry.outcome.clone()))
    }

    /// Revote that replaced this proposal, if any
    pub fn successor(&self, proposal_id: &str) -> StoreResult<Option<ProposalId>> {
        self.with_entry(proposal_id, |entry| Ok(entry.successor.clone()))
    }

    /// Ids of every proposal still accepting responses
    pub fn open_proposals(&self) -> StoreResult<Vec<ProposalId>> {
        let candidates: Vec<Arc<Mutex<ProposalEntry>>> = {
            let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
            entries.values().cloned().collect()
        };
        let mut open = Vec::new();
        for candidate in candidates {
            let entry = candidate.lock().map_err(|_| StoreError::LockPoisoned)?;
            if entry.status == ProposalStatus::Open {
                open.push(entry.proposal.id.clone());
            }
        }
        open.sort();
        Ok(open)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_nav(store: &ProposalStore, expected: usize) -> Proposal {
        store
            .open_draft(
                ProposalDraft::new(
                    "Which heading?",
                    vec!["north", "south", "east"],
                    ProposalKind::Navigation,
                )
                .threshold(0.6)
                .quorum(3)
                .expected_participants(expected),
            )
            .unwrap()
    }

    #[test]
    fn test_open_rejects_bad_proposal() {
        let store = ProposalStore::new();
        let result = store.open(
            "Which heading?",
            vec!["north".to_string()],
            ProposalKind::Navigation,
            0.6,
            1,
            Duration::from_secs(10),
        );
        assert!(matches!(result, Err(StoreError::InvalidProposal(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_option_rejected() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);

        let err = store
            .submit(Response::new(&p.id, "a1", "up"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOption { .. }));
        assert!(store.responses(&p.id).unwrap().is_empty());
        assert_eq!(store.status(&p.id).unwrap(), ProposalStatus::Open);
    }

    #[test]
    fn test_last_write_wins() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);
        let t0 = Utc::now();

        let first = Response::new(&p.id, "a1", "north").submitted_at(t0);
        let later =
            Response::new(&p.id, "a1", "south").submitted_at(t0 + chrono::Duration::seconds(1));
        let stale =
            Response::new(&p.id, "a1", "east").submitted_at(t0 - chrono::Duration::seconds(1));

        assert_eq!(store.submit(first).unwrap(), SubmitReceipt::Recorded);
        assert_eq!(store.submit(later).unwrap(), SubmitReceipt::Replaced);
        assert_eq!(store.submit(stale).unwrap(), SubmitReceipt::IgnoredStale);

        let responses = store.responses(&p.id).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].chosen_option, "south");
    }

    #[test]
    fn test_closed_proposal_rejects_responses() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 3);
        for id in ["a1", "a2", "a3"] {
            store.submit(Response::new(&p.id, id, "north")).unwrap();
        }
        let outcome = store.check_consensus(&p.id).unwrap();
        assert!(outcome.reached);

        let err = store
            .submit(Response::new(&p.id, "a4", "south"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ProposalClosed {
                status: ProposalStatus::Reached,
                ..
            }
        ));
    }

    #[test]
    fn test_provisional_outcome_keeps_proposal_open() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 6);
        store.submit(Response::new(&p.id, "a1", "north")).unwrap();
        store.submit(Response::new(&p.id, "a2", "south")).unwrap();

        let outcome = store.check_consensus(&p.id).unwrap();
        assert!(!outcome.reached);
        assert_eq!(outcome.reason, OutcomeReason::QuorumNotMet);
        assert_eq!(store.status(&p.id).unwrap(), ProposalStatus::Open);
    }

    #[test]
    fn test_expire_stale() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);
        store.submit(Response::new(&p.id, "a1", "north")).unwrap();

        assert!(store.expire_stale(Utc::now()).unwrap().is_empty());

        let later = p.deadline + chrono::Duration::seconds(1);
        let expired = store.expire_stale(later).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].reason, OutcomeReason::Timeout);
        assert!(!expired[0].reached);
        assert_eq!(expired[0].total_received, 1);

        // Second sweep finds nothing
        assert!(store.expire_stale(later).unwrap().is_empty());
    }

    #[test]
    fn test_late_response_accepted_until_expired() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);
        let late = Response::new(&p.id, "a1", "north")
            .submitted_at(p.deadline + chrono::Duration::seconds(5));
        assert_eq!(store.submit(late).unwrap(), SubmitReceipt::Recorded);

        store
            .expire_stale(p.deadline + chrono::Duration::seconds(6))
            .unwrap();
        let err = store
            .submit(Response::new(&p.id, "a2", "north"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ProposalClosed { .. }));
    }

    #[test]
    fn test_cancel_is_distinct_from_timeout() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);
        let outcome = store.cancel(&p.id, "mission abort").unwrap();
        assert_eq!(outcome.reason, OutcomeReason::Cancelled);
        assert!(outcome.detail.contains("mission abort"));
        assert!(store.cancel(&p.id, "again").is_err());
    }

    #[test]
    fn test_supersede_links_successor() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);
        let failed = store.cancel(&p.id, "split").unwrap();

        let draft = ProposalDraft::new(p.question.clone(), vec!["north", "south"], p.kind);
        let successor = store.supersede(&p.id, failed, draft).unwrap();

        assert_eq!(successor.id, format!("{}-r1", p.id));
        assert_eq!(successor.revote_round, 1);
        assert_eq!(store.status(&p.id).unwrap(), ProposalStatus::Superseded);
        assert_eq!(store.successor(&p.id).unwrap(), Some(successor.id.clone()));
        assert_eq!(store.status(&successor.id).unwrap(), ProposalStatus::Open);

        let again = ProposalDraft::new(p.question.clone(), vec!["north", "south"], p.kind);
        let failed = store.outcome(&p.id).unwrap().unwrap();
        assert!(matches!(
            store.supersede(&p.id, failed, again),
            Err(StoreError::NotSupersedable { .. })
        ));
    }

    #[test]
    fn test_evaluate_with_closes_on_final_tally() {
        let store = ProposalStore::new();
        let p = open_nav(&store, 5);
        store.submit(Response::new(&p.id, "a1", "north")).unwrap();

        let pending = store
            .evaluate_with(&p.id, |proposal, responses| Settlement {
                outcome: evaluate_consensus(proposal, responses),
                is_final: false,
            })
            .unwrap();
        assert!(!pending.closed_now);
        assert_eq!(store.status(&p.id).unwrap(), ProposalStatus::Open);

        let closed = store
            .evaluate_with(&p.id, |proposal, responses| {
                assert_eq!(responses.len(), 1);
                Settlement {
                    outcome: evaluate_consensus(proposal, responses),
                    is_final: true,
                }
            })
            .unwrap();
        assert!(closed.closed_now);
        assert_eq!(closed.outcome.total_received, 1);

        // Closed proposals return the stored outcome without tallying again
        let again = store
            .evaluate_with(&p.id, |_, _| panic!("tally ran on a closed proposal"))
            .unwrap();
        assert!(!again.closed_now);
        assert_eq!(again.outcome, closed.outcome);
    }

    #[test]
    fn test_unknown_proposal() {
        let store = ProposalStore::new();
        assert!(matches!(
            store.check_consensus("nope"),
            Err(StoreError::ProposalNotFound(_))
        ));
    }
}
