//! Decision state: data model, outcomes, and the proposal store
//!
//! - `types`: proposals, responses, participants, tasks, criteria, bids
//! - `outcome`: results of each decision mechanism and of conflict resolution
//! - `store`: [`ProposalStore`], the per-proposal locked home of open and
//!   closed proposals
//!
//! # Usage
//!
//! ```ignore
//! use swarm_coordination::state::{ProposalDraft, ProposalKind, ProposalStore, Response};
//!
//! let store = ProposalStore::new().shared();
//! let proposal = store.open_draft(
//!     ProposalDraft::new("Which heading?", vec!["north", "south"], ProposalKind::Navigation)
//!         .threshold(0.6)
//!         .quorum(3),
//! )?;
//! store.submit(Response::new(&proposal.id, "agent-1", "north"))?;
//! let outcome = store.check_consensus(&proposal.id)?;
//! ```

pub mod outcome;
pub mod store;
pub mod types;

pub use outcome::{
    describe_tally, AuctionOutcome, MultiCriteriaOutcome, Outcome, OutcomeReason,
    ResolutionOutcome, ResolutionStrategy, WeightedOutcome, COMPROMISE_SEPARATOR, REVOTE_PREFIX,
};
pub use store::{
    Evaluation, ProposalStore, Settlement, SharedProposalStore, StoreError, StoreResult,
    SubmitReceipt,
};
pub use types::{
    roster_index, Bid, CriterionType, DecisionCriterion, Participant, ParticipantId,
    ParticipantRole, ParticipantStatus, Position, Proposal, ProposalDraft, ProposalId,
    ProposalKind, ProposalStatus, Response, Task, TaskId,
};
