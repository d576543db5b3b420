//! Swarm Collective Decision Library
//!
//! This library lets a swarm of agents reach decisions together:
//! - Proposals with a fixed option set, answered by participant responses
//! - Plain and expertise-weighted consensus voting
//! - Multi-criteria scoring of options and auction-based task allocation
//! - Conflict resolution when consensus fails (leader fallback, compromise,
//!   revote, multi-stage elimination, hybrid)
//!
//! # Components
//!
//! - [`state`]: data model and the per-proposal locked [`ProposalStore`]
//! - [`engine`]: the decision mechanisms and the [`ConflictResolver`]
//! - [`events`]: typed inbound messages and the broadcast [`EventBus`]
//! - [`coordinator`]: the [`Coordinator`] that owns and drives everything
//! - [`config`] and [`metrics`]: tunables and the observability counters
//!
//! # Usage
//!
//! ```ignore
//! use swarm_coordination::{Coordinator, DecisionConfig, Mechanism, ProposalKind, Response};
//!
//! let coordinator = Coordinator::new(DecisionConfig::from_env());
//! let proposal = coordinator.open_proposal(
//!     coordinator
//!         .draft("Which heading?", vec!["north", "south"], ProposalKind::Navigation)
//!         .expected_participants(roster.len()),
//! )?;
//! coordinator.submit(Response::from_participant(&proposal.id, &roster[0], "north"))?;
//! match coordinator.decide(&proposal.id, Mechanism::Plain, &roster, Some("leader-1"))? {
//!     Decision::Committed { option, .. } => steer(option),
//!     Decision::Pending(_) => {}
//!     Decision::Revote { successor, .. } => ask_again(successor),
//! }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod state;

// Re-export configuration
pub use config::{ConfigError, ConfigResult, DecisionConfig};

// Re-export coordinator types
pub use coordinator::{
    Coordinator, CoordinatorError, CoordinatorResult, Decision, Mechanism, SharedCoordinator,
};

// Re-export decision mechanisms
pub use engine::{
    evaluate_consensus, evaluate_multi_criteria, Auction, AuctionConfig, ConflictResolver,
    CriteriaError, MultiCriteriaAnalysis, OptionProfile, ResolutionError, ResolverConfig,
    ScoringContext, VotingSystem, WeightedVoting, WeightingConfig,
};

// Re-export event types
pub use events::{
    DecisionEvent, DecisionMessage, EventBus, EventFilter, FilteredReceiver, SharedEventBus,
};

// Re-export metrics
pub use metrics::{DecisionMetrics, MetricsSnapshot, SharedMetrics};

// Re-export key state types
pub use state::{
    AuctionOutcome, Bid, CriterionType, DecisionCriterion, MultiCriteriaOutcome, Outcome,
    OutcomeReason, Participant, ParticipantRole, ParticipantStatus, Position, Proposal,
    ProposalDraft, ProposalKind, ProposalStatus, ProposalStore, ResolutionOutcome,
    ResolutionStrategy, Response, Settlement, SharedProposalStore, StoreError, SubmitReceipt, Task,
    WeightedOutcome,
};
