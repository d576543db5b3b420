//! Message and event types for decision coordination
//!
//! Inbound traffic from agents is a [`DecisionMessage`]; everything the
//! subsystem reports back is a [`DecisionEvent`]. Both are closed tagged
//! enums so each variant's fields are checked at compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{
    OutcomeReason, ParticipantId, ProposalId, ProposalKind, ResolutionStrategy, Response, TaskId,
};

/// Inbound message delivered to the coordinator's inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionMessage {
    /// An agent's answer to an open proposal
    Response(Response),
    /// External abort of an open proposal
    Cancel {
        proposal_id: ProposalId,
        reason: String,
    },
}

impl DecisionMessage {
    pub fn proposal_id(&self) -> &str {
        match self {
            Self::Response(response) => &response.proposal_id,
            Self::Cancel { proposal_id, .. } => proposal_id,
        }
    }
}

/// All decision coordination events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionEvent {
    /// A proposal started accepting responses
    ProposalOpened {
        proposal_id: ProposalId,
        kind: ProposalKind,
        options: Vec<String>,
        revote_round: u32,
        timestamp: DateTime<Utc>,
    },

    /// A response was stored
    ResponseRecorded {
        proposal_id: ProposalId,
        participant_id: ParticipantId,
        option: String,
        timestamp: DateTime<Utc>,
    },

    /// A response was discarded
    ResponseRejected {
        proposal_id: ProposalId,
        participant_id: ParticipantId,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A proposal closed with a winner
    ConsensusReached {
        proposal_id: ProposalId,
        winner: String,
        agreement_level: f64,
        unanimous: bool,
        timestamp: DateTime<Utc>,
    },

    /// A proposal closed without a winner
    ConsensusFailed {
        proposal_id: ProposalId,
        reason: OutcomeReason,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// A proposal's deadline passed before it closed
    ProposalExpired {
        proposal_id: ProposalId,
        responses: usize,
        timestamp: DateTime<Utc>,
    },

    /// A proposal was aborted externally
    ProposalCancelled {
        proposal_id: ProposalId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Conflict resolution committed an option
    ConflictResolved {
        proposal_id: ProposalId,
        strategy: ResolutionStrategy,
        chosen_option: String,
        timestamp: DateTime<Utc>,
    },

    /// A failed proposal was replaced by a narrowed revote
    RevoteOpened {
        proposal_id: ProposalId,
        successor_id: ProposalId,
        options: Vec<String>,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// Every strategy failed to produce an answer
    ConflictUnresolved {
        proposal_id: ProposalId,
        explanation: String,
        timestamp: DateTime<Utc>,
    },

    /// A task was allocated by auction, or found no bidder
    AuctionCompleted {
        task_id: TaskId,
        winner: Option<ParticipantId>,
        bids: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DecisionEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ProposalOpened { timestamp, .. } => *timestamp,
            Self::ResponseRecorded { timestamp, .. } => *timestamp,
            Self::ResponseRejected { timestamp, .. } => *timestamp,
            Self::ConsensusReached { timestamp, .. } => *timestamp,
            Self::ConsensusFailed { timestamp, .. } => *timestamp,
            Self::ProposalExpired { timestamp, .. } => *timestamp,
            Self::ProposalCancelled { timestamp, .. } => *timestamp,
            Self::ConflictResolved { timestamp, .. } => *timestamp,
            Self::RevoteOpened { timestamp, .. } => *timestamp,
            Self::ConflictUnresolved { timestamp, .. } => *timestamp,
            Self::AuctionCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProposalOpened { .. } => "proposal_opened",
            Self::ResponseRecorded { .. } => "response_recorded",
            Self::ResponseRejected { .. } => "response_rejected",
            Self::ConsensusReached { .. } => "consensus_reached",
            Self::ConsensusFailed { .. } => "consensus_failed",
            Self::ProposalExpired { .. } => "proposal_expired",
            Self::ProposalCancelled { .. } => "proposal_cancelled",
            Self::ConflictResolved { .. } => "conflict_resolved",
            Self::RevoteOpened { .. } => "revote_opened",
            Self::ConflictUnresolved { .. } => "conflict_unresolved",
            Self::AuctionCompleted { .. } => "auction_completed",
        }
    }

    /// Get the proposal ID if this event is proposal-scoped
    pub fn proposal_id(&self) -> Option<&str> {
        match self {
            Self::ProposalOpened { proposal_id, .. }
            | Self::ResponseRecorded { proposal_id, .. }
            | Self::ResponseRejected { proposal_id, .. }
            | Self::ConsensusReached { proposal_id, .. }
            | Self::ConsensusFailed { proposal_id, .. }
            | Self::ProposalExpired { proposal_id, .. }
            | Self::ProposalCancelled { proposal_id, .. }
            | Self::ConflictResolved { proposal_id, .. }
            | Self::RevoteOpened { proposal_id, .. }
            | Self::ConflictUnresolved { proposal_id, .. } => Some(proposal_id),
            Self::AuctionCompleted { .. } => None,
        }
    }
}
