//! Core types for collective decisions
//!
//! These types describe the inputs of a decision cycle: the proposal being
//! decided, the participants taking part, and the responses they submit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Unique identifier for proposals
pub type ProposalId = String;

/// Identifier of a participating agent
pub type ParticipantId = String;

/// Unique identifier for auctioned tasks
pub type TaskId = String;

/// What a proposal is deciding about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// Choosing a heading or waypoint
    Navigation,
    /// Switching the swarm's formation
    Formation,
    /// Group-level coordination (spacing, roles, timing)
    Coordination,
    /// Time-critical response to a hazard
    Emergency,
    /// Assigning a unit of work
    Task,
}

impl std::fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigation => write!(f, "navigation"),
            Self::Formation => write!(f, "formation"),
            Self::Coordination => write!(f, "coordination"),
            Self::Emergency => write!(f, "emergency"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// Role a participant plays in the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Swarm leader, trusted on every kind of question
    Leader,
    /// Route planning specialist
    Navigator,
    /// Formation keeping specialist
    FormationSpecialist,
    /// Inter-agent coordination specialist
    Coordinator,
    /// Hazard and emergency responder
    Responder,
    /// General task executor
    Worker,
    /// Forward scout
    Scout,
}

impl ParticipantRole {
    /// The proposal kind this role specialises in, if any.
    pub fn specialty(&self) -> Option<ProposalKind> {
        match self {
            Self::Navigator => Some(ProposalKind::Navigation),
            Self::FormationSpecialist => Some(ProposalKind::Formation),
            Self::Coordinator => Some(ProposalKind::Coordination),
            Self::Responder => Some(ProposalKind::Emergency),
            Self::Worker => Some(ProposalKind::Task),
            Self::Leader | Self::Scout => None,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl std::fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leader => write!(f, "leader"),
            Self::Navigator => write!(f, "navigator"),
            Self::FormationSpecialist => write!(f, "formation_specialist"),
            Self::Coordinator => write!(f, "coordinator"),
            Self::Responder => write!(f, "responder"),
            Self::Worker => write!(f, "worker"),
            Self::Scout => write!(f, "scout"),
        }
    }
}

/// Operational status of a participant in the roster snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Moving and executing
    Active,
    /// Available but not currently executing
    Idle,
    /// Occupied with another task
    Busy,
    /// Unreachable; never bids
    Offline,
}

/// A point in the swarm's shared frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point on the ground plane
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Snapshot of one participant, supplied per decision cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: ParticipantRole,
    pub position: Position,
    /// Battery / resource level in 0.0–1.0
    pub resource_level: f64,
    pub status: ParticipantStatus,
}

impl Participant {
    /// Create an active participant at the origin with full resources
    pub fn new(id: impl Into<ParticipantId>, role: ParticipantRole) -> Self {
        Self {
            id: id.into(),
            role,
            position: Position::default(),
            resource_level: 1.0,
            status: ParticipantStatus::Active,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_resource_level(mut self, level: f64) -> Self {
        self.resource_level = level.clamp(0.0, 1.0);
        self
    }

    pub fn with_status(mut self, status: ParticipantStatus) -> Self {
        self.status = status;
        self
    }
}

/// Task descriptor used by auction allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub target_location: Position,
    /// Candidates below this resource level do not bid
    pub minimum_resource_level: f64,
    /// Role best suited to the task; `None` means any role
    pub preferred_role: Option<ParticipantRole>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, target_location: Position) -> Self {
        Self {
            id: id.into(),
            target_location,
            minimum_resource_level: 0.0,
            preferred_role: None,
        }
    }

    pub fn with_minimum_resource_level(mut self, level: f64) -> Self {
        self.minimum_resource_level = level;
        self
    }

    pub fn with_preferred_role(mut self, role: ParticipantRole) -> Self {
        self.preferred_role = Some(role);
        self
    }
}

/// A pending question with a fixed option set.
///
/// Immutable once opened; a revote creates a new proposal whose
/// `parent_id` points back at the one it replaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub question: String,
    /// Ordered, distinct, at least two
    pub options: Vec<String>,
    pub kind: ProposalKind,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Share of received responses the leader needs (0.5–1.0)
    pub required_threshold: f64,
    /// Minimum number of responses before consensus can be declared
    pub required_quorum: usize,
    /// Roster size at the time the proposal was opened
    pub expected_participants: usize,
    /// 0 for an original proposal, n for the n-th revote
    pub revote_round: u32,
    /// Proposal this one superseded
    pub parent_id: Option<ProposalId>,
    /// Id of the first proposal in a revote chain
    pub origin_id: ProposalId,
}

impl Proposal {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Position of an option in the declared order
    pub fn option_index(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|o| o == option)
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// How long the proposal was open for
    pub fn ttl(&self) -> Duration {
        self.deadline - self.created_at
    }

    /// Number of responses after which no further input can change the result
    pub fn expected_or_quorum(&self) -> usize {
        if self.expected_participants > 0 {
            self.expected_participants
        } else {
            self.required_quorum
        }
    }
}

/// Parameters for opening a proposal
#[derive(Debug, Clone)]
pub struct ProposalDraft {
    pub question: String,
    pub options: Vec<String>,
    pub kind: ProposalKind,
    pub threshold: f64,
    pub quorum: usize,
    pub ttl: std::time::Duration,
    pub expected_participants: usize,
    pub(crate) lineage: Option<Lineage>,
}

/// Revote ancestry carried by a successor draft
#[derive(Debug, Clone)]
pub(crate) struct Lineage {
    pub parent_id: ProposalId,
    pub origin_id: ProposalId,
    pub round: u32,
}

impl ProposalDraft {
    pub fn new<S: Into<String>>(question: impl Into<String>, options: Vec<S>, kind: ProposalKind) -> Self {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            kind,
            threshold: 0.6,
            quorum: 1,
            ttl: std::time::Duration::from_secs(30),
            expected_participants: 0,
            lineage: None,
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn expected_participants(mut self, expected: usize) -> Self {
        self.expected_participants = expected;
        self
    }

    /// Check the draft's invariants, returning a description of the first violation
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question must not be empty".to_string());
        }
        if self.options.len() < 2 {
            return Err(format!(
                "at least two options required, got {}",
                self.options.len()
            ));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            if option.trim().is_empty() {
                return Err("options must not be empty strings".to_string());
            }
            if !seen.insert(option.as_str()) {
                return Err(format!("duplicate option '{}'", option));
            }
        }
        if !(0.5..=1.0).contains(&self.threshold) {
            return Err(format!(
                "threshold {} outside 0.5..=1.0",
                self.threshold
            ));
        }
        if self.ttl.is_zero() {
            return Err("ttl must be positive".to_string());
        }
        Ok(())
    }

    /// Turn the draft into a proposal opened at `now`
    pub(crate) fn into_proposal(self, now: DateTime<Utc>) -> Result<Proposal, String> {
        self.validate()?;
        let ttl = Duration::from_std(self.ttl).map_err(|e| format!("ttl out of range: {}", e))?;
        let (id, parent_id, origin_id, revote_round) = match self.lineage {
            Some(lineage) => (
                format!("{}-r{}", lineage.origin_id, lineage.round),
                Some(lineage.parent_id),
                lineage.origin_id,
                lineage.round,
            ),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                (id.clone(), None, id, 0)
            }
        };

        Ok(Proposal {
            id,
            question: self.question,
            options: self.options,
            kind: self.kind,
            created_at: now,
            deadline: now + ttl,
            required_threshold: self.threshold,
            required_quorum: self.quorum,
            expected_participants: self.expected_participants,
            revote_round,
            parent_id,
            origin_id,
        })
    }
}

/// One participant's answer to a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub proposal_id: ProposalId,
    pub participant_id: ParticipantId,
    pub chosen_option: String,
    /// Self-reported confidence (0.0–1.0)
    pub confidence: f64,
    pub submitted_at: DateTime<Utc>,
    pub participant_role: ParticipantRole,
    pub participant_position: Position,
    pub participant_resource_level: f64,
}

impl Response {
    /// Create a full-confidence response from an anonymous worker
    pub fn new(
        proposal_id: impl Into<ProposalId>,
        participant_id: impl Into<ParticipantId>,
        chosen_option: impl Into<String>,
    ) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            participant_id: participant_id.into(),
            chosen_option: chosen_option.into(),
            confidence: 1.0,
            submitted_at: Utc::now(),
            participant_role: ParticipantRole::Worker,
            participant_position: Position::default(),
            participant_resource_level: 1.0,
        }
    }

    /// Create a response carrying the participant's roster snapshot
    pub fn from_participant(
        proposal_id: impl Into<ProposalId>,
        participant: &Participant,
        chosen_option: impl Into<String>,
    ) -> Self {
        Self {
            participant_role: participant.role,
            participant_position: participant.position,
            participant_resource_level: participant.resource_level,
            ..Self::new(proposal_id, participant.id.clone(), chosen_option)
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_role(mut self, role: ParticipantRole) -> Self {
        self.participant_role = role;
        self
    }

    pub fn with_resource_level(mut self, level: f64) -> Self {
        self.participant_resource_level = level;
        self
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }
}

/// Lifecycle state of a proposal inside the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Accepting responses
    Open,
    /// Closed with consensus
    Reached,
    /// Closed without consensus (tie, below threshold, timeout, cancelled)
    Failed,
    /// Replaced by a revote
    Superseded,
}

impl ProposalStatus {
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Reached => write!(f, "reached"),
            Self::Failed => write!(f, "failed"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Kind of measurement a decision criterion scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    Distance,
    ResourceCost,
    Time,
    Risk,
    Coverage,
    Efficiency,
    Coordination,
}

impl CriterionType {
    /// Whether smaller raw measurements score higher
    pub fn lower_is_better(&self) -> bool {
        matches!(
            self,
            Self::Distance | Self::ResourceCost | Self::Time | Self::Risk
        )
    }
}

/// One weighted criterion of a multi-criteria decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCriterion {
    pub name: String,
    pub criterion_type: CriterionType,
    /// Relative importance (0.0–1.0); weights are compared, not required to sum to 1
    pub weight: f64,
}

impl DecisionCriterion {
    pub fn new(name: impl Into<String>, criterion_type: CriterionType, weight: f64) -> Self {
        Self {
            name: name.into(),
            criterion_type,
            weight,
        }
    }
}

/// A candidate's offer to perform a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub participant_id: ParticipantId,
    pub cost: f64,
    pub quality: f64,
}

impl Bid {
    pub fn new(participant_id: impl Into<ParticipantId>, cost: f64, quality: f64) -> Self {
        Self {
            participant_id: participant_id.into(),
            cost,
            quality,
        }
    }
}

/// Index a roster by participant id
pub fn roster_index(participants: &[Participant]) -> HashMap<&str, &Participant> {
    participants.iter().map(|p| (p.id.as_str(), p)).collect()
}
