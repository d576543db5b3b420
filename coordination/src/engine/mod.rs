//! Decision mechanisms
//!
//! - [`voting`]: plain one-response-one-vote consensus and the [`VotingSystem`]
//! - [`weighted`]: expertise, resource, and confidence weighted voting
//! - [`criteria`]: multi-criteria scoring of options
//! - [`auction`]: lowest-cost task allocation
//! - [`resolver`]: fallback strategies when consensus fails

pub mod auction;
pub mod criteria;
pub mod resolver;
pub mod voting;
pub mod weighted;

pub use auction::{Auction, AuctionConfig};
pub use criteria::{
    evaluate_multi_criteria, CriteriaError, CriteriaResult, MultiCriteriaAnalysis, OptionProfile,
    ScoringContext,
};
pub use resolver::{ConflictResolver, ResolutionError, ResolutionResult, ResolverConfig};
pub use voting::{evaluate_consensus, VotingSystem};
pub use weighted::{expertise_multiplier, resource_multiplier, WeightedVoting, WeightingConfig};
