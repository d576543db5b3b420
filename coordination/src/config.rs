//! Decision subsystem configuration
//!
//! Every tunable threshold of the decision mechanisms lives here as a named,
//! overridable value. Configuration is assembled from defaults, an optional
//! TOML file, and `SWARM_DECISION_*` environment variables, in that order.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::auction::AuctionConfig;
use crate::engine::resolver::ResolverConfig;
use crate::engine::weighted::WeightingConfig;
use crate::state::ResolutionStrategy;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration for the decision subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Share of received responses the leading option needs
    pub default_threshold: f64,
    /// Minimum responses before consensus can be declared
    pub default_quorum: usize,
    /// Seconds a proposal stays open
    pub default_ttl_secs: u64,
    /// Strategy applied when consensus fails
    pub strategy: ResolutionStrategy,
    /// Lowest share either leading option may hold for a compromise
    pub compromise_min_share: f64,
    /// Highest share either leading option may hold for a compromise
    pub compromise_max_share: f64,
    /// Largest gap between the two leading shares for a compromise
    pub compromise_max_margin: f64,
    /// Share at which an option counts as viable
    pub viable_share: f64,
    /// How many options survive into a revote (2 or 3)
    pub revote_top_n: usize,
    /// Revote rounds allowed before falling back to the leader
    pub max_revotes: u32,
    /// Bid costs closer than this are compared on quality
    pub auction_tie_epsilon: f64,
    /// Interval of the expiry sweep
    pub expiry_poll_ms: u64,
    /// Broadcast capacity of the event bus
    pub event_capacity: usize,
    /// Multiplier for a role voting on its specialty
    pub specialty_multiplier: f64,
    /// Multiplier for the leader role on any kind
    pub leader_multiplier: f64,
    /// Weight a fully depleted participant still carries
    pub resource_floor: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.6,
            default_quorum: 1,
            default_ttl_secs: 30,
            strategy: ResolutionStrategy::Hybrid,
            compromise_min_share: 0.4,
            compromise_max_share: 0.6,
            compromise_max_margin: 0.2,
            viable_share: 0.15,
            revote_top_n: 2,
            max_revotes: 3,
            auction_tie_epsilon: 0.01,
            expiry_poll_ms: 500,
            event_capacity: crate::events::CHANNEL_CAPACITY,
            specialty_multiplier: 1.5,
            leader_multiplier: 1.3,
            resource_floor: 0.5,
        }
    }
}

impl DecisionConfig {
    /// Defaults overridden by `SWARM_DECISION_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(toml_str: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (environment or test map)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse::<T>().ok())
        }

        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_THRESHOLD") {
            self.default_threshold = v.clamp(0.5, 1.0);
        }
        if let Some(v) = parsed(&lookup, "SWARM_DECISION_QUORUM") {
            self.default_quorum = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "SWARM_DECISION_TTL_SECS").filter(|v| *v > 0) {
            self.default_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "SWARM_DECISION_STRATEGY") {
            self.strategy = v;
        }
        if let Some(v) = parsed(&lookup, "SWARM_DECISION_REVOTE_TOP_N") {
            self.revote_top_n = v;
        }
        if let Some(v) = parsed(&lookup, "SWARM_DECISION_MAX_REVOTES") {
            self.max_revotes = v;
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_COMPROMISE_MIN_SHARE") {
            self.compromise_min_share = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_COMPROMISE_MAX_SHARE") {
            self.compromise_max_share = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_COMPROMISE_MAX_MARGIN") {
            self.compromise_max_margin = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_VIABLE_SHARE") {
            self.viable_share = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_AUCTION_TIE_EPSILON")
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            self.auction_tie_epsilon = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "SWARM_DECISION_EXPIRY_POLL_MS").filter(|v| *v > 0)
        {
            self.expiry_poll_ms = v;
        }
        if let Some(v) = parsed::<usize>(&lookup, "SWARM_DECISION_EVENT_CAPACITY").filter(|v| *v > 0)
        {
            self.event_capacity = v;
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_SPECIALTY_MULTIPLIER")
            .filter(|v| v.is_finite() && *v > 0.0)
        {
            self.specialty_multiplier = v;
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_LEADER_MULTIPLIER")
            .filter(|v| v.is_finite() && *v > 0.0)
        {
            self.leader_multiplier = v;
        }
        if let Some(v) = parsed::<f64>(&lookup, "SWARM_DECISION_RESOURCE_FLOOR") {
            self.resource_floor = v.clamp(0.0, 1.0);
        }
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.5..=1.0).contains(&self.default_threshold) {
            return Err(ConfigError::Invalid(format!(
                "default_threshold {} outside 0.5..=1.0",
                self.default_threshold
            )));
        }
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Invalid("default_ttl_secs must be positive".into()));
        }
        if !(2..=3).contains(&self.revote_top_n) {
            return Err(ConfigError::Invalid(format!(
                "revote_top_n must be 2 or 3, got {}",
                self.revote_top_n
            )));
        }
        for (name, value) in [
            ("compromise_min_share", self.compromise_min_share),
            ("compromise_max_share", self.compromise_max_share),
            ("compromise_max_margin", self.compromise_max_margin),
            ("viable_share", self.viable_share),
            ("resource_floor", self.resource_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} {} outside 0.0..=1.0",
                    name, value
                )));
            }
        }
        if self.compromise_min_share > self.compromise_max_share {
            return Err(ConfigError::Invalid(format!(
                "compromise_min_share {} exceeds compromise_max_share {}",
                self.compromise_min_share, self.compromise_max_share
            )));
        }
        if !(self.auction_tie_epsilon.is_finite() && self.auction_tie_epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "auction_tie_epsilon {} must be finite and >= 0",
                self.auction_tie_epsilon
            )));
        }
        for (name, value) in [
            ("specialty_multiplier", self.specialty_multiplier),
            ("leader_multiplier", self.leader_multiplier),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} {} must be finite and positive",
                    name, value
                )));
            }
        }
        if self.expiry_poll_ms == 0 {
            return Err(ConfigError::Invalid("expiry_poll_ms must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn expiry_poll_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_poll_ms.max(1))
    }

    pub fn weighting(&self) -> WeightingConfig {
        WeightingConfig {
            specialty_multiplier: self.specialty_multiplier,
            leader_multiplier: self.leader_multiplier,
            resource_floor: self.resource_floor,
        }
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            strategy: self.strategy,
            compromise_min_share: self.compromise_min_share,
            compromise_max_share: self.compromise_max_share,
            compromise_max_margin: self.compromise_max_margin,
            viable_share: self.viable_share,
            revote_top_n: self.revote_top_n.clamp(2, 3),
            max_revotes: self.max_revotes,
        }
    }

    pub fn auction(&self) -> AuctionConfig {
        AuctionConfig {
            tie_epsilon: self.auction_tie_epsilon,
        }
    }
}
