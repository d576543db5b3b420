//! Multi-criteria option scoring
//!
//! Every option gets a raw measurement per criterion, the measurements are
//! min–max normalised to 0–100 within each criterion (inverted where lower
//! is better), and the weighted normalised scores are summed.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::voting::rank_options;
use crate::state::{CriterionType, DecisionCriterion, MultiCriteriaOutcome, Position};

/// Top of the normalised score range
pub const MAX_SCORE: f64 = 100.0;

/// Error type for multi-criteria evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("No options to evaluate")]
    NoOptions,

    #[error("No criteria given")]
    NoCriteria,

    #[error("Duplicate option: {0}")]
    DuplicateOption(String),

    #[error("Criterion '{name}' has invalid weight {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("Criterion weights must sum to a positive value")]
    NonPositiveWeights,
}

/// Result type for multi-criteria evaluation
pub type CriteriaResult<T> = Result<T, CriteriaError>;

/// An option under evaluation, with any known raw measurements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionProfile {
    pub name: String,
    /// Where choosing this option would take the swarm
    pub location: Option<Position>,
    /// Known raw measurements; these win over derived ones
    pub measurements: HashMap<CriterionType, f64>,
}

impl OptionProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, location: Position) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with(mut self, criterion: CriterionType, raw: f64) -> Self {
        self.measurements.insert(criterion, raw);
        self
    }
}

/// Reference values for deriving raw measurements from positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringContext {
    /// Point distances are measured from, usually the swarm centroid
    pub reference_point: Position,
    /// Units per second used to estimate travel time
    pub travel_speed: f64,
    /// Resource spent per unit travelled
    pub consumption_per_unit: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            reference_point: Position::default(),
            travel_speed: 1.0,
            consumption_per_unit: 1.0,
        }
    }
}

impl ScoringContext {
    pub fn centered_on(reference_point: Position) -> Self {
        Self {
            reference_point,
            ..Default::default()
        }
    }

    /// Raw measurement of one option under one criterion
    pub fn raw_measurement(&self, option: &OptionProfile, criterion: CriterionType) -> f64 {
        if let Some(raw) = option.measurements.get(&criterion) {
            return *raw;
        }
        let distance = option
            .location
            .map(|l| l.distance_to(&self.reference_point))
            .unwrap_or(0.0);
        match criterion {
            CriterionType::Distance => distance,
            CriterionType::ResourceCost => distance * self.consumption_per_unit,
            CriterionType::Time if self.travel_speed > 0.0 => distance / self.travel_speed,
            _ => 0.0,
        }
    }
}

/// Min–max normalise raw values to 0–100.
///
/// All values score 100 when they are equal, since the criterion cannot
/// separate the options.
pub fn normalize(raw: &[f64], lower_is_better: bool) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    raw.iter()
        .map(|v| {
            if span <= f64::EPSILON {
                MAX_SCORE
            } else if lower_is_better {
                (max - v) / span * MAX_SCORE
            } else {
                (v - min) / span * MAX_SCORE
            }
        })
        .collect()
}

/// Multi-criteria decision analysis over a fixed criterion set
#[derive(Debug, Clone)]
pub struct MultiCriteriaAnalysis {
    criteria: Vec<DecisionCriterion>,
}

impl MultiCriteriaAnalysis {
    /// Validate and keep a criterion set
    pub fn new(criteria: Vec<DecisionCriterion>) -> CriteriaResult<Self> {
        if criteria.is_empty() {
            return Err(CriteriaError::NoCriteria);
        }
        for c in &criteria {
            if !c.weight.is_finite() || !(0.0..=1.0).contains(&c.weight) {
                return Err(CriteriaError::InvalidWeight {
                    name: c.name.clone(),
                    weight: c.weight,
                });
            }
        }
        if criteria.iter().map(|c| c.weight).sum::<f64>() <= 0.0 {
            return Err(CriteriaError::NonPositiveWeights);
        }
        Ok(Self { criteria })
    }

    pub fn criteria(&self) -> &[DecisionCriterion] {
        &self.criteria
    }

    /// Score options and pick the best; ties go to the earlier option
    pub fn evaluate(
        &self,
        options: &[OptionProfile],
        context: &ScoringContext,
    ) -> CriteriaResult<MultiCriteriaOutcome> {
        if options.is_empty() {
            return Err(CriteriaError::NoOptions);
        }
        let mut seen = HashSet::new();
        for option in options {
            if !seen.insert(option.name.as_str()) {
                return Err(CriteriaError::DuplicateOption(option.name.clone()));
            }
        }

        let mut per_option_per_criterion: BTreeMap<String, BTreeMap<String, f64>> = options
            .iter()
            .map(|o| (o.name.clone(), BTreeMap::new()))
            .collect();
        let mut totals: HashMap<&str, f64> = options.iter().map(|o| (o.name.as_str(), 0.0)).collect();

        for criterion in &self.criteria {
            let raw: Vec<f64> = options
                .iter()
                .map(|o| context.raw_measurement(o, criterion.criterion_type))
                .collect();
            let scores = normalize(&raw, criterion.criterion_type.lower_is_better());

            for (option, score) in options.iter().zip(scores) {
                if let Some(breakdown) = per_option_per_criterion.get_mut(&option.name) {
                    breakdown.insert(criterion.name.clone(), score);
                }
                if let Some(total) = totals.get_mut(option.name.as_str()) {
                    *total += score * criterion.weight;
                }
            }
        }

        let names: Vec<String> = options.iter().map(|o| o.name.clone()).collect();
        let ranked = rank_options(&names, |o| totals.get(o).copied().unwrap_or(0.0));
        let (best_option, best_score) = ranked[0].clone();
        let runner_up = ranked.get(1).cloned();
        let margin = match &runner_up {
            Some((_, second)) => best_score - second,
            None => best_score,
        };

        debug!(
            best = %best_option,
            best_score,
            margin,
            options = options.len(),
            criteria = self.criteria.len(),
            "Multi-criteria evaluation"
        );

        Ok(MultiCriteriaOutcome {
            best_option,
            best_score,
            runner_up: runner_up.map(|(name, _)| name),
            margin,
            per_option_score: ranked.into_iter().collect(),
            per_option_per_criterion_score: per_option_per_criterion,
        })
    }
}

/// One-shot evaluation without keeping the analysis around
pub fn evaluate_multi_criteria(
    options: &[OptionProfile],
    criteria: &[DecisionCriterion],
    context: &ScoringContext,
) -> CriteriaResult<MultiCriteriaOutcome> {
    MultiCriteriaAnalysis::new(criteria.to_vec())?.evaluate(options, context)
}
