//! Conflict resolution for proposals that failed to reach consensus
//!
//! Strategies:
//! - **Leader fallback**: the leader's own response, else the highest raw tally
//! - **Compromise**: blend two close leading options into one label
//! - **Revote**: reopen with the top options only, a bounded number of times
//! - **Multi-stage**: drop the least popular option and recount, until one wins
//! - **Hybrid**: compromise, then leader fallback
//!
//! Every result carries an explanation with the tally and threshold numbers
//! that produced it.

use chrono::Utc;
use tracing::{info, warn};

use super::voting::{judge, rank_options, Ballot};
use crate::events::{DecisionEvent, SharedEventBus};
use crate::metrics::SharedMetrics;
use crate::state::{
    describe_tally, Outcome, Participant, Proposal, ProposalDraft, ProposalId, ResolutionOutcome,
    ResolutionStrategy, Response, SharedProposalStore, StoreError, COMPROMISE_SEPARATOR,
    REVOTE_PREFIX,
};

/// Error type for conflict resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Proposal {0} already reached consensus")]
    AlreadyReached(ProposalId),

    #[error("Outcome belongs to {outcome}, not proposal {proposal}")]
    ProposalMismatch {
        outcome: ProposalId,
        proposal: ProposalId,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for conflict resolution
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// Tunables for the resolution strategies
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Strategy used by [`ConflictResolver::resolve_conflict`]
    pub strategy: ResolutionStrategy,
    /// Both leading shares must lie in `compromise_min_share..=compromise_max_share`
    pub compromise_min_share: f64,
    pub compromise_max_share: f64,
    /// Largest gap between the two leading shares
    pub compromise_max_margin: f64,
    /// Share at which an option counts as viable; more than two viable blocks a compromise
    pub viable_share: f64,
    /// Options carried into a revote
    pub revote_top_n: usize,
    /// Revote rounds before leader fallback takes over
    pub max_revotes: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: ResolutionStrategy::Hybrid,
            compromise_min_share: 0.4,
            compromise_max_share: 0.6,
            compromise_max_margin: 0.2,
            viable_share: 0.15,
            revote_top_n: 2,
            max_revotes: 3,
        }
    }
}

/// Everything a strategy looks at
struct Conflict<'a> {
    failed: &'a Outcome,
    proposal: &'a Proposal,
    responses: Vec<Response>,
    participants: &'a [Participant],
    leader_id: Option<&'a str>,
}

impl Conflict<'_> {
    /// The numbers that made the proposal fail
    fn summary(&self) -> String {
        format!(
            "{} with [{}] of {} responses, agreement {:.3} vs threshold {:.3}",
            self.failed.reason,
            describe_tally(&self.proposal.options, &self.failed.tally),
            self.failed.total_received,
            self.failed.agreement_level,
            self.proposal.required_threshold
        )
    }

    fn tally_total(&self) -> u32 {
        self.failed.tally.values().sum()
    }

    /// Options by raw tally, ties in option order
    fn ranked(&self) -> Vec<(String, f64)> {
        rank_options(&self.proposal.options, |o| {
            self.failed.tally.get(o).copied().unwrap_or(0) as f64
        })
    }
}

/// Applies a fallback strategy to a failed outcome
pub struct ConflictResolver {
    store: SharedProposalStore,
    event_bus: SharedEventBus,
    metrics: SharedMetrics,
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(
        store: SharedProposalStore,
        event_bus: SharedEventBus,
        metrics: SharedMetrics,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            event_bus,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve with the configured strategy
    pub fn resolve_conflict(
        &self,
        failed: &Outcome,
        proposal: &Proposal,
        participants: &[Participant],
        leader_id: Option<&str>,
    ) -> ResolutionResult<ResolutionOutcome> {
        self.resolve_with(self.config.strategy, failed, proposal, participants, leader_id)
    }

    /// Resolve with an explicit strategy
    pub fn resolve_with(
        &self,
        strategy: ResolutionStrategy,
        failed: &Outcome,
        proposal: &Proposal,
        participants: &[Participant],
        leader_id: Option<&str>,
    ) -> ResolutionResult<ResolutionOutcome> {
        if failed.reached {
            return Err(ResolutionError::AlreadyReached(proposal.id.clone()));
        }
        if failed.proposal_id != proposal.id {
            return Err(ResolutionError::ProposalMismatch {
                outcome: failed.proposal_id.clone(),
                proposal: proposal.id.clone(),
            });
        }

        let conflict = Conflict {
            failed,
            proposal,
            responses: self.store.responses(&proposal.id)?,
            participants,
            leader_id,
        };

        let outcome = match strategy {
            ResolutionStrategy::LeaderFallback => self.leader_fallback(&conflict, Vec::new(), ""),
            ResolutionStrategy::Compromise | ResolutionStrategy::Hybrid => {
                match self.compromise(&conflict) {
                    Ok(outcome) => outcome,
                    Err(why) => self.leader_fallback(
                        &conflict,
                        vec![ResolutionStrategy::Compromise],
                        &format!("compromise not applicable ({}); ", why),
                    ),
                }
            }
            ResolutionStrategy::Revote => self.revote(&conflict)?,
            ResolutionStrategy::MultiStage => match self.multi_stage(&conflict) {
                Some(outcome) => outcome,
                None => self.leader_fallback(
                    &conflict,
                    vec![ResolutionStrategy::MultiStage],
                    "multi-stage has no responses to recount; ",
                ),
            },
        };

        self.report(&outcome, strategy);
        Ok(outcome)
    }

    // ========================================================================
    // Strategies
    // ========================================================================

    fn leader_fallback(
        &self,
        conflict: &Conflict<'_>,
        mut attempted: Vec<ResolutionStrategy>,
        preface: &str,
    ) -> ResolutionOutcome {
        attempted.push(ResolutionStrategy::LeaderFallback);
        let leader = conflict.leader_id.map(str::to_string).or_else(|| {
            conflict
                .participants
                .iter()
                .find(|p| p.role.is_leader())
                .map(|p| p.id.clone())
        });

        let leader_choice = leader.as_deref().and_then(|id| {
            conflict
                .responses
                .iter()
                .find(|r| r.participant_id == id && conflict.proposal.has_option(&r.chosen_option))
        });

        let (chosen, explanation) = if let Some(response) = leader_choice {
            (
                Some(response.chosen_option.clone()),
                format!(
                    "{}{}; leader {} chose {}",
                    preface,
                    conflict.summary(),
                    response.participant_id,
                    response.chosen_option
                ),
            )
        } else if conflict.tally_total() > 0 {
            let ranked = conflict.ranked();
            let (top, count) = &ranked[0];
            let tied = ranked.iter().filter(|(_, c)| c == count).count();
            (
                Some(top.clone()),
                format!(
                    "{}{}; leader {} did not respond, highest tally {}={}{}",
                    preface,
                    conflict.summary(),
                    leader.as_deref().unwrap_or("(none)"),
                    top,
                    count,
                    if tied > 1 {
                        format!(", first of {} tied options in option order", tied)
                    } else {
                        String::new()
                    }
                ),
            )
        } else {
            (
                None,
                format!(
                    "{}{}; leader {} did not respond and no responses were recorded",
                    preface,
                    conflict.summary(),
                    leader.as_deref().unwrap_or("(none)")
                ),
            )
        };

        ResolutionOutcome {
            proposal_id: conflict.proposal.id.clone(),
            resolved: chosen.is_some(),
            chosen_option: chosen,
            strategy_used: ResolutionStrategy::LeaderFallback,
            attempted,
            explanation,
            successor: None,
        }
    }

    /// Blend the two leading options, or say why that is not possible
    fn compromise(&self, conflict: &Conflict<'_>) -> Result<ResolutionOutcome, String> {
        let cfg = &self.config;
        let total = conflict.tally_total();
        if total == 0 {
            return Err("no responses".to_string());
        }
        let total = total as f64;
        let shares: Vec<(String, f64)> = conflict
            .ranked()
            .into_iter()
            .map(|(o, c)| (o, c / total))
            .collect();

        let viable = shares.iter().filter(|(_, s)| *s >= cfg.viable_share).count();
        if viable > 2 {
            return Err(format!(
                "{} options hold at least {:.2} of responses",
                viable, cfg.viable_share
            ));
        }

        let ((first, first_share), (second, second_share)) = match (shares.first(), shares.get(1)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err("fewer than two options".to_string()),
        };
        let band = cfg.compromise_min_share..=cfg.compromise_max_share;
        if !band.contains(first_share) || !band.contains(second_share) {
            return Err(format!(
                "shares {}={:.2}, {}={:.2} outside {:.2}..={:.2}",
                first, first_share, second, second_share, cfg.compromise_min_share,
                cfg.compromise_max_share
            ));
        }
        let gap = first_share - second_share;
        if gap > cfg.compromise_max_margin + 1e-9 {
            return Err(format!(
                "gap {:.2} exceeds {:.2}",
                gap, cfg.compromise_max_margin
            ));
        }

        let label = format!("{}{}{}", first, COMPROMISE_SEPARATOR, second);
        Ok(ResolutionOutcome {
            proposal_id: conflict.proposal.id.clone(),
            resolved: true,
            chosen_option: Some(label.clone()),
            strategy_used: ResolutionStrategy::Compromise,
            attempted: vec![ResolutionStrategy::Compromise],
            explanation: format!(
                "{}; {}={:.2} and {}={:.2} within {:.2}..={:.2} and gap {:.2} <= {:.2}, blended into {}",
                conflict.summary(),
                first,
                first_share,
                second,
                second_share,
                cfg.compromise_min_share,
                cfg.compromise_max_share,
                gap,
                cfg.compromise_max_margin,
                label
            ),
            successor: None,
        })
    }

    /// Reopen with the top options, or fall back once the round limit is hit
    fn revote(&self, conflict: &Conflict<'_>) -> ResolutionResult<ResolutionOutcome> {
        let proposal = conflict.proposal;
        if proposal.revote_round >= self.config.max_revotes {
            return Ok(self.leader_fallback(
                conflict,
                vec![ResolutionStrategy::Revote],
                &format!(
                    "revote limit {} reached at round {}; ",
                    self.config.max_revotes, proposal.revote_round
                ),
            ));
        }

        let narrowed: Vec<String> = conflict
            .ranked()
            .into_iter()
            .take(self.config.revote_top_n)
            .map(|(o, _)| o)
            .collect();
        let ttl = proposal
            .ttl()
            .to_std()
            .map_err(|e| StoreError::InvalidProposal(e.to_string()))?;
        let draft = ProposalDraft::new(proposal.question.clone(), narrowed.clone(), proposal.kind)
            .threshold(proposal.required_threshold)
            .quorum(proposal.required_quorum)
            .ttl(ttl)
            .expected_participants(proposal.expected_participants);

        let successor = self
            .store
            .supersede(&proposal.id, conflict.failed.clone(), draft)?;

        info!(
            proposal_id = %proposal.id,
            successor_id = %successor.id,
            round = successor.revote_round,
            options = ?successor.options,
            "Revote opened"
        );
        self.metrics.proposal_opened();
        self.metrics.revote_opened();
        self.event_bus.publish(DecisionEvent::ProposalOpened {
            proposal_id: successor.id.clone(),
            kind: successor.kind,
            options: successor.options.clone(),
            revote_round: successor.revote_round,
            timestamp: Utc::now(),
        });
        self.event_bus.publish(DecisionEvent::RevoteOpened {
            proposal_id: proposal.id.clone(),
            successor_id: successor.id.clone(),
            options: successor.options.clone(),
            round: successor.revote_round,
            timestamp: Utc::now(),
        });

        Ok(ResolutionOutcome {
            proposal_id: proposal.id.clone(),
            resolved: false,
            chosen_option: Some(format!("{}{}", REVOTE_PREFIX, narrowed.join(","))),
            strategy_used: ResolutionStrategy::Revote,
            attempted: vec![ResolutionStrategy::Revote],
            explanation: format!(
                "{}; revote round {} of {} on top {} [{}] as {}",
                conflict.summary(),
                successor.revote_round,
                self.config.max_revotes,
                self.config.revote_top_n,
                narrowed.join(", "),
                successor.id
            ),
            successor: Some(successor.id),
        })
    }

    /// Eliminate the least popular option until consensus or a single option remains
    fn multi_stage(&self, conflict: &Conflict<'_>) -> Option<ResolutionOutcome> {
        if conflict.responses.is_empty() {
            return None;
        }
        let proposal = conflict.proposal;
        let mut remaining = proposal.options.clone();
        let mut stages = Vec::new();

        loop {
            let counted: Vec<&Response> = conflict
                .responses
                .iter()
                .filter(|r| remaining.contains(&r.chosen_option))
                .collect();
            let ranked = rank_options(&remaining, |o| {
                counted.iter().filter(|r| r.chosen_option == o).count() as f64
            });
            let verdict = judge(Ballot {
                ranked: &ranked,
                total: counted.len() as f64,
                received: counted.len(),
                threshold: proposal.required_threshold,
                quorum: 0,
                tie_epsilon: 0.0,
                precision: 0,
            });
            stages.push(format!("stage {}: {}", stages.len() + 1, verdict.detail));

            let winner = match (&verdict.leader, verdict.reached, remaining.len()) {
                (Some(leader), true, _) => Some(leader.clone()),
                (_, _, 1) => remaining.first().cloned(),
                _ => None,
            };
            if let Some(winner) = winner {
                return Some(ResolutionOutcome {
                    proposal_id: proposal.id.clone(),
                    resolved: true,
                    chosen_option: Some(winner.clone()),
                    strategy_used: ResolutionStrategy::MultiStage,
                    attempted: vec![ResolutionStrategy::MultiStage],
                    explanation: format!(
                        "{}; {}; {} wins after {} stage(s)",
                        conflict.summary(),
                        stages.join("; "),
                        winner,
                        stages.len()
                    ),
                    successor: None,
                });
            }

            // Lowest count last; among equal lows the later option is last
            let eliminated = ranked.last().map(|(o, _)| o.clone())?;
            stages.push(format!("eliminated {}", eliminated));
            remaining.retain(|o| *o != eliminated);
        }
    }

    fn report(&self, outcome: &ResolutionOutcome, requested: ResolutionStrategy) {
        if let Some(successor) = &outcome.successor {
            self.metrics.resolution(ResolutionStrategy::Revote);
            info!(
                proposal_id = %outcome.proposal_id,
                successor_id = %successor,
                "Conflict deferred to revote"
            );
            return;
        }

        match (&outcome.chosen_option, outcome.resolved) {
            (Some(chosen), true) => {
                info!(
                    proposal_id = %outcome.proposal_id,
                    requested = %requested,
                    strategy = %outcome.strategy_used,
                    option = %chosen,
                    explanation = %outcome.explanation,
                    "Conflict resolved"
                );
                self.metrics.resolution(outcome.strategy_used);
                self.event_bus.publish(DecisionEvent::ConflictResolved {
                    proposal_id: outcome.proposal_id.clone(),
                    strategy: outcome.strategy_used,
                    chosen_option: chosen.clone(),
                    timestamp: Utc::now(),
                });
            }
            _ => {
                warn!(
                    proposal_id = %outcome.proposal_id,
                    requested = %requested,
                    explanation = %outcome.explanation,
                    "Conflict unresolved"
                );
                self.metrics.unresolved_conflict();
                self.event_bus.publish(DecisionEvent::ConflictUnresolved {
                    proposal_id: outcome.proposal_id.clone(),
                    explanation: outcome.explanation.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::metrics::DecisionMetrics;
    use crate::state::{ParticipantRole, ProposalKind, ProposalStatus, ProposalStore};

    fn resolver(config: ResolverConfig) -> ConflictResolver {
        ConflictResolver::new(
            ProposalStore::new().shared(),
            EventBus::new().shared(),
            DecisionMetrics::new().shared(),
            config,
        )
    }

    /// Open a proposal sized to the votes, submit them all, and return the closed outcome
    fn failed_vote(
        resolver: &ConflictResolver,
        options: &[&str],
        votes: &[(&str, &str)],
        threshold: f64,
    ) -> (Proposal, Outcome) {
        let proposal = resolver
            .store
            .open_draft(
                ProposalDraft::new("Where next?", options.to_vec(), ProposalKind::Navigation)
                    .threshold(threshold)
                    .expected_participants(votes.len()),
            )
            .unwrap();
        for (participant, option) in votes {
            resolver
                .store
                .submit(Response::new(&proposal.id, *participant, *option))
                .unwrap();
        }
        let outcome = resolver.store.check_consensus(&proposal.id).unwrap();
        assert!(!outcome.reached);
        (proposal, outcome)
    }

    #[test]
    fn test_leader_response_wins() {
        let r = resolver(ResolverConfig::default());
        let (p, failed) = failed_vote(
            &r,
            &["ridge", "valley"],
            &[("lead", "valley"), ("w1", "ridge"), ("w2", "ridge"), ("w3", "valley")],
            0.6,
        );

        let outcome = r
            .resolve_with(ResolutionStrategy::LeaderFallback, &failed, &p, &[], Some("lead"))
            .unwrap();
        assert!(outcome.resolved);
        assert_eq!(outcome.chosen_option.as_deref(), Some("valley"));
        assert!(outcome.explanation.contains("ridge=2, valley=2"));
        assert!(outcome.explanation.contains("0.600"));
    }

    #[test]
    fn test_leader_from_roster() {
        let r = resolver(ResolverConfig::default());
        let (p, failed) = failed_vote(&r, &["a", "b"], &[("boss", "b"), ("w1", "a")], 0.6);
        let roster = vec![
            Participant::new("w1", ParticipantRole::Worker),
            Participant::new("boss", ParticipantRole::Leader),
        ];
        let outcome = r
            .resolve_with(ResolutionStrategy::LeaderFallback, &failed, &p, &roster, None)
            .unwrap();
        assert_eq!(outcome.chosen_option.as_deref(), Some("b"));
    }

    #[test]
    fn test_silent_leader_uses_tally_then_option_order() {
        let r = resolver(ResolverConfig::default());
        let (p, failed) = failed_vote(&r, &["a", "b", "c"], &[("w1", "b"), ("w2", "c")], 0.6);
        let outcome = r
            .resolve_with(ResolutionStrategy::LeaderFallback, &failed, &p, &[], Some("lead"))
            .unwrap();
        assert_eq!(outcome.chosen_option.as_deref(), Some("b"));
        assert!(outcome.explanation.contains("tied"));
    }

    #[test]
    fn test_no_responses_is_unresolved() {
        let r = resolver(ResolverConfig::default());
        let p = r
            .store
            .open_draft(ProposalDraft::new("q", vec!["a", "b"], ProposalKind::Emergency))
            .unwrap();
        let failed = r.store.cancel(&p.id, "abort").unwrap();

        let outcome = r.resolve_conflict(&failed, &p, &[], Some("lead")).unwrap();
        assert!(outcome.is_unresolved());
        assert!(outcome.chosen_option.is_none());
        assert_eq!(r.metrics.snapshot().unresolved_conflicts, 1);
    }

    #[test]
    fn test_compromise_blends_close_options() {
        let r = resolver(ResolverConfig {
            strategy: ResolutionStrategy::Compromise,
            ..Default::default()
        });
        let votes: Vec<(String, &str)> = (0..10)
            .map(|i| {
                let option = match i {
                    0..=4 => "wedge",
                    5..=8 => "line",
                    _ => "circle",
                };
                (format!("a{}", i), option)
            })
            .collect();
        let votes: Vec<(&str, &str)> = votes.iter().map(|(a, o)| (a.as_str(), *o)).collect();
        let (p, failed) = failed_vote(&r, &["line", "wedge", "circle"], &votes, 0.6);

        let outcome = r.resolve_conflict(&failed, &p, &[], None).unwrap();
        assert!(outcome.resolved);
        assert_eq!(outcome.strategy_used, ResolutionStrategy::Compromise);
        assert_eq!(outcome.chosen_option.as_deref(), Some("wedge+line"));
    }

    #[test]
    fn test_hybrid_falls_back_when_not_close() {
        let r = resolver(ResolverConfig::default());
        let (p, failed) = failed_vote(
            &r,
            &["a", "b", "c"],
            &[("w1", "a"), ("w2", "a"), ("w3", "b"), ("w4", "c")],
            0.6,
        );
        let outcome = r.resolve_conflict(&failed, &p, &[], None).unwrap();
        assert_eq!(outcome.strategy_used, ResolutionStrategy::LeaderFallback);
        assert_eq!(
            outcome.attempted,
            vec![ResolutionStrategy::Compromise, ResolutionStrategy::LeaderFallback]
        );
        assert_eq!(outcome.chosen_option.as_deref(), Some("a"));
        assert!(outcome.explanation.starts_with("compromise not applicable"));
    }

    #[test]
    fn test_revote_supersedes_with_top_options() {
        let r = resolver(ResolverConfig {
            strategy: ResolutionStrategy::Revote,
            ..Default::default()
        });
        let (p, failed) = failed_vote(
            &r,
            &["n", "s", "e", "w"],
            &[("a", "e"), ("b", "e"), ("c", "w"), ("d", "n")],
            0.6,
        );

        let outcome = r.resolve_conflict(&failed, &p, &[], None).unwrap();
        assert!(!outcome.resolved);
        assert!(outcome.is_revote());
        assert_eq!(outcome.chosen_option.as_deref(), Some("REVOTE:e,n"));
        assert_eq!(outcome.revote_options().unwrap(), vec!["e", "n"]);

        let successor_id = outcome.successor.unwrap();
        assert_eq!(r.store.status(&p.id).unwrap(), ProposalStatus::Superseded);
        let successor = r.store.get(&successor_id).unwrap();
        assert_eq!(successor.options, vec!["e", "n"]);
        assert_eq!(successor.parent_id.as_deref(), Some(p.id.as_str()));
        assert_eq!(r.metrics.snapshot().revotes_opened, 1);
    }

    #[test]
    fn test_multi_stage_elimination() {
        let r = resolver(ResolverConfig {
            strategy: ResolutionStrategy::MultiStage,
            ..Default::default()
        });
        let mut votes = Vec::new();
        for (option, n) in [("a", 4), ("b", 3), ("c", 2), ("d", 1)] {
            for i in 0..n {
                votes.push((format!("{}{}", option, i), option));
            }
        }
        let votes: Vec<(&str, &str)> = votes.iter().map(|(a, o)| (a.as_str(), *o)).collect();
        let (p, failed) = failed_vote(&r, &["a", "b", "c", "d"], &votes, 0.6);

        let outcome = r.resolve_conflict(&failed, &p, &[], None).unwrap();
        assert!(outcome.resolved);
        assert_eq!(outcome.strategy_used, ResolutionStrategy::MultiStage);
        assert_eq!(outcome.chosen_option.as_deref(), Some("a"));
        assert!(outcome.explanation.contains("eliminated d"));
        assert!(outcome.explanation.contains("eliminated c"));
        assert!(outcome.explanation.contains("eliminated b"));
    }

    #[test]
    fn test_multi_stage_stops_at_consensus() {
        let r = resolver(ResolverConfig::default());
        let (p, failed) = failed_vote(
            &r,
            &["a", "b", "c"],
            &[("1", "a"), ("2", "a"), ("3", "b"), ("4", "c")],
            0.6,
        );
        let outcome = r
            .resolve_with(ResolutionStrategy::MultiStage, &failed, &p, &[], None)
            .unwrap();
        // b and c tie for last; the later option goes first, then a has 2/3
        assert_eq!(outcome.chosen_option.as_deref(), Some("a"));
        assert!(outcome.explanation.contains("eliminated c"));
        assert!(!outcome.explanation.contains("eliminated b"));
    }

    #[test]
    fn test_rejects_reached_outcome() {
        let r = resolver(ResolverConfig::default());
        let p = r
            .store
            .open_draft(
                ProposalDraft::new("q", vec!["a", "b"], ProposalKind::Task).expected_participants(1),
            )
            .unwrap();
        r.store.submit(Response::new(&p.id, "x", "a")).unwrap();
        let reached = r.store.check_consensus(&p.id).unwrap();
        assert!(reached.reached);

        assert!(matches!(
            r.resolve_conflict(&reached, &p, &[], None),
            Err(ResolutionError::AlreadyReached(_))
        ));
    }
}
