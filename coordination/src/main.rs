//! Swarm decision demo
//!
//! Runs one scripted round of every decision mechanism against a synthetic
//! roster and prints the results as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Defaults
//! swarm-decide
//!
//! # Resolve split votes by revote, with a larger roster
//! swarm-decide --strategy revote --agents 10
//!
//! # Load tunables from a file, then apply SWARM_DECISION_* overrides
//! RUST_LOG=swarm_coordination=debug swarm-decide --config decision.toml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::sync::{mpsc, watch};

use swarm_coordination::engine::weighted::multiplier_table;
use swarm_coordination::{
    Coordinator, CoordinatorError, CriterionType, Decision, DecisionConfig, DecisionCriterion,
    DecisionMessage, Mechanism, OptionProfile, Participant, ParticipantRole, ParticipantStatus,
    Position, ProposalKind, ResolutionStrategy, Response, ScoringContext, Task,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with decision tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resolution strategy for failed votes (overrides the config)
    #[arg(long)]
    strategy: Option<ResolutionStrategy>,

    /// Number of agents in the synthetic roster
    #[arg(long, default_value_t = 6)]
    agents: usize,
}

const ROLES: [ParticipantRole; 6] = [
    ParticipantRole::Leader,
    ParticipantRole::Navigator,
    ParticipantRole::FormationSpecialist,
    ParticipantRole::Worker,
    ParticipantRole::Scout,
    ParticipantRole::Responder,
];

/// Agents on a ring around the origin, leader first, resources tapering off
fn build_roster(size: usize) -> Vec<Participant> {
    (0..size)
        .map(|i| {
            let angle = i as f64 / size as f64 * std::f64::consts::TAU;
            let radius = 20.0 + 15.0 * i as f64;
            let status = if i > 0 && i % 5 == 0 {
                ParticipantStatus::Offline
            } else if i % 2 == 0 {
                ParticipantStatus::Active
            } else {
                ParticipantStatus::Idle
            };
            Participant::new(format!("agent-{}", i), ROLES[i % ROLES.len()])
                .at(Position::planar(radius * angle.cos(), radius * angle.sin()))
                .with_resource_level(1.0 - 0.1 * (i % 8) as f64)
                .with_status(status)
        })
        .collect()
}

fn print_section(name: &str, value: serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&json!({ name: value }))?;
    println!("{}", rendered);
    Ok(())
}

/// Plain vote where most of the roster agrees
fn plain_round(coordinator: &Coordinator, roster: &[Participant]) -> Result<serde_json::Value> {
    let proposal = coordinator.open_proposal(
        coordinator
            .draft("Which heading?", vec!["north", "east", "south"], ProposalKind::Navigation)
            .expected_participants(roster.len()),
    )?;
    for (i, participant) in roster.iter().enumerate() {
        let option = if i % 4 == 3 { "east" } else { "north" };
        coordinator.submit(Response::from_participant(&proposal.id, participant, option))?;
    }
    let decision = coordinator.decide(&proposal.id, Mechanism::Plain, roster, None)?;
    Ok(serde_json::to_value(decision)?)
}

/// Weighted vote where one confident specialist faces unsure generalists
fn weighted_round(coordinator: &Coordinator, roster: &[Participant]) -> Result<serde_json::Value> {
    let proposal = coordinator.open_proposal(
        coordinator
            .draft("Which route?", vec!["ridge", "valley"], ProposalKind::Navigation)
            .threshold(0.5)
            .expected_participants(roster.len()),
    )?;
    for participant in roster {
        let response = if participant.role == ParticipantRole::Navigator {
            Response::from_participant(&proposal.id, participant, "ridge").with_confidence(0.9)
        } else {
            Response::from_participant(&proposal.id, participant, "valley")
                .with_confidence(0.6)
                .with_resource_level(0.4)
                .with_role(ParticipantRole::Scout)
        };
        coordinator.submit(response)?;
    }

    let weighted = coordinator.weighted_vote(&proposal.id, roster)?;
    let decision = coordinator.decide(&proposal.id, Mechanism::Weighted, roster, None)?;
    let multipliers = multiplier_table(proposal.kind, &coordinator.config().weighting());
    Ok(json!({
        "tally": weighted,
        "decision": decision,
        "multipliers": multipliers,
    }))
}

/// Split vote driven through the configured resolution strategy, revoting as needed
fn contested_round(coordinator: &Coordinator, roster: &[Participant]) -> Result<serde_json::Value> {
    let leader_id = roster
        .iter()
        .find(|p| p.role.is_leader())
        .map(|p| p.id.clone());
    let mut proposal = coordinator.open_proposal(
        coordinator
            .draft(
                "Which formation?",
                vec!["wedge", "line", "column", "circle"],
                ProposalKind::Formation,
            )
            .expected_participants(roster.len()),
    )?;

    let mut rounds = Vec::new();
    loop {
        for (i, participant) in roster.iter().enumerate() {
            let option = &proposal.options[i % proposal.options.len()];
            coordinator.submit(Response::from_participant(&proposal.id, participant, option.as_str()))?;
        }
        match coordinator.decide(&proposal.id, Mechanism::Plain, roster, leader_id.as_deref()) {
            Ok(Decision::Revote {
                successor,
                resolution,
                ..
            }) => {
                rounds.push(serde_json::to_value(&resolution)?);
                proposal = successor;
            }
            Ok(decision) => {
                rounds.push(serde_json::to_value(&decision)?);
                break;
            }
            Err(CoordinatorError::UnresolvedConflict {
                proposal_id,
                explanation,
            }) => {
                rounds.push(json!({ "unresolved": proposal_id, "explanation": explanation }));
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(json!(rounds))
}

fn criteria_round(coordinator: &Coordinator) -> Result<serde_json::Value> {
    let criteria = vec![
        DecisionCriterion::new("distance", CriterionType::Distance, 0.4),
        DecisionCriterion::new("coverage", CriterionType::Coverage, 0.8),
        DecisionCriterion::new("risk", CriterionType::Risk, 0.6),
    ];
    let options = vec![
        OptionProfile::new("north-field")
            .at(Position::planar(0.0, 120.0))
            .with(CriterionType::Coverage, 0.7)
            .with(CriterionType::Risk, 0.2),
        OptionProfile::new("river-bend")
            .at(Position::planar(60.0, 40.0))
            .with(CriterionType::Coverage, 0.5)
            .with(CriterionType::Risk, 0.4),
        OptionProfile::new("old-quarry")
            .at(Position::planar(-30.0, -20.0))
            .with(CriterionType::Coverage, 0.3)
            .with(CriterionType::Risk, 0.7),
    ];
    let outcome = coordinator.evaluate_multi_criteria(
        &options,
        &criteria,
        &ScoringContext::centered_on(Position::default()),
    )?;
    Ok(serde_json::to_value(outcome)?)
}

fn auction_round(coordinator: &Coordinator, roster: &[Participant]) -> Result<serde_json::Value> {
    let task = Task::new("survey-ridge", Position::planar(40.0, 30.0))
        .with_minimum_resource_level(0.3)
        .with_preferred_role(ParticipantRole::Scout);
    let outcome = coordinator.allocate_task(&task, roster);
    Ok(json!({ "task": task, "outcome": outcome }))
}

/// Responses delivered through the message inbox instead of direct calls
async fn inbox_round(
    coordinator: &std::sync::Arc<Coordinator>,
    roster: &[Participant],
) -> Result<serde_json::Value> {
    let proposal = coordinator.open_proposal(
        coordinator
            .draft("Hold position?", vec!["hold", "advance"], ProposalKind::Coordination)
            .expected_participants(roster.len()),
    )?;

    let (tx, rx) = mpsc::channel(roster.len().max(1));
    let pump = tokio::spawn(coordinator.clone().run_inbox(rx));
    for participant in roster {
        let message =
            DecisionMessage::Response(Response::from_participant(&proposal.id, participant, "hold"));
        tx.send(message).await.context("inbox closed early")?;
    }
    drop(tx);
    let applied = pump.await?;

    let outcome = coordinator.check_consensus(&proposal.id)?;
    Ok(json!({ "applied": applied, "outcome": outcome }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("swarm_coordination=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => DecisionConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DecisionConfig::from_env(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    config.validate()?;

    let roster = build_roster(args.agents.max(2));
    let coordinator = Coordinator::new(config).shared();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(coordinator.clone().run_expiry_loop(shutdown_rx));

    print_section("roster", serde_json::to_value(&roster)?)?;
    print_section("plain", plain_round(&coordinator, &roster)?)?;
    print_section("weighted", weighted_round(&coordinator, &roster)?)?;
    print_section("contested", contested_round(&coordinator, &roster)?)?;
    print_section("multi_criteria", criteria_round(&coordinator)?)?;
    print_section("auction", auction_round(&coordinator, &roster)?)?;
    print_section("inbox", inbox_round(&coordinator, &roster).await?)?;

    shutdown_tx.send(true)?;
    let expired = sweeper.await?;
    print_section(
        "metrics",
        json!({ "snapshot": coordinator.metrics(), "expired_by_sweeper": expired }),
    )?;

    Ok(())
}
