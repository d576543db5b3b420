//! Integration tests for collective decision properties
//!
//! Drives the public coordinator API through full decision cycles and checks
//! the properties every mechanism must hold: tally conservation, weighted
//! override, scoring and auction results, bounded revotes, idempotent checks,
//! and tie handling.

use swarm_coordination::{
    evaluate_multi_criteria, Auction, Coordinator, CriterionType, Decision, DecisionConfig,
    DecisionCriterion, DecisionEvent, Mechanism, OptionProfile, OutcomeReason, Participant,
    ParticipantRole, Position, ProposalKind, ProposalStatus, ResolutionStrategy, Response,
    ScoringContext, StoreError, SubmitReceipt, Task,
};

fn coordinator_with(strategy: ResolutionStrategy) -> Coordinator {
    Coordinator::new(DecisionConfig {
        strategy,
        ..Default::default()
    })
}

fn roster(size: usize) -> Vec<Participant> {
    (0..size)
        .map(|i| {
            let role = if i == 0 {
                ParticipantRole::Leader
            } else {
                ParticipantRole::Worker
            };
            Participant::new(format!("agent-{}", i), role)
        })
        .collect()
}

/// Test: tally always sums to the number of counted responses
#[test]
fn test_tally_conserves_responses() {
    let c = coordinator_with(ResolutionStrategy::Hybrid);
    let p = c
        .open_proposal(
            c.draft("Heading?", vec!["n", "e", "s", "w"], ProposalKind::Navigation)
                .quorum(20),
        )
        .unwrap();

    let choices = ["n", "e", "s", "w", "n", "x", "e", "n", "w", "bogus"];
    let mut accepted = 0;
    for (i, choice) in choices.iter().enumerate() {
        if c.submit(Response::new(&p.id, format!("a{}", i), *choice)).is_ok() {
            accepted += 1;
        }
        let outcome = c.check_consensus(&p.id).unwrap();
        let sum: u32 = outcome.tally.values().sum();
        assert_eq!(sum as usize, outcome.total_received);
        assert_eq!(outcome.total_received, accepted);
    }

    // Replacing a response keeps the count unchanged
    let receipt = c.submit(Response::new(&p.id, "a0", "s")).unwrap();
    assert_eq!(receipt, SubmitReceipt::Replaced);
    let outcome = c.check_consensus(&p.id).unwrap();
    assert_eq!(outcome.tally.values().sum::<u32>() as usize, accepted);
    assert_eq!(outcome.total_received, accepted);
}

/// Test: one confident specialist outweighs three unsure, depleted generalists
#[test]
fn test_weighted_minority_beats_counted_majority() {
    let c = coordinator_with(ResolutionStrategy::Hybrid);
    let p = c
        .open_proposal(
            c.draft("Route?", vec!["ridge", "valley"], ProposalKind::Navigation)
                .threshold(0.5)
                .expected_participants(4),
        )
        .unwrap();

    c.submit(
        Response::new(&p.id, "nav", "ridge")
            .with_role(ParticipantRole::Navigator)
            .with_confidence(0.9),
    )
    .unwrap();
    for i in 0..3 {
        c.submit(
            Response::new(&p.id, format!("w{}", i), "valley")
                .with_role(ParticipantRole::Worker)
                .with_resource_level(0.4)
                .with_confidence(0.6),
        )
        .unwrap();
    }

    let weighted = c.weighted_vote(&p.id, &[]).unwrap();
    assert!(weighted.tally["ridge"] > weighted.tally["valley"]);
    assert!(weighted.count_tally["valley"] > weighted.count_tally["ridge"]);

    let decision = c.decide(&p.id, Mechanism::Weighted, &[], None).unwrap();
    assert_eq!(decision.committed_option(), Some("ridge"));
}

/// Test: option totals of 79.5 / 83.5 / 75.0 pick B with a margin of 4
#[test]
fn test_multi_criteria_best_and_margin() {
    let criteria = vec![
        DecisionCriterion::new("coverage", CriterionType::Coverage, 0.5),
        DecisionCriterion::new("efficiency", CriterionType::Efficiency, 0.5),
        DecisionCriterion::new("risk", CriterionType::Risk, 0.5),
    ];
    let options = vec![
        OptionProfile::new("A")
            .with(CriterionType::Coverage, 10.0)
            .with(CriterionType::Efficiency, 59.0)
            .with(CriterionType::Risk, 0.0),
        OptionProfile::new("B")
            .with(CriterionType::Coverage, 30.0)
            .with(CriterionType::Efficiency, 0.0)
            .with(CriterionType::Risk, 33.0),
        OptionProfile::new("C")
            .with(CriterionType::Coverage, 20.0)
            .with(CriterionType::Efficiency, 100.0)
            .with(CriterionType::Risk, 100.0),
    ];

    let outcome = evaluate_multi_criteria(&options, &criteria, &ScoringContext::default()).unwrap();
    assert_eq!(outcome.best_option, "B");
    assert!((outcome.best_score - 83.5).abs() < 1e-6);
    assert!((outcome.margin - 4.0).abs() < 1e-6);
}

/// Test: the cheapest bid wins and savings are measured against the average
#[test]
fn test_auction_cheapest_bid_wins() {
    let task = Task::new("survey", Position::planar(0.0, 0.0));
    let candidates = vec![
        Participant::new("agent1", ParticipantRole::Worker).at(Position::planar(80.0, 0.0)),
        Participant::new("agent2", ParticipantRole::Worker).at(Position::planar(0.0, -55.0)),
        Participant::new("agent3", ParticipantRole::Worker)
            .at(Position::planar(200.0, 0.0))
            .with_resource_level(0.6),
    ];

    let outcome = Auction::default().conduct_auction(&task, &candidates).unwrap();
    let costs: Vec<f64> = outcome.all_bids.iter().map(|b| b.cost).collect();
    for (cost, expected) in costs.iter().zip([40.0, 27.5, 140.0]) {
        assert!((cost - expected).abs() < 1e-9);
    }
    assert_eq!(outcome.winning_bid.participant_id, "agent2");
    let average = (40.0 + 27.5 + 140.0) / 3.0;
    assert!((outcome.cost_savings - (average - 27.5)).abs() < 1e-9);
}

/// Test: an irreconcilable split revotes three times, then the leader decides
#[test]
fn test_revote_bound_ends_in_leader_fallback() {
    let c = coordinator_with(ResolutionStrategy::Revote);
    let roster = roster(4);
    let mut proposal = c
        .open_proposal(
            c.draft("Sector?", vec!["a", "b", "c", "d"], ProposalKind::Coordination)
                .expected_participants(roster.len()),
        )
        .unwrap();
    let origin = proposal.id.clone();

    let mut attempts = 0;
    let committed = loop {
        attempts += 1;
        assert!(attempts <= 4, "revote loop did not terminate");
        for (i, participant) in roster.iter().enumerate() {
            let option = proposal.options[i % proposal.options.len()].clone();
            c.submit(Response::from_participant(&proposal.id, participant, option))
                .unwrap();
        }

        match c
            .decide(&proposal.id, Mechanism::Plain, &roster, Some("agent-0"))
            .unwrap()
        {
            Decision::Revote { successor, .. } => {
                assert_eq!(successor.revote_round, attempts);
                assert_eq!(successor.options.len(), 2);
                proposal = successor;
            }
            decision => break decision,
        }
    };

    assert_eq!(attempts, 4);
    assert_eq!(proposal.id, format!("{}-r3", origin));
    match committed {
        Decision::Committed {
            option,
            resolution: Some(resolution),
            ..
        } => {
            assert_eq!(option, "a");
            assert_eq!(resolution.strategy_used, ResolutionStrategy::LeaderFallback);
            assert_eq!(
                resolution.attempted,
                vec![ResolutionStrategy::Revote, ResolutionStrategy::LeaderFallback]
            );
            assert!(resolution.explanation.contains("revote limit 3"));
        }
        other => panic!("expected leader fallback commit, got {:?}", other),
    }
    assert_eq!(c.metrics().revotes_opened, 3);
}

/// Test: checking a closed proposal twice returns the identical outcome
#[test]
fn test_check_consensus_idempotent() {
    let c = coordinator_with(ResolutionStrategy::Hybrid);
    let p = c
        .open_proposal(
            c.draft("Formation?", vec!["line", "wedge"], ProposalKind::Formation)
                .expected_participants(3),
        )
        .unwrap();
    let mut events = c.subscribe_proposal(&p.id);
    for id in ["x", "y", "z"] {
        c.submit(Response::new(&p.id, id, "wedge")).unwrap();
    }

    let first = c.check_consensus(&p.id).unwrap();
    let second = c.check_consensus(&p.id).unwrap();
    assert_eq!(first, second);
    assert!(first.is_unanimous());
    assert_eq!(c.metrics().consensus_reached, 1);

    let mut reached = 0;
    while let Some(event) = events.try_recv() {
        if matches!(event, DecisionEvent::ConsensusReached { .. }) {
            reached += 1;
        }
    }
    assert_eq!(reached, 1);
}

/// Test: three of six on each side never reaches consensus, even at a 50% threshold
#[test]
fn test_even_split_is_a_tie() {
    let c = coordinator_with(ResolutionStrategy::LeaderFallback);
    let p = c
        .open_proposal(
            c.draft("Advance?", vec!["yes", "no"], ProposalKind::Emergency)
                .threshold(0.5)
                .expected_participants(6),
        )
        .unwrap();
    for i in 0..6 {
        let option = if i % 2 == 0 { "yes" } else { "no" };
        c.submit(Response::new(&p.id, format!("a{}", i), option)).unwrap();
    }

    let outcome = c.check_consensus(&p.id).unwrap();
    assert!(!outcome.reached);
    assert!(outcome.winning_option.is_none());
    assert_eq!(outcome.reason, OutcomeReason::Tie);
    assert_eq!(c.store().status(&p.id).unwrap(), ProposalStatus::Failed);
}

/// Test: a response after close is rejected and never reopens the proposal
#[test]
fn test_response_after_close_rejected() {
    let c = coordinator_with(ResolutionStrategy::Hybrid);
    let p = c
        .open_proposal(
            c.draft("Heading?", vec!["n", "s"], ProposalKind::Navigation).expected_participants(2),
        )
        .unwrap();
    c.submit(Response::new(&p.id, "a", "n")).unwrap();
    c.submit(Response::new(&p.id, "b", "n")).unwrap();
    let closed = c.check_consensus(&p.id).unwrap();
    assert!(closed.reached);

    let err = c.submit(Response::new(&p.id, "c", "s")).unwrap_err();
    assert!(matches!(
        err,
        swarm_coordination::CoordinatorError::Store(StoreError::ProposalClosed { .. })
    ));
    assert_eq!(c.check_consensus(&p.id).unwrap(), closed);
}
