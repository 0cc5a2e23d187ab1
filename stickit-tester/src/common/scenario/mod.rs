pub mod expectations;

use stickit_game::{JumpOrder, TeamSetup};

use crate::logic::{OutcomeStrategy, SimulationPlan};
use expectations::{
    choice_jumps_never_repeat, extensions_are_sequential, match_completes,
    only_choice_jumps_played, placeholders_label_unpicked_slots, record_matches_state,
    stats_are_consistent, undo_is_exact, wins_close_a_round,
};

// Logic test scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

/// Every scenario key in the order `all` runs them.
pub const ALL_SCENARIOS: [&str; 8] = [
    "smoke",
    "undo-exactness",
    "tie-extension",
    "stat-consistency",
    "round-boundary",
    "choice-jumps",
    "placeholder-choices",
    "empty-jump-order",
];

fn smoke_scenario() -> TestScenario {
    TestScenario::simulation(
        "Smoke Test",
        SimulationPlan::new(OutcomeStrategy::Steady)
            .with_expectation(match_completes)
            .with_expectation(record_matches_state),
    )
}

fn undo_scenario() -> TestScenario {
    TestScenario::simulation(
        "Undo Exactness",
        SimulationPlan::new(OutcomeStrategy::Chaos)
            .with_undo_probe()
            .with_expectation(undo_is_exact)
            .with_expectation(match_completes),
    )
}

/// Six single-player teams make simultaneous finishes common.
fn tie_scenario() -> TestScenario {
    let teams = (1..=6)
        .map(|id| TeamSetup::new(id, format!("Solo {id}"), vec![id]))
        .collect();
    TestScenario::simulation(
        "Tie Extension",
        SimulationPlan::new(OutcomeStrategy::Steady)
            .with_teams(teams)
            .with_undo_probe()
            .with_expectation(extensions_are_sequential)
            .with_expectation(wins_close_a_round)
            .with_expectation(match_completes),
    )
}

fn stats_scenario() -> TestScenario {
    TestScenario::simulation(
        "Stat Consistency",
        SimulationPlan::new(OutcomeStrategy::Reckless)
            .with_expectation(stats_are_consistent)
            .with_expectation(record_matches_state),
    )
}

fn round_boundary_scenario() -> TestScenario {
    TestScenario::simulation(
        "Round Boundary",
        SimulationPlan::new(OutcomeStrategy::Cautious)
            .with_expectation(wins_close_a_round)
            .with_expectation(match_completes),
    )
}

fn choice_scenario() -> TestScenario {
    TestScenario::simulation(
        "Choice Jumps",
        SimulationPlan::new(OutcomeStrategy::Chaos)
            .with_expectation(choice_jumps_never_repeat)
            .with_expectation(match_completes),
    )
}

fn placeholder_scenario() -> TestScenario {
    TestScenario::simulation(
        "Placeholder Choices",
        SimulationPlan::new(OutcomeStrategy::Steady)
            .without_choice_picks()
            .with_expectation(placeholders_label_unpicked_slots)
            .with_expectation(match_completes),
    )
}

fn empty_order_scenario() -> TestScenario {
    TestScenario::simulation(
        "Empty Jump Order",
        SimulationPlan::new(OutcomeStrategy::Steady)
            .with_jump_order(JumpOrder::default())
            .with_expectation(only_choice_jumps_played)
            .with_expectation(choice_jumps_never_repeat)
            .with_expectation(match_completes),
    )
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke_scenario()),
        "undo-exactness" | "undo" => Some(undo_scenario()),
        "tie-extension" | "ties" => Some(tie_scenario()),
        "stat-consistency" | "stats" => Some(stats_scenario()),
        "round-boundary" | "rounds" => Some(round_boundary_scenario()),
        "choice-jumps" | "choices" => Some(choice_scenario()),
        "placeholder-choices" | "placeholders" => Some(placeholder_scenario()),
        "empty-jump-order" | "no-base" => Some(empty_order_scenario()),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("undo-exactness", "Undo Exactness"),
        ("tie-extension", "Tie Extension"),
        ("stat-consistency", "Stat Consistency"),
        ("round-boundary", "Round Boundary"),
        ("choice-jumps", "Choice Jumps"),
        ("placeholder-choices", "Placeholder Choices"),
        ("empty-jump-order", "Empty Jump Order"),
    ]
}
