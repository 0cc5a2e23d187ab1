use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use stickit_game::{
    JumpOrder, MatchEngine, MatchId, MatchPhase, MatchRecord, MatchSession, MatchState, Player,
    RosterLoader, TeamSetup, TurnOutcome,
};

use crate::logic::policy::{OutcomePolicy, OutcomeStrategy};
use crate::storage::HistoryStore;

const DEFAULT_MAX_TURNS: usize = 5_000;

/// Roster, jump order, library and default teams used by simulated matches.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesterAssets {
    pub players: Vec<Player>,
    pub jump_order: JumpOrder,
    pub library: BTreeSet<String>,
    pub teams: Vec<TeamSetup>,
}

impl TesterAssets {
    /// Catalog bundled with the tester.
    pub fn load_default() -> Result<Self> {
        serde_json::from_str(include_str!("../../../data/catalog.json"))
            .context("bundled catalog is not valid JSON")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("catalog {} is not valid JSON", path.display()))
    }
}

/// Serves the tester catalog to the engine, optionally with a different
/// jump order.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    assets: Arc<TesterAssets>,
    jump_order: Option<JumpOrder>,
}

impl CatalogLoader {
    #[must_use]
    pub const fn new(assets: Arc<TesterAssets>) -> Self {
        Self {
            assets,
            jump_order: None,
        }
    }

    #[must_use]
    pub fn with_jump_order(mut self, jump_order: Option<JumpOrder>) -> Self {
        self.jump_order = jump_order;
        self
    }
}

impl RosterLoader for CatalogLoader {
    type Error = Infallible;

    fn load_roster(&self) -> Result<Vec<Player>, Self::Error> {
        Ok(self.assets.players.clone())
    }

    fn load_jump_order(&self) -> Result<JumpOrder, Self::Error> {
        Ok(self
            .jump_order
            .clone()
            .unwrap_or_else(|| self.assets.jump_order.clone()))
    }

    fn load_jump_library(&self) -> Result<BTreeSet<String>, Self::Error> {
        Ok(self.assets.library.clone())
    }
}

/// Declarative plan for running a simulated match.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: OutcomeStrategy,
    pub jump_order: Option<JumpOrder>,
    pub teams: Option<Vec<TeamSetup>>,
    pub probe_undo: bool,
    pub pick_choice_jumps: bool,
    pub max_turns: Option<usize>,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(strategy: OutcomeStrategy) -> Self {
        Self {
            strategy,
            jump_order: None,
            teams: None,
            probe_undo: false,
            pick_choice_jumps: true,
            max_turns: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_jump_order(mut self, jump_order: JumpOrder) -> Self {
        self.jump_order = Some(jump_order);
        self
    }

    #[must_use]
    pub fn with_teams(mut self, teams: Vec<TeamSetup>) -> Self {
        self.teams = Some(teams);
        self
    }

    /// Undo every non-final turn on a copy and compare it with the state
    /// before the turn.
    #[must_use]
    pub const fn with_undo_probe(mut self) -> Self {
        self.probe_undo = true;
        self
    }

    /// Leave choice slots on their placeholder labels.
    #[must_use]
    pub const fn without_choice_picks(mut self) -> Self {
        self.pick_choice_jumps = false;
        self
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulated match finishes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Complete record of a simulated match.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: OutcomeStrategy,
    pub outcomes: Vec<TurnOutcome>,
    pub final_state: MatchState,
    pub record: Option<MatchRecord>,
    pub saved_id: Option<MatchId>,
    pub completed: bool,
    /// Turns whose undo did not restore the state before the turn.
    pub undo_mismatches: usize,
}

impl SimulationSummary {
    #[must_use]
    pub fn turns(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn extensions(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, TurnOutcome::TieExtended { .. }))
            .count()
    }
}

/// Headless deterministic runner for whole matches.
#[derive(Clone)]
pub struct MatchTester {
    verbose: bool,
    assets: Arc<TesterAssets>,
    history: HistoryStore,
}

impl MatchTester {
    pub const fn new(assets: Arc<TesterAssets>, history: HistoryStore, verbose: bool) -> Self {
        Self {
            verbose,
            assets,
            history,
        }
    }

    pub const fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let loader =
            CatalogLoader::new(Arc::clone(&self.assets)).with_jump_order(plan.jump_order.clone());
        let engine = MatchEngine::new(loader, self.history.clone());
        let teams = plan.teams.as_deref().unwrap_or(&self.assets.teams);
        let mut session = engine.start_match(teams)?;

        let mut policy = plan.strategy.create_policy(seed);
        if self.verbose {
            log_initial_state(seed, policy.name(), session.state());
        }

        let max_turns = plan.max_turns.unwrap_or(DEFAULT_MAX_TURNS);
        let mut outcomes = Vec::new();
        let mut undo_mismatches = 0;

        while session.phase() == MatchPhase::InProgress && outcomes.len() < max_turns {
            let before = plan.probe_undo.then(|| session.state().clone());
            let manual = pick_manual_jump(plan, &session, policy.as_mut());
            let result = policy.next_outcome(session.state());
            let outcome = engine
                .play_turn(&mut session, result, manual.as_deref())
                .with_context(|| format!("turn {} was rejected", outcomes.len() + 1))?;

            if self.verbose {
                log_turn(&outcome, &session);
            }

            if let Some(before) = before
                && !matches!(outcome, TurnOutcome::Completed { .. })
                && !undo_restores(&before, session.state())
            {
                undo_mismatches += 1;
            }
            outcomes.push(outcome);
        }

        let completed = session.phase() == MatchPhase::Completed;
        let record = session.completed_record().cloned();
        let saved_id = session.recorder().saved_id();
        Ok(SimulationSummary {
            seed,
            strategy: plan.strategy,
            outcomes,
            final_state: session.into_state(),
            record,
            saved_id,
            completed,
            undo_mismatches,
        })
    }
}

fn pick_manual_jump(
    plan: &SimulationPlan,
    session: &MatchSession,
    policy: &mut (dyn OutcomePolicy + Send),
) -> Option<String> {
    if !plan.pick_choice_jumps {
        return None;
    }
    let state = session.state();
    let slot = state.choice_slot(state.active_team_index())?;
    if state.choices().selection(state.active_player().id, slot).is_some() {
        return None;
    }
    let candidates = session.available_choice_jumps();
    policy.pick_choice(state, &candidates)
}

/// Choice picks survive undo, so only positions, the log and the finish
/// line are compared.
fn undo_restores(before: &MatchState, after: &MatchState) -> bool {
    let mut probe = after.clone();
    if probe.undo().is_none() {
        return false;
    }
    probe.teams() == before.teams()
        && probe.events() == before.events()
        && probe.total_steps() == before.total_steps()
}

fn log_initial_state(seed: u64, policy: &str, state: &MatchState) {
    println!(
        "🎮 Starting match | seed:{seed} policy:{policy} teams:{} finish:{}",
        state.teams().len(),
        state.total_steps()
    );
}

fn log_turn(outcome: &TurnOutcome, session: &MatchSession) {
    let state = session.state();
    if let Some(event) = state.events().last() {
        println!(
            "🎯 Turn {}: {} on '{}' -> {}",
            state.events().len(),
            event.player_name,
            event.jump_name,
            event.result.label()
        );
    }
    match outcome {
        TurnOutcome::TieExtended {
            extra_rounds,
            total_steps,
        } => println!("⏱️  Sudden death #{extra_rounds}: finish line now {total_steps}"),
        TurnOutcome::Completed { winner } => println!("🏁 {winner} wins"),
        TurnOutcome::Ignored | TurnOutcome::Continued => {}
    }
}
