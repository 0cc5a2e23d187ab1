//! Match turn engine.
//!
//! Teams take turns in a fixed rotation, and each team rotates through its
//! own players. Outcomes move the acting team along the jump order and then
//! through the choice-jump slots. The finish line is only checked once the
//! last team in the rotation has jumped, so every team completes the round
//! first. Two or more teams finishing in the same round add one more choice
//! slot for everybody (sudden death).
use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::choice::{ChoiceJumpBook, ChoiceJumpError, choice_label};
use crate::constants::{FINAL_CHOICE_JUMP_LABEL, LOG_TARGET_TURN, MATCH_COMPLETE_LABEL};
use crate::events::{GameEvent, MatchStats, Outcome};
use crate::numbers::usize_to_u32;
use crate::roster::{JumpOrder, MatchSetupError, Player, Team, TeamId, validate_teams};
use crate::rules::MatchRules;

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    InProgress,
    Completed,
}

/// What a call to [`MatchState::apply_outcome`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TurnOutcome {
    /// The match already has a winner; nothing changed.
    Ignored,
    /// The turn was recorded and play continues.
    Continued,
    /// Several teams finished together; the finish line moved out by one.
    TieExtended { extra_rounds: u32, total_steps: u32 },
    /// Exactly one team finished at the round boundary.
    Completed { winner: String },
}

/// Complete state of one match.
///
/// Deserializing validates the teams and rules the same way
/// [`MatchState::new`] does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredMatchState")]
pub struct MatchState {
    teams: Vec<Team>,
    jump_order: JumpOrder,
    rules: MatchRules,
    events: Vec<GameEvent>,
    choices: ChoiceJumpBook,
    winner: Option<usize>,
    /// Turn counts at which a tie extended the finish line.
    extensions: Vec<usize>,
}

#[derive(Deserialize)]
struct StoredMatchState {
    teams: Vec<Team>,
    jump_order: JumpOrder,
    rules: MatchRules,
    events: Vec<GameEvent>,
    choices: ChoiceJumpBook,
    winner: Option<usize>,
    extensions: Vec<usize>,
}

impl TryFrom<StoredMatchState> for MatchState {
    type Error = MatchSetupError;

    fn try_from(stored: StoredMatchState) -> Result<Self, Self::Error> {
        validate_teams(&stored.teams)?;
        stored.rules.validate()?;
        Ok(Self {
            teams: stored.teams,
            jump_order: stored.jump_order,
            rules: stored.rules,
            events: stored.events,
            choices: stored.choices,
            winner: stored.winner,
            extensions: stored.extensions,
        })
    }
}

impl MatchState {
    /// Start a match with every team on the start line.
    ///
    /// # Errors
    ///
    /// Returns an error when the teams or the rules are unusable.
    pub fn new(
        mut teams: Vec<Team>,
        jump_order: JumpOrder,
        rules: MatchRules,
    ) -> Result<Self, MatchSetupError> {
        validate_teams(&teams)?;
        rules.validate()?;
        for team in &mut teams {
            team.position = 0;
        }
        Ok(Self {
            teams,
            jump_order,
            rules,
            events: Vec::new(),
            choices: ChoiceJumpBook::new(),
            winner: None,
            extensions: Vec::new(),
        })
    }

    /// Start a match under the standard rules.
    ///
    /// # Errors
    ///
    /// Returns an error when the teams are unusable.
    pub fn with_default_rules(
        teams: Vec<Team>,
        jump_order: JumpOrder,
    ) -> Result<Self, MatchSetupError> {
        Self::new(teams, jump_order, MatchRules::default())
    }

    #[must_use]
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    #[must_use]
    pub const fn jump_order(&self) -> &JumpOrder {
        &self.jump_order
    }

    #[must_use]
    pub const fn rules(&self) -> &MatchRules {
        &self.rules
    }

    #[must_use]
    pub const fn choices(&self) -> &ChoiceJumpBook {
        &self.choices
    }

    pub const fn choices_mut(&mut self) -> &mut ChoiceJumpBook {
        &mut self.choices
    }

    #[must_use]
    pub fn winner(&self) -> Option<&Team> {
        self.winner.and_then(|index| self.teams.get(index))
    }

    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        if self.winner.is_some() {
            MatchPhase::Completed
        } else {
            MatchPhase::InProgress
        }
    }

    #[must_use]
    pub fn stats(&self) -> MatchStats {
        MatchStats::from_events(&self.events)
    }

    #[must_use]
    pub fn extra_rounds(&self) -> u32 {
        usize_to_u32(self.extensions.len())
    }

    /// The finish line: every base jump, the choice slots, plus one slot per
    /// sudden-death extension.
    #[must_use]
    pub fn total_steps(&self) -> u32 {
        usize_to_u32(self.jump_order.len())
            .saturating_add(self.rules.choice_jump_slots)
            .saturating_add(self.extra_rounds())
    }

    #[must_use]
    pub fn turn_index(&self) -> usize {
        self.events.len()
    }

    /// 1-based round currently being played.
    #[must_use]
    pub fn round_number(&self) -> usize {
        self.turn_index() / self.teams.len() + 1
    }

    #[must_use]
    pub fn active_team_index(&self) -> usize {
        self.turn_index() % self.teams.len()
    }

    #[must_use]
    pub fn active_team(&self) -> &Team {
        &self.teams[self.active_team_index()]
    }

    #[must_use]
    pub fn is_last_team_in_round(&self) -> bool {
        self.active_team_index() == self.teams.len() - 1
    }

    /// Player due to jump for the active team, rotating through its roster.
    #[must_use]
    pub fn active_player(&self) -> &Player {
        self.next_player_for(self.active_team_index())
    }

    fn next_player_for(&self, team_index: usize) -> &Player {
        let team = &self.teams[team_index];
        let prior_turns = self
            .events
            .iter()
            .filter(|event| event.team_id == team.id)
            .count();
        &team.players[prior_turns % team.players.len()]
    }

    /// 1-based choice slot the team is on, if it is past the base order.
    #[must_use]
    pub fn choice_slot(&self, team_index: usize) -> Option<u32> {
        let position = self.teams.get(team_index)?.position;
        let base = usize_to_u32(self.jump_order.len());
        (position >= base).then(|| position - base + 1)
    }

    #[must_use]
    pub fn is_on_choice_jump(&self, team_index: usize) -> bool {
        self.choice_slot(team_index).is_some()
    }

    /// Jump the active player is attempting.
    #[must_use]
    pub fn current_jump_name(&self) -> String {
        let team_index = self.active_team_index();
        let team = &self.teams[team_index];
        match self.choice_slot(team_index) {
            None => self
                .jump_order
                .get(team.position)
                .map_or_else(|| choice_label(1), str::to_owned),
            Some(slot) => self
                .choices
                .selection(self.active_player().id, slot)
                .map_or_else(|| choice_label(slot), str::to_owned),
        }
    }

    /// Choice-jump candidates for the active player, or nothing when the
    /// active team is still on the base order.
    #[must_use]
    pub fn available_choice_jumps<'a, I>(&self, library: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(slot) = self.choice_slot(self.active_team_index()) else {
            return Vec::new();
        };
        self.choices
            .candidates(self.active_player().id, slot, library, &self.jump_order)
    }

    /// Record the active player's pick for the active team's choice slot.
    ///
    /// # Errors
    ///
    /// Returns an error when the team is not on a choice jump or the player
    /// already holds the jump for another slot.
    pub fn select_choice_jump(&mut self, jump: &str) -> Result<(), ChoiceJumpError> {
        let slot = self
            .choice_slot(self.active_team_index())
            .ok_or(ChoiceJumpError::NotOnChoiceJump)?;
        let player_id = self.active_player().id;
        self.choices.select(player_id, slot, jump)
    }

    /// Apply one turn's outcome for the active team.
    ///
    /// `manual_jump_name` is the active player's choice-jump pick; it is
    /// ignored while the team is still on the base order. Outcomes arriving
    /// after the match is decided are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ChoiceJumpError::AlreadySelected`] when the pick repeats one
    /// the player made for another slot. The state is unchanged in that case.
    pub fn apply_outcome(
        &mut self,
        result: Outcome,
        manual_jump_name: Option<&str>,
    ) -> Result<TurnOutcome, ChoiceJumpError> {
        if self.winner.is_some() {
            warn!(target: LOG_TARGET_TURN, "ignoring {result} after the match was decided");
            return Ok(TurnOutcome::Ignored);
        }

        let team_index = self.active_team_index();
        let closes_round = self.is_last_team_in_round();
        let player = self.active_player().clone();
        let slot = self.choice_slot(team_index);

        let jump_name = match (slot, manual_jump_name) {
            (Some(slot), Some(picked)) => {
                self.choices.select(player.id, slot, picked).inspect_err(|err| {
                    warn!(target: LOG_TARGET_TURN, "rejected choice jump: {err}");
                })?;
                picked.to_owned()
            }
            _ => self.current_jump_name(),
        };

        let finish = self.total_steps();
        let rules = self.rules;
        let team = &mut self.teams[team_index];
        let previous_position = team.position;
        team.position = rules.next_position(result, previous_position, finish);
        debug!(
            target: LOG_TARGET_TURN,
            "turn {}: {} ({}) {} on '{}' {} -> {}",
            self.events.len() + 1,
            player.name,
            team.name,
            result,
            jump_name,
            previous_position,
            team.position
        );
        let team_id = team.id;

        self.events.push(GameEvent {
            team_id,
            player_id: player.id,
            player_name: player.name,
            jump_name,
            result,
            previous_position,
            choice_jump_number: slot,
        });

        if !closes_round {
            return Ok(TurnOutcome::Continued);
        }
        Ok(self.resolve_round())
    }

    fn resolve_round(&mut self) -> TurnOutcome {
        let finish = self.total_steps();
        let finished: Vec<usize> = self
            .teams
            .iter()
            .enumerate()
            .filter(|(_, team)| team.position >= finish)
            .map(|(index, _)| index)
            .collect();

        match finished.as_slice() {
            [] => TurnOutcome::Continued,
            [index] => {
                self.winner = Some(*index);
                let winner = self.teams[*index].name.clone();
                info!(
                    target: LOG_TARGET_TURN,
                    "{winner} wins after {} turns", self.events.len()
                );
                TurnOutcome::Completed { winner }
            }
            tied => {
                self.extensions.push(self.events.len());
                let extra_rounds = self.extra_rounds();
                let total_steps = self.total_steps();
                info!(
                    target: LOG_TARGET_TURN,
                    "{} teams tied at the finish; sudden death extends the line to {total_steps}",
                    tied.len()
                );
                TurnOutcome::TieExtended {
                    extra_rounds,
                    total_steps,
                }
            }
        }
    }

    /// Take back the most recent turn.
    ///
    /// Returns the removed event, or `None` when there is nothing to undo or
    /// the match is already decided. Choice-jump picks are kept.
    pub fn undo(&mut self) -> Option<GameEvent> {
        if self.winner.is_some() {
            debug!(target: LOG_TARGET_TURN, "undo refused: match already decided");
            return None;
        }
        let turns_before = self.events.len();
        let event = self.events.pop()?;
        if self.extensions.last() == Some(&turns_before) {
            self.extensions.pop();
        }
        if let Some(team) = self.teams.iter_mut().find(|team| team.id == event.team_id) {
            team.position = event.previous_position;
        }
        debug!(
            target: LOG_TARGET_TURN,
            "undid turn {turns_before}: {} {}", event.player_name, event.result
        );
        Some(event)
    }
}

/// Display label for a position: the base jump name, a choice slot, or the
/// finish.
#[must_use]
pub fn jump_label(jump_order: &JumpOrder, position: u32, total_steps: u32) -> String {
    if let Some(name) = jump_order.get(position) {
        return name.to_owned();
    }
    if position >= total_steps {
        return MATCH_COMPLETE_LABEL.to_string();
    }
    if position + 1 == total_steps {
        return FINAL_CHOICE_JUMP_LABEL.to_string();
    }
    choice_label(position - usize_to_u32(jump_order.len()) + 1)
}

/// Rebuild every team's position by replaying an event log from the start
/// line: sticks add, falls subtract with a floor at zero.
#[must_use]
pub fn replay_positions(
    teams: &[Team],
    events: &[GameEvent],
    rules: &MatchRules,
) -> BTreeMap<TeamId, u32> {
    let mut positions: BTreeMap<TeamId, u32> = teams.iter().map(|team| (team.id, 0)).collect();
    for event in events {
        let position = positions.entry(event.team_id).or_insert(0);
        *position = rules.next_position(event.result, *position, u32::MAX);
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn two_teams() -> Vec<Team> {
        vec![
            Team::new(1, "Team 1", vec![Player::new(1, "Ana"), Player::new(2, "Ben")]),
            Team::new(2, "Team 2", vec![Player::new(3, "Cleo")]),
        ]
    }

    fn abc_match() -> MatchState {
        MatchState::with_default_rules(two_teams(), JumpOrder::new(["A", "B", "C"])).unwrap()
    }

    fn play(state: &mut MatchState, outcomes: &[Outcome]) -> Vec<TurnOutcome> {
        outcomes
            .iter()
            .map(|outcome| state.apply_outcome(*outcome, None).unwrap())
            .collect()
    }

    #[test]
    fn finish_line_counts_choice_slots() {
        let state = abc_match();
        assert_eq!(state.total_steps(), 5);
        assert_eq!(state.phase(), MatchPhase::InProgress);
        assert_eq!(state.current_jump_name(), "A");
    }

    #[test]
    fn scenario_a_single_finisher_wins_at_round_boundary() {
        let mut state = abc_match();
        let mut last = TurnOutcome::Continued;
        for round in 0..5 {
            assert_eq!(
                state.apply_outcome(Outcome::Stick, None).unwrap(),
                TurnOutcome::Continued
            );
            let team_two = if round < 2 { Outcome::Fall } else { Outcome::Stick };
            last = state.apply_outcome(team_two, None).unwrap();
        }
        assert_eq!(
            last,
            TurnOutcome::Completed {
                winner: "Team 1".to_string()
            }
        );
        assert_eq!(state.teams()[0].position, 5);
        assert_eq!(state.teams()[1].position, 3);
        assert_eq!(state.winner().map(|team| team.name.as_str()), Some("Team 1"));
        assert_eq!(state.phase(), MatchPhase::Completed);
    }

    #[test]
    fn winner_waits_for_the_round_to_finish() {
        let mut state = abc_match();
        for _ in 0..4 {
            play(&mut state, &[Outcome::Stick, Outcome::NoStick]);
        }
        // Team 1 reaches the line mid-round; no decision yet.
        assert_eq!(
            state.apply_outcome(Outcome::Stick, None).unwrap(),
            TurnOutcome::Continued
        );
        assert_eq!(state.teams()[0].position, 5);
        assert!(state.winner().is_none());
        assert!(matches!(
            state.apply_outcome(Outcome::NoStick, None).unwrap(),
            TurnOutcome::Completed { .. }
        ));
    }

    #[test]
    fn scenario_b_simultaneous_finish_extends_the_line() {
        let mut state = abc_match();
        for _ in 0..5 {
            play(&mut state, &[Outcome::Stick, Outcome::Stick]);
        }
        assert!(state.winner().is_none());
        assert_eq!(state.extra_rounds(), 1);
        assert_eq!(state.total_steps(), 6);
        assert_eq!(state.current_jump_name(), "Choice Jump 3");

        play(&mut state, &[Outcome::Fall]);
        let outcome = state.apply_outcome(Outcome::Stick, None).unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                winner: "Team 2".to_string()
            }
        );
    }

    #[test]
    fn tie_reports_new_finish_line() {
        let mut state = abc_match();
        let outcomes = (0..5)
            .flat_map(|_| play(&mut state, &[Outcome::Stick, Outcome::Stick]))
            .collect::<Vec<_>>();
        assert_eq!(
            outcomes.last(),
            Some(&TurnOutcome::TieExtended {
                extra_rounds: 1,
                total_steps: 6
            })
        );
    }

    #[test]
    fn scenario_c_fall_at_start_stays_at_zero() {
        let mut state = abc_match();
        play(&mut state, &[Outcome::Fall]);
        assert_eq!(state.teams()[0].position, 0);
        assert_eq!(state.stats().fall, 1);
        assert_eq!(state.events()[0].previous_position, 0);
    }

    #[test]
    fn players_rotate_within_each_team() {
        let mut state = abc_match();
        play(
            &mut state,
            &[
                Outcome::NoStick,
                Outcome::NoStick,
                Outcome::NoStick,
                Outcome::NoStick,
                Outcome::NoStick,
            ],
        );
        let names: Vec<&str> = state
            .events()
            .iter()
            .map(|event| event.player_name.as_str())
            .collect();
        assert_eq!(names, ["Ana", "Cleo", "Ben", "Cleo", "Ana"]);
        assert_eq!(state.active_player().name, "Cleo");
        assert_eq!(state.round_number(), 3);
    }

    #[test]
    fn outcomes_after_completion_are_ignored() {
        let teams = vec![Team::new(1, "Solo", vec![Player::new(1, "Ana")])];
        let mut state = MatchState::with_default_rules(teams, JumpOrder::default()).unwrap();
        play(&mut state, &[Outcome::Stick]);
        let outcome = state.apply_outcome(Outcome::Stick, None).unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        let before = state.clone();
        assert_eq!(
            state.apply_outcome(Outcome::Fall, None).unwrap(),
            TurnOutcome::Ignored
        );
        assert_eq!(state, before);
        assert!(state.undo().is_none());
    }

    #[test]
    fn empty_jump_order_starts_on_choice_jumps() {
        let mut state = MatchState::with_default_rules(two_teams(), JumpOrder::default()).unwrap();
        assert_eq!(state.total_steps(), 2);
        assert_eq!(state.choice_slot(0), Some(1));
        assert_eq!(state.current_jump_name(), "Choice Jump 1");
        let outcome = state.apply_outcome(Outcome::Stick, Some("Loop")).unwrap();
        assert_eq!(outcome, TurnOutcome::Continued);
        assert_eq!(state.events()[0].jump_name, "Loop");
        assert_eq!(state.events()[0].choice_jump_number, Some(1));
    }

    #[test]
    fn manual_pick_is_ignored_on_base_order() {
        let mut state = abc_match();
        state.apply_outcome(Outcome::Stick, Some("Loop")).unwrap();
        assert_eq!(state.events()[0].jump_name, "A");
        assert!(!state.events()[0].is_choice_jump());
    }

    #[test]
    fn repeated_choice_pick_is_rejected_without_side_effects() {
        let teams = vec![Team::new(1, "Solo", vec![Player::new(1, "Ana")])];
        let rules = MatchRules {
            choice_jump_slots: 3,
            ..MatchRules::default()
        };
        let mut state = MatchState::new(teams, JumpOrder::default(), rules).unwrap();
        state.apply_outcome(Outcome::Stick, Some("Loop")).unwrap();
        let before = state.clone();
        let err = state.apply_outcome(Outcome::Stick, Some("Loop")).unwrap_err();
        assert!(matches!(err, ChoiceJumpError::AlreadySelected { slot: 1, .. }));
        assert_eq!(state, before);
        assert_eq!(
            state.available_choice_jumps(["Loop", "Flip"]),
            vec!["Flip".to_string()]
        );
    }

    #[test]
    fn preselected_choice_names_the_event() {
        let mut state = MatchState::with_default_rules(two_teams(), JumpOrder::default()).unwrap();
        state.select_choice_jump("Flip").unwrap();
        assert_eq!(state.current_jump_name(), "Flip");
        state.apply_outcome(Outcome::NoStick, None).unwrap();
        assert_eq!(state.events()[0].jump_name, "Flip");

        let mut base = abc_match();
        assert_eq!(
            base.select_choice_jump("Flip"),
            Err(ChoiceJumpError::NotOnChoiceJump)
        );
    }

    #[test]
    fn undo_restores_position_and_tie_extension() {
        let mut state = abc_match();
        for _ in 0..5 {
            play(&mut state, &[Outcome::Stick, Outcome::Stick]);
        }
        assert_eq!(state.extra_rounds(), 1);
        let undone = state.undo().unwrap();
        assert_eq!(undone.team_id, 2);
        assert_eq!(state.extra_rounds(), 0);
        assert_eq!(state.total_steps(), 5);
        assert_eq!(state.teams()[1].position, 4);
        assert_eq!(state.teams()[0].position, 5);
    }

    #[test]
    fn undo_on_empty_log_is_none() {
        let mut state = abc_match();
        assert!(state.undo().is_none());
    }

    #[test]
    fn apply_then_undo_is_exact_for_random_sequences() {
        let mut rng = ChaCha20Rng::seed_from_u64(0x5717_C417);
        for _ in 0..50 {
            let mut state = abc_match();
            for _ in 0..40 {
                if state.winner().is_some() {
                    break;
                }
                let outcome = Outcome::ALL[rng.gen_range(0..Outcome::ALL.len())];
                let before = state.clone();
                state.apply_outcome(outcome, None).unwrap();
                if state.winner().is_none() {
                    let mut rewound = state.clone();
                    rewound.undo().unwrap();
                    assert_eq!(rewound, before);
                }
            }
        }
    }

    #[test]
    fn replay_reconstructs_positions_and_stats() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        for _ in 0..50 {
            let mut state = abc_match();
            while state.winner().is_none() && state.turn_index() < 200 {
                let outcome = Outcome::ALL[rng.gen_range(0..Outcome::ALL.len())];
                let closes_round = state.is_last_team_in_round();
                let result = state.apply_outcome(outcome, None).unwrap();
                if matches!(result, TurnOutcome::Completed { .. }) {
                    assert!(closes_round, "winner declared mid-round");
                }
            }
            let replayed = replay_positions(state.teams(), state.events(), state.rules());
            for team in state.teams() {
                assert_eq!(replayed[&team.id], team.position);
            }
            let stats = state.stats();
            let sticks = state
                .events()
                .iter()
                .filter(|event| event.result == Outcome::Stick)
                .count();
            assert_eq!(stats.stick as usize, sticks);
            assert_eq!(stats.total() as usize, state.events().len());
        }
    }

    #[test]
    fn labels_cover_every_stage() {
        let order = JumpOrder::new(["A", "B", "C"]);
        assert_eq!(jump_label(&order, 0, 5), "A");
        assert_eq!(jump_label(&order, 3, 5), "Choice Jump 1");
        assert_eq!(jump_label(&order, 4, 5), "Final Choice Jump");
        assert_eq!(jump_label(&order, 5, 5), "Match Complete");
    }

    #[test]
    fn setup_errors_surface() {
        assert_eq!(
            MatchState::with_default_rules(Vec::new(), JumpOrder::default()).unwrap_err(),
            MatchSetupError::NoTeams
        );
    }

    #[test]
    fn restored_state_is_validated() {
        let mut state = abc_match();
        play(&mut state, &[Outcome::Stick, Outcome::Fall, Outcome::Stick]);
        let mut value = serde_json::to_value(&state).unwrap();
        let restored: MatchState = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.active_team_index(), 1);

        value["teams"] = serde_json::json!([]);
        let err = serde_json::from_value::<MatchState>(value.clone()).unwrap_err();
        assert!(err.to_string().contains("at least one team"), "{err}");

        value["teams"] = serde_json::to_value(two_teams()).unwrap();
        value["rules"]["stick_advance"] = serde_json::json!(0);
        assert!(serde_json::from_value::<MatchState>(value).is_err());
    }
}
