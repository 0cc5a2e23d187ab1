//! A live match bundled with its jump library and recorder.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::choice::ChoiceJumpError;
use crate::events::{GameEvent, Outcome};
use crate::game::{MatchPhase, MatchState, TurnOutcome};
use crate::record::MatchRecord;
use crate::recorder::MatchRecorder;

/// Drives one match from the first turn to its captured record.
#[derive(Debug, Clone)]
pub struct MatchSession {
    state: MatchState,
    library: BTreeSet<String>,
    recorder: MatchRecorder,
}

impl MatchSession {
    #[must_use]
    pub fn new(state: MatchState, library: BTreeSet<String>) -> Self {
        Self {
            state,
            library,
            recorder: MatchRecorder::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &MatchState {
        &self.state
    }

    #[must_use]
    pub const fn library(&self) -> &BTreeSet<String> {
        &self.library
    }

    #[must_use]
    pub const fn recorder(&self) -> &MatchRecorder {
        &self.recorder
    }

    pub const fn recorder_mut(&mut self) -> &mut MatchRecorder {
        &mut self.recorder
    }

    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.state.phase()
    }

    /// The record captured when the match was decided.
    #[must_use]
    pub const fn completed_record(&self) -> Option<&MatchRecord> {
        self.recorder.record()
    }

    /// Apply an outcome, stamping a completed match with the current time.
    ///
    /// # Errors
    ///
    /// See [`MatchState::apply_outcome`].
    pub fn apply_outcome(
        &mut self,
        result: Outcome,
        manual_jump_name: Option<&str>,
    ) -> Result<TurnOutcome, ChoiceJumpError> {
        self.apply_outcome_at(result, manual_jump_name, Utc::now())
    }

    /// Apply an outcome; when it decides the match the record is captured
    /// with `completed_at`.
    ///
    /// # Errors
    ///
    /// See [`MatchState::apply_outcome`].
    pub fn apply_outcome_at(
        &mut self,
        result: Outcome,
        manual_jump_name: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<TurnOutcome, ChoiceJumpError> {
        let outcome = self.state.apply_outcome(result, manual_jump_name)?;
        if matches!(outcome, TurnOutcome::Completed { .. }) {
            self.recorder.capture(&self.state, completed_at);
        }
        Ok(outcome)
    }

    pub fn undo(&mut self) -> Option<GameEvent> {
        self.state.undo()
    }

    #[must_use]
    pub fn current_jump_name(&self) -> String {
        self.state.current_jump_name()
    }

    /// Library jumps the active player may pick for the current choice slot.
    #[must_use]
    pub fn available_choice_jumps(&self) -> Vec<String> {
        self.state
            .available_choice_jumps(self.library.iter().map(String::as_str))
    }

    /// # Errors
    ///
    /// See [`MatchState::select_choice_jump`].
    pub fn select_choice_jump(&mut self, jump: &str) -> Result<(), ChoiceJumpError> {
        self.state.select_choice_jump(jump)
    }

    #[must_use]
    pub fn into_state(self) -> MatchState {
        self.state
    }
}
