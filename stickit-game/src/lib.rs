//! Stick It Game Engine
//!
//! Platform-agnostic core logic for Stick It, a turn-based jump competition.
//! This crate covers the match turn engine, match recording, calendar period
//! filtering and history analytics, without UI or storage backends.

pub mod analytics;
pub mod choice;
pub mod constants;
pub mod events;
pub mod game;
pub mod numbers;
pub mod period;
pub mod record;
pub mod recorder;
pub mod roster;
pub mod rules;
pub mod session;

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone};
use log::info;
use thiserror::Error;

// Re-export commonly used types
pub use analytics::{
    ElementAggregate, ElementRanking, ElementRankingEntry, JumpTally, LeaderboardEntry,
    LeaderboardSort, PeriodAnalytics, PlayerAggregate, aggregate, analyze, filter_records,
    recent_matches,
};
pub use choice::{ChoiceJumpBook, ChoiceJumpError};
pub use events::{GameEvent, MatchStats, Outcome};
pub use game::{MatchPhase, MatchState, TurnOutcome, jump_label, replay_positions};
pub use period::{DateRange, Granularity, PeriodCursor, PeriodError, period_range};
pub use record::{MatchId, MatchKey, MatchRecord, TeamLineup};
pub use recorder::{MatchRecorder, assemble_record};
pub use roster::{
    JumpOrder, MatchSetupError, Player, PlayerId, Team, TeamId, TeamSetup, build_teams,
};
pub use rules::MatchRules;
pub use session::MatchSession;

use constants::LOG_TARGET_ENGINE;

/// Source of the roster and jump catalog.
/// Platform-specific implementations should provide this
pub trait RosterLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every registered player
    ///
    /// # Errors
    ///
    /// Returns an error if the roster cannot be loaded.
    fn load_roster(&self) -> Result<Vec<Player>, Self::Error>;

    /// Load the fixed base jump order; it may be empty
    ///
    /// # Errors
    ///
    /// Returns an error if the jump order cannot be loaded.
    fn load_jump_order(&self) -> Result<JumpOrder, Self::Error>;

    /// Load the library choice jumps are picked from
    ///
    /// # Errors
    ///
    /// Returns an error if the library cannot be loaded.
    fn load_jump_library(&self) -> Result<BTreeSet<String>, Self::Error>;
}

/// Persistence for completed match records.
/// Platform-specific implementations should provide this
pub trait MatchStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a record and return the id storage assigned to it
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be saved.
    fn save_match(&self, record: &MatchRecord) -> Result<MatchId, Self::Error>;

    /// Load every saved record
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be loaded.
    fn load_match_history(&self) -> Result<Vec<MatchRecord>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Setup(#[from] MatchSetupError),
    #[error(transparent)]
    ChoiceJump(#[from] ChoiceJumpError),
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error("failed to load {what}")]
    Load {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to save the match record")]
    Save {
        #[source]
        source: anyhow::Error,
    },
}

/// Main engine wiring the roster source and match storage to sessions and
/// history analytics
pub struct MatchEngine<L, S>
where
    L: RosterLoader,
    S: MatchStorage,
{
    loader: L,
    storage: S,
}

impl<L, S> MatchEngine<L, S>
where
    L: RosterLoader,
    S: MatchStorage,
{
    /// Create a new engine with the provided loader and storage
    pub const fn new(loader: L, storage: S) -> Self {
        Self { loader, storage }
    }

    pub const fn loader(&self) -> &L {
        &self.loader
    }

    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Start a match under the standard rules
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or the teams are
    /// unusable.
    pub fn start_match(&self, setups: &[TeamSetup]) -> Result<MatchSession, EngineError> {
        self.start_match_with_rules(setups, MatchRules::default())
    }

    /// Start a match with custom rules
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded, the teams are
    /// unusable, or the rules are invalid.
    pub fn start_match_with_rules(
        &self,
        setups: &[TeamSetup],
        rules: MatchRules,
    ) -> Result<MatchSession, EngineError> {
        let roster = self
            .loader
            .load_roster()
            .map_err(|err| load_error("roster", err))?;
        let jump_order = self
            .loader
            .load_jump_order()
            .map_err(|err| load_error("jump order", err))?;
        let library = self
            .loader
            .load_jump_library()
            .map_err(|err| load_error("jump library", err))?;

        let teams = build_teams(&roster, setups)?;
        info!(
            target: LOG_TARGET_ENGINE,
            "starting match: {} teams, {} base jumps",
            teams.len(),
            jump_order.len()
        );
        let state = MatchState::new(teams, jump_order, rules)?;
        Ok(MatchSession::new(state, library))
    }

    /// Apply one outcome; a completed match is saved straight away.
    ///
    /// # Errors
    ///
    /// Returns an error on a rejected choice jump or a failed save. After a
    /// failed save the match stays completed and [`Self::save_pending`] can
    /// retry.
    pub fn play_turn(
        &self,
        session: &mut MatchSession,
        result: Outcome,
        manual_jump_name: Option<&str>,
    ) -> Result<TurnOutcome, EngineError> {
        let outcome = session.apply_outcome(result, manual_jump_name)?;
        if matches!(outcome, TurnOutcome::Completed { .. }) {
            self.save_pending(session)?;
        }
        Ok(outcome)
    }

    /// Save the session's captured record if it has not been saved yet
    ///
    /// # Errors
    ///
    /// Returns an error if storage rejects the record.
    pub fn save_pending(&self, session: &mut MatchSession) -> Result<Option<MatchId>, EngineError> {
        session
            .recorder_mut()
            .persist(&self.storage)
            .map_err(|err| EngineError::Save { source: err.into() })
    }

    /// Load the full match history
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn load_history(&self) -> Result<Vec<MatchRecord>, EngineError> {
        self.storage
            .load_match_history()
            .map_err(|err| load_error("match history", err))
    }

    /// Aggregate the stored history that falls inside `range`
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn history_analytics<Tz: TimeZone>(
        &self,
        range: &DateRange<Tz>,
    ) -> Result<PeriodAnalytics, EngineError> {
        let history = self.load_history()?;
        Ok(analyze(&history, range))
    }

    /// Resolve `cursor` against `now` and aggregate that period
    ///
    /// # Errors
    ///
    /// Returns an error if the period cannot be resolved or storage cannot
    /// be read.
    pub fn period_analytics<Tz: TimeZone>(
        &self,
        cursor: &PeriodCursor,
        now: &DateTime<Tz>,
    ) -> Result<(DateRange<Tz>, PeriodAnalytics), EngineError> {
        let range = cursor.range(now)?;
        let analytics = self.history_analytics(&range)?;
        Ok((range, analytics))
    }
}

fn load_error<E>(what: &'static str, err: E) -> EngineError
where
    E: Into<anyhow::Error>,
{
    EngineError::Load {
        what,
        source: err.into(),
    }
}
