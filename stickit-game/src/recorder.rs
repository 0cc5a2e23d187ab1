//! Captures a completed match as a [`MatchRecord`] exactly once and hands it
//! to storage.
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::MatchStorage;
use crate::constants::LOG_TARGET_RECORDER;
use crate::game::MatchState;
use crate::record::{MatchId, MatchRecord};

/// Build the record for a decided match. `None` while no winner exists.
#[must_use]
pub fn assemble_record(state: &MatchState, date: DateTime<Utc>) -> Option<MatchRecord> {
    let winner = state.winner()?;
    Some(MatchRecord::new(
        date,
        &winner.name,
        state.teams(),
        state.events().to_vec(),
    ))
}

/// One recorder per match. A record is captured at most once; a failed save
/// leaves it pending so the caller can retry.
#[derive(Debug, Clone, Default)]
pub struct MatchRecorder {
    record: Option<MatchRecord>,
    saved_id: Option<MatchId>,
}

impl MatchRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the record if the match has just been decided.
    ///
    /// Returns the new record on the first successful capture and `None`
    /// on every later call or while the match is still running.
    pub fn capture(&mut self, state: &MatchState, date: DateTime<Utc>) -> Option<&MatchRecord> {
        if self.record.is_some() {
            debug!(target: LOG_TARGET_RECORDER, "record already captured");
            return None;
        }
        let record = assemble_record(state, date)?;
        info!(
            target: LOG_TARGET_RECORDER,
            "captured {} win over {} turns",
            record.winner,
            record.events.len()
        );
        self.record = Some(record);
        self.record.as_ref()
    }

    /// Save the captured record.
    ///
    /// Returns the storage id, or `None` when nothing has been captured.
    /// Saving again after success returns the existing id without touching
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns the storage error; the record stays pending.
    pub fn persist<S>(&mut self, storage: &S) -> Result<Option<MatchId>, S::Error>
    where
        S: MatchStorage,
    {
        if let Some(id) = self.saved_id {
            return Ok(Some(id));
        }
        let Some(record) = self.record.as_mut() else {
            return Ok(None);
        };
        match storage.save_match(record) {
            Ok(id) => {
                record.id = Some(id);
                self.saved_id = Some(id);
                info!(target: LOG_TARGET_RECORDER, "saved match {id}");
                Ok(Some(id))
            }
            Err(err) => {
                warn!(target: LOG_TARGET_RECORDER, "saving match failed: {err}");
                Err(err)
            }
        }
    }

    #[must_use]
    pub const fn record(&self) -> Option<&MatchRecord> {
        self.record.as_ref()
    }

    #[must_use]
    pub const fn is_captured(&self) -> bool {
        self.record.is_some()
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.saved_id.is_some()
    }

    /// Captured but not yet saved.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.record.is_some() && self.saved_id.is_none()
    }

    #[must_use]
    pub const fn saved_id(&self) -> Option<MatchId> {
        self.saved_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Outcome;
    use crate::roster::{JumpOrder, Player, Team};
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};
    use std::fmt;

    #[derive(Debug)]
    struct Offline;

    impl fmt::Display for Offline {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("storage offline")
        }
    }

    impl std::error::Error for Offline {}

    #[derive(Default)]
    struct FlakyStorage {
        fail: Cell<bool>,
        saved: RefCell<Vec<MatchRecord>>,
    }

    impl MatchStorage for FlakyStorage {
        type Error = Offline;

        fn save_match(&self, record: &MatchRecord) -> Result<MatchId, Self::Error> {
            if self.fail.get() {
                return Err(Offline);
            }
            let mut saved = self.saved.borrow_mut();
            saved.push(record.clone());
            Ok(saved.len() as MatchId)
        }

        fn load_match_history(&self) -> Result<Vec<MatchRecord>, Self::Error> {
            Ok(self.saved.borrow().clone())
        }
    }

    fn finished_match() -> MatchState {
        let teams = vec![
            Team::new(1, "Hawks", vec![Player::new(1, "Ana")]),
            Team::new(2, "Owls", vec![Player::new(2, "Cleo"), Player::new(3, "Dee")]),
        ];
        let mut state = MatchState::with_default_rules(teams, JumpOrder::new(["Axel"])).unwrap();
        for _ in 0..3 {
            state.apply_outcome(Outcome::Stick, None).unwrap();
            state.apply_outcome(Outcome::NoStick, None).unwrap();
        }
        assert!(state.winner().is_some());
        state
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn nothing_is_captured_while_in_progress() {
        let teams = vec![Team::new(1, "Solo", vec![Player::new(1, "Ana")])];
        let state = MatchState::with_default_rules(teams, JumpOrder::default()).unwrap();
        let mut recorder = MatchRecorder::new();
        assert!(recorder.capture(&state, date()).is_none());
        assert!(!recorder.is_captured());
    }

    #[test]
    fn captures_exactly_once() {
        let state = finished_match();
        let mut recorder = MatchRecorder::new();
        let record = recorder.capture(&state, date()).cloned().unwrap();
        assert_eq!(record.winner, "Hawks");
        assert_eq!(record.participants, ["Hawks: Ana", "Owls: Cleo, Dee"]);
        assert_eq!(record.events.len(), 6);
        assert_eq!(record.stats.stick, 3);
        assert_eq!(record.stats.no_stick, 3);
        assert!(recorder.capture(&state, date()).is_none());
        assert_eq!(recorder.record(), Some(&record));
    }

    #[test]
    fn failed_save_stays_pending_until_retry() {
        let storage = FlakyStorage::default();
        storage.fail.set(true);
        let mut recorder = MatchRecorder::new();
        assert_eq!(recorder.persist(&storage).unwrap(), None);

        recorder.capture(&finished_match(), date());
        assert!(recorder.persist(&storage).is_err());
        assert!(recorder.is_pending());

        storage.fail.set(false);
        assert_eq!(recorder.persist(&storage).unwrap(), Some(1));
        assert_eq!(recorder.persist(&storage).unwrap(), Some(1));
        assert_eq!(storage.saved.borrow().len(), 1);
        assert!(recorder.is_persisted());
        assert_eq!(recorder.record().and_then(|record| record.id), Some(1));
    }
}
