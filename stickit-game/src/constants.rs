//! Centralized rule and formatting constants for Stick It match logic.
//!
//! The finish line, the position deltas and the persisted text conventions
//! all live here so a rule change is a reviewed code change rather than a
//! scattered edit.

// Match rules ---------------------------------------------------------------
/// Choice jumps every team must land after the fixed jump order.
pub const CHOICE_JUMP_SLOTS: u32 = 2;
/// Positions gained by a stick.
pub const STICK_ADVANCE: u32 = 1;
/// Positions lost by a fall (floored at the start line).
pub const FALL_PENALTY: u32 = 2;

// Display labels --------------------------------------------------------------
pub const CHOICE_JUMP_LABEL_PREFIX: &str = "Choice Jump";
pub const FINAL_CHOICE_JUMP_LABEL: &str = "Final Choice Jump";
pub const MATCH_COMPLETE_LABEL: &str = "Match Complete";

// Persisted record conventions ------------------------------------------------
/// Separates the team name from its players in a participants entry.
pub const PARTICIPANT_TEAM_SEPARATOR: char = ':';
/// Separates player names inside a participants entry.
pub const PARTICIPANT_PLAYER_SEPARATOR: char = ',';

// Analytics -------------------------------------------------------------------
pub const PERCENT_SCALE: f64 = 100.0;

// Logging targets -------------------------------------------------------------
pub(crate) const LOG_TARGET_TURN: &str = "stickit::turn";
pub(crate) const LOG_TARGET_RECORDER: &str = "stickit::recorder";
pub(crate) const LOG_TARGET_ANALYTICS: &str = "stickit::analytics";
pub(crate) const LOG_TARGET_ENGINE: &str = "stickit::engine";
