//! Match rule tuning: finish-line padding and outcome deltas.
use serde::{Deserialize, Serialize};

use crate::constants::{CHOICE_JUMP_SLOTS, FALL_PENALTY, STICK_ADVANCE};
use crate::events::Outcome;
use crate::roster::MatchSetupError;

/// Rule set applied by the turn engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRules {
    #[serde(default = "MatchRules::default_choice_jump_slots")]
    pub choice_jump_slots: u32,
    #[serde(default = "MatchRules::default_stick_advance")]
    pub stick_advance: u32,
    #[serde(default = "MatchRules::default_fall_penalty")]
    pub fall_penalty: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            choice_jump_slots: Self::default_choice_jump_slots(),
            stick_advance: Self::default_stick_advance(),
            fall_penalty: Self::default_fall_penalty(),
        }
    }
}

impl MatchRules {
    const fn default_choice_jump_slots() -> u32 {
        CHOICE_JUMP_SLOTS
    }

    const fn default_stick_advance() -> u32 {
        STICK_ADVANCE
    }

    const fn default_fall_penalty() -> u32 {
        FALL_PENALTY
    }

    /// Reject rule sets under which a match could never finish.
    ///
    /// # Errors
    ///
    /// Returns [`MatchSetupError::InvalidRules`] when sticks do not advance.
    pub fn validate(&self) -> Result<(), MatchSetupError> {
        if self.stick_advance == 0 {
            return Err(MatchSetupError::InvalidRules {
                reason: "stick_advance must be positive",
            });
        }
        Ok(())
    }

    /// Position after `outcome`, floored at 0 and saturating at `finish`.
    #[must_use]
    pub fn next_position(&self, outcome: Outcome, position: u32, finish: u32) -> u32 {
        match outcome {
            Outcome::Stick => position.saturating_add(self.stick_advance).min(finish),
            Outcome::NoStick => position,
            Outcome::Fall => position.saturating_sub(self.fall_penalty),
        }
    }
}
