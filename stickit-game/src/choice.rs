//! Per-player choice-jump selections.
//!
//! Once a team runs past the fixed jump order, each player picks their own
//! jump for every choice slot. A player may not pick the same jump for two
//! different slots in one match; whether the jump exists in the library is
//! the caller's concern.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::CHOICE_JUMP_LABEL_PREFIX;
use crate::roster::{JumpOrder, PlayerId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChoiceJumpError {
    #[error("player {player_id} already picked '{jump}' for choice jump {slot}")]
    AlreadySelected {
        player_id: PlayerId,
        jump: String,
        slot: u32,
    },
    #[error("the active team is not on a choice jump")]
    NotOnChoiceJump,
}

/// Selections keyed by player, then by 1-based choice slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChoiceJumpBook {
    selections: BTreeMap<PlayerId, BTreeMap<u32, String>>,
}

impl ChoiceJumpBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selection(&self, player_id: PlayerId, slot: u32) -> Option<&str> {
        self.selections
            .get(&player_id)
            .and_then(|slots| slots.get(&slot))
            .map(String::as_str)
    }

    /// Slot other than `slot` where the player already holds `jump`.
    #[must_use]
    pub fn conflicting_slot(&self, player_id: PlayerId, slot: u32, jump: &str) -> Option<u32> {
        self.selections.get(&player_id).and_then(|slots| {
            slots
                .iter()
                .find(|(held_slot, held)| **held_slot != slot && held.as_str() == jump)
                .map(|(held_slot, _)| *held_slot)
        })
    }

    /// Record `jump` as the player's pick for `slot`, replacing any earlier
    /// pick for the same slot.
    ///
    /// # Errors
    ///
    /// Returns [`ChoiceJumpError::AlreadySelected`] when the player holds the
    /// jump for another slot.
    pub fn select(
        &mut self,
        player_id: PlayerId,
        slot: u32,
        jump: impl Into<String>,
    ) -> Result<(), ChoiceJumpError> {
        let jump = jump.into();
        if let Some(held_slot) = self.conflicting_slot(player_id, slot, &jump) {
            return Err(ChoiceJumpError::AlreadySelected {
                player_id,
                jump,
                slot: held_slot,
            });
        }
        self.selections
            .entry(player_id)
            .or_default()
            .insert(slot, jump);
        Ok(())
    }

    pub fn clear(&mut self, player_id: PlayerId, slot: u32) -> Option<String> {
        let slots = self.selections.get_mut(&player_id)?;
        let removed = slots.remove(&slot);
        if slots.is_empty() {
            self.selections.remove(&player_id);
        }
        removed
    }

    /// Library jumps the player may pick for `slot`: outside the base order
    /// and not already held for a different slot.
    #[must_use]
    pub fn candidates<'a, I>(
        &self,
        player_id: PlayerId,
        slot: u32,
        library: I,
        jump_order: &JumpOrder,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        library
            .into_iter()
            .filter(|jump| !jump_order.contains(jump))
            .filter(|jump| self.conflicting_slot(player_id, slot, jump).is_none())
            .map(str::to_owned)
            .collect()
    }
}

/// Synthesized name for a choice slot nobody has picked a jump for.
#[must_use]
pub fn choice_label(slot: u32) -> String {
    format!("{CHOICE_JUMP_LABEL_PREFIX} {slot}")
}
