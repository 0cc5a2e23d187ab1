//! Turn outcomes, the per-turn event record and derived match tallies.
use serde::{Deserialize, Serialize};

use crate::roster::{PlayerId, TeamId};

/// Result of a single jump attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// Landed clean; the team advances.
    Stick,
    /// Landed without sticking; the team holds position.
    NoStick,
    /// Fell; the team drops back.
    Fall,
}

impl Outcome {
    pub const ALL: [Self; 3] = [Self::Stick, Self::NoStick, Self::Fall];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stick => "Stick",
            Self::NoStick => "No Stick",
            Self::Fall => "Fall",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stick => write!(f, "stick"),
            Self::NoStick => write!(f, "noStick"),
            Self::Fall => write!(f, "fall"),
        }
    }
}

/// Immutable record of one turn.
///
/// `previous_position` is the acting team's position before the outcome was
/// applied, which is what makes undo exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GameEventWire", into = "GameEventWire")]
pub struct GameEvent {
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub jump_name: String,
    pub result: Outcome,
    pub previous_position: u32,
    /// 1-based choice slot, present only for choice jumps.
    pub choice_jump_number: Option<u32>,
}

impl GameEvent {
    #[must_use]
    pub const fn is_choice_jump(&self) -> bool {
        self.choice_jump_number.is_some()
    }
}

// Persisted shape keeps the explicit `isChoiceJump` flag next to the number.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameEventWire {
    team_id: TeamId,
    player_id: PlayerId,
    player_name: String,
    jump_name: String,
    result: Outcome,
    previous_position: u32,
    #[serde(default)]
    is_choice_jump: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choice_jump_number: Option<u32>,
}

impl From<GameEventWire> for GameEvent {
    fn from(wire: GameEventWire) -> Self {
        Self {
            team_id: wire.team_id,
            player_id: wire.player_id,
            player_name: wire.player_name,
            jump_name: wire.jump_name,
            result: wire.result,
            previous_position: wire.previous_position,
            choice_jump_number: wire
                .choice_jump_number
                .filter(|_| wire.is_choice_jump),
        }
    }
}

impl From<GameEvent> for GameEventWire {
    fn from(event: GameEvent) -> Self {
        Self {
            team_id: event.team_id,
            player_id: event.player_id,
            player_name: event.player_name,
            jump_name: event.jump_name,
            result: event.result,
            previous_position: event.previous_position,
            is_choice_jump: event.choice_jump_number.is_some(),
            choice_jump_number: event.choice_jump_number,
        }
    }
}

/// Outcome tallies for a match. Always derived from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    pub stick: u32,
    pub no_stick: u32,
    pub fall: u32,
}

impl MatchStats {
    #[must_use]
    pub fn from_events(events: &[GameEvent]) -> Self {
        events.iter().fold(Self::default(), |mut stats, event| {
            stats.record(event.result);
            stats
        })
    }

    pub const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Stick => self.stick += 1,
            Outcome::NoStick => self.no_stick += 1,
            Outcome::Fall => self.fall += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.stick + self.no_stick + self.fall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(result: Outcome, choice: Option<u32>) -> GameEvent {
        GameEvent {
            team_id: 1,
            player_id: 7,
            player_name: "Ana".to_string(),
            jump_name: "Axel".to_string(),
            result,
            previous_position: 2,
            choice_jump_number: choice,
        }
    }

    #[test]
    fn stats_count_every_result() {
        let events = vec![
            event(Outcome::Stick, None),
            event(Outcome::Fall, None),
            event(Outcome::Stick, None),
            event(Outcome::NoStick, None),
        ];
        let stats = MatchStats::from_events(&events);
        assert_eq!(
            stats,
            MatchStats {
                stick: 2,
                no_stick: 1,
                fall: 1
            }
        );
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn event_serializes_in_camel_case_with_choice_flag() {
        let value = serde_json::to_value(event(Outcome::NoStick, Some(2))).unwrap();
        assert_eq!(value["result"], "noStick");
        assert_eq!(value["previousPosition"], 2);
        assert_eq!(value["isChoiceJump"], true);
        assert_eq!(value["choiceJumpNumber"], 2);

        let plain = serde_json::to_value(event(Outcome::Stick, None)).unwrap();
        assert_eq!(plain["isChoiceJump"], false);
        assert!(plain.get("choiceJumpNumber").is_none());
    }

    #[test]
    fn choice_number_requires_flag_when_reading() {
        let json = r#"{"teamId":1,"playerId":2,"playerName":"Ben","jumpName":"Flip",
            "result":"fall","previousPosition":0,"isChoiceJump":false,"choiceJumpNumber":1}"#;
        let parsed: GameEvent = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_choice_jump());
        assert_eq!(parsed.result, Outcome::Fall);
    }

    #[test]
    fn stats_use_camel_case_field_names() {
        let stats: MatchStats = serde_json::from_str(r#"{"stick":3,"noStick":1,"fall":0}"#).unwrap();
        assert_eq!(stats.no_stick, 1);
    }
}
