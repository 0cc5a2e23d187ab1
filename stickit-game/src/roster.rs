//! Players, teams and the fixed jump order handed to the turn engine.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PlayerId = u32;
pub type TeamId = u32;

/// A roster member. Teams and events reference players; they never own them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A team taking part in one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub players: Vec<Player>,
    #[serde(default)]
    pub position: u32,
}

impl Team {
    /// Create a team standing on the start line.
    #[must_use]
    pub fn new(id: TeamId, name: impl Into<String>, players: Vec<Player>) -> Self {
        Self {
            id,
            name: name.into(),
            players,
            position: 0,
        }
    }

    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|player| player.name.as_str())
    }
}

/// Team composition request resolved against the roster at match start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSetup {
    pub id: TeamId,
    pub name: String,
    pub player_ids: Vec<PlayerId>,
}

impl TeamSetup {
    #[must_use]
    pub fn new(id: TeamId, name: impl Into<String>, player_ids: Vec<PlayerId>) -> Self {
        Self {
            id,
            name: name.into(),
            player_ids,
        }
    }
}

/// Ordered jump names, fixed for the duration of a match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JumpOrder(Vec<String>);

impl JumpOrder {
    #[must_use]
    pub fn new<I, S>(jumps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(jumps.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: u32) -> Option<&str> {
        let index = usize::try_from(position).ok()?;
        self.0.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, jump: &str) -> bool {
        self.0.iter().any(|name| name == jump)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for JumpOrder {
    fn from(jumps: Vec<String>) -> Self {
        Self(jumps)
    }
}

/// Errors raised when a match cannot be set up from the supplied teams.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchSetupError {
    #[error("a match needs at least one team")]
    NoTeams,
    #[error("team '{team}' has no players")]
    EmptyTeam { team: String },
    #[error("team id {id} is used more than once")]
    DuplicateTeamId { id: TeamId },
    #[error("team '{team}' references unknown player id {player_id}")]
    UnknownPlayer { team: String, player_id: PlayerId },
    #[error("invalid match rules: {reason}")]
    InvalidRules { reason: &'static str },
}

/// Check the structural requirements the turn engine relies on.
///
/// # Errors
///
/// Returns an error when there are no teams, a team is empty, or two teams
/// share an id.
pub fn validate_teams(teams: &[Team]) -> Result<(), MatchSetupError> {
    if teams.is_empty() {
        return Err(MatchSetupError::NoTeams);
    }
    let mut seen = HashSet::with_capacity(teams.len());
    for team in teams {
        if team.players.is_empty() {
            return Err(MatchSetupError::EmptyTeam {
                team: team.name.clone(),
            });
        }
        if !seen.insert(team.id) {
            return Err(MatchSetupError::DuplicateTeamId { id: team.id });
        }
    }
    Ok(())
}

/// Resolve team setups against the roster, preserving the requested order.
///
/// # Errors
///
/// Returns an error when a setup names a player missing from the roster or
/// the resulting teams fail [`validate_teams`].
pub fn build_teams(roster: &[Player], setups: &[TeamSetup]) -> Result<Vec<Team>, MatchSetupError> {
    let teams = setups
        .iter()
        .map(|setup| {
            let players = setup
                .player_ids
                .iter()
                .map(|player_id| {
                    roster
                        .iter()
                        .find(|player| player.id == *player_id)
                        .cloned()
                        .ok_or_else(|| MatchSetupError::UnknownPlayer {
                            team: setup.name.clone(),
                            player_id: *player_id,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Team::new(setup.id, setup.name.clone(), players))
        })
        .collect::<Result<Vec<_>, MatchSetupError>>()?;
    validate_teams(&teams)?;
    Ok(teams)
}
