//! Completed match records and the persisted participants convention.
//!
//! Each `participants` entry reads `"<TeamName>: <name1>, <name2>"`. History
//! analytics parses these entries to find the winning players, so the format
//! is part of the storage contract. Newer records also carry the same data as
//! structured `lineups`, which readers prefer when present.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{PARTICIPANT_PLAYER_SEPARATOR, PARTICIPANT_TEAM_SEPARATOR};
use crate::events::{GameEvent, MatchStats};
use crate::roster::Team;

pub type MatchId = u64;

/// One team's name and players as recorded at match completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLineup {
    pub team_name: String,
    pub player_names: Vec<String>,
}

impl TeamLineup {
    #[must_use]
    pub fn from_team(team: &Team) -> Self {
        Self {
            team_name: team.name.clone(),
            player_names: team.player_names().map(str::to_owned).collect(),
        }
    }

    /// Parse a `"<TeamName>: <names>"` entry. The team name ends at the
    /// first separator.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let (team, players) = entry.split_once(PARTICIPANT_TEAM_SEPARATOR)?;
        let team_name = team.trim();
        if team_name.is_empty() {
            return None;
        }
        Some(Self {
            team_name: team_name.to_owned(),
            player_names: split_player_names(players),
        })
    }

    /// Parse an entry known to belong to `team_name`, matching the prefix
    /// case-insensitively. Team names containing the separator are handled.
    #[must_use]
    pub fn parse_for_team(entry: &str, team_name: &str) -> Option<Self> {
        let prefix = entry.get(..team_name.len())?;
        if prefix.to_lowercase() != team_name.to_lowercase() {
            return None;
        }
        let players = entry[team_name.len()..]
            .trim_start()
            .strip_prefix(PARTICIPANT_TEAM_SEPARATOR)?;
        Some(Self {
            team_name: prefix.to_owned(),
            player_names: split_player_names(players),
        })
    }

    #[must_use]
    pub fn is_team(&self, team_name: &str) -> bool {
        self.team_name.to_lowercase() == team_name.trim().to_lowercase()
    }
}

impl fmt::Display for TeamLineup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = format!("{PARTICIPANT_PLAYER_SEPARATOR} ");
        write!(
            f,
            "{}{PARTICIPANT_TEAM_SEPARATOR} {}",
            self.team_name,
            self.player_names.join(separator.as_str())
        )
    }
}

fn split_player_names(raw: &str) -> Vec<String> {
    raw.split(PARTICIPANT_PLAYER_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Identity of a record for distinct-match counting: the storage id when
/// assigned, otherwise the completion timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKey {
    Id(MatchId),
    Date(DateTime<Utc>),
}

/// Permanent artifact of a completed match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MatchId>,
    pub date: DateTime<Utc>,
    pub winner: String,
    pub participants: Vec<String>,
    pub stats: MatchStats,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lineups: Vec<TeamLineup>,
}

impl MatchRecord {
    /// Build a record for `winner` from the teams and the full event log.
    #[must_use]
    pub fn new(date: DateTime<Utc>, winner: &str, teams: &[Team], events: Vec<GameEvent>) -> Self {
        let lineups: Vec<TeamLineup> = teams.iter().map(TeamLineup::from_team).collect();
        Self {
            id: None,
            date,
            winner: winner.to_owned(),
            participants: lineups.iter().map(ToString::to_string).collect(),
            stats: MatchStats::from_events(&events),
            events,
            lineups,
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: MatchId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn key(&self) -> MatchKey {
        self.id.map_or(MatchKey::Date(self.date), MatchKey::Id)
    }

    /// Players on the winning team, or empty when no entry names the winner.
    #[must_use]
    pub fn winning_players(&self) -> Vec<String> {
        if let Some(lineup) = self.lineups.iter().find(|lineup| lineup.is_team(&self.winner)) {
            return lineup.player_names.clone();
        }
        let winner = self.winner.trim();
        self.participants
            .iter()
            .find_map(|entry| TeamLineup::parse_for_team(entry.trim(), winner))
            .map(|lineup| lineup.player_names)
            .unwrap_or_default()
    }

    /// Every participating player name across all teams.
    #[must_use]
    pub fn participant_names(&self) -> Vec<String> {
        if !self.lineups.is_empty() {
            return self
                .lineups
                .iter()
                .flat_map(|lineup| lineup.player_names.iter().cloned())
                .collect();
        }
        self.participants
            .iter()
            .flat_map(|entry| match TeamLineup::parse(entry) {
                Some(lineup) => lineup.player_names,
                None => vec![entry.trim().to_owned()],
            })
            .collect()
    }

    /// Whether the stored tallies agree with the event log.
    #[must_use]
    pub fn stats_consistent(&self) -> bool {
        self.events.is_empty() || MatchStats::from_events(&self.events) == self.stats
    }
}
