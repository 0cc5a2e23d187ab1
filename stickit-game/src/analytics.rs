//! History analytics: per-player and per-jump aggregates over a period, and
//! the ranked views built from them.
//!
//! Everything here is recomputed from the records on every call.
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::TimeZone;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::constants::LOG_TARGET_ANALYTICS;
use crate::events::Outcome;
use crate::numbers::{count_percentage, percentage};
use crate::period::DateRange;
use crate::record::{MatchKey, MatchRecord};

/// Sticks out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JumpTally {
    pub sticks: u32,
    pub total: u32,
}

impl JumpTally {
    const fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        if matches!(outcome, Outcome::Stick) {
            self.sticks += 1;
        }
    }

    /// Percentage of attempts stuck; 0.0 with no attempts.
    #[must_use]
    pub fn stick_rate(&self) -> f64 {
        percentage(f64::from(self.sticks), f64::from(self.total))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerAggregate {
    pub name: String,
    pub turns: u32,
    pub sticks: u32,
    pub falls: u32,
    pub matches_played: BTreeSet<MatchKey>,
    pub matches_won: BTreeSet<MatchKey>,
    pub jumps: BTreeMap<String, JumpTally>,
}

impl PlayerAggregate {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn stick_rate(&self) -> f64 {
        percentage(f64::from(self.sticks), f64::from(self.turns))
    }

    #[must_use]
    pub fn win_rate(&self) -> f64 {
        count_percentage(self.matches_won.len(), self.matches_played.len())
    }
}

/// Every player's record on one jump.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementAggregate {
    pub jump_name: String,
    pub players: BTreeMap<String, JumpTally>,
}

impl ElementAggregate {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.players.values().map(|tally| tally.total).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardSort {
    WinRate,
    #[default]
    StickRate,
    Falls,
}

impl LeaderboardSort {
    pub const ALL: [Self; 3] = [Self::WinRate, Self::StickRate, Self::Falls];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WinRate => "win-rate",
            Self::StickRate => "stick-rate",
            Self::Falls => "falls",
        }
    }
}

impl fmt::Display for LeaderboardSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LeaderboardSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|sort| sort.label().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown leaderboard sort '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub turns: u32,
    pub sticks: u32,
    pub falls: u32,
    pub matches: usize,
    pub wins: usize,
    pub stick_rate: f64,
    pub win_rate: f64,
}

impl LeaderboardEntry {
    fn from_aggregate(aggregate: &PlayerAggregate) -> Self {
        Self {
            rank: 0,
            name: aggregate.name.clone(),
            turns: aggregate.turns,
            sticks: aggregate.sticks,
            falls: aggregate.falls,
            matches: aggregate.matches_played.len(),
            wins: aggregate.matches_won.len(),
            stick_rate: aggregate.stick_rate(),
            win_rate: aggregate.win_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRankingEntry {
    pub rank: usize,
    pub player_name: String,
    pub sticks: u32,
    pub total: u32,
    pub stick_rate: f64,
}

/// Players ranked on one jump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRanking {
    pub jump_name: String,
    pub entries: Vec<ElementRankingEntry>,
}

/// Aggregates for one filtered set of records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeriodAnalytics {
    pub match_count: usize,
    pub players: BTreeMap<String, PlayerAggregate>,
    pub elements: BTreeMap<String, ElementAggregate>,
}

impl PeriodAnalytics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_count == 0
    }

    #[must_use]
    pub fn player(&self, name: &str) -> Option<&PlayerAggregate> {
        self.players.get(name)
    }

    /// Players ranked by `sort`; name ascending settles any remaining tie.
    #[must_use]
    pub fn leaderboard(&self, sort: LeaderboardSort) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .players
            .values()
            .map(LeaderboardEntry::from_aggregate)
            .collect();
        entries.sort_by(|a, b| compare_entries(sort, a, b));
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = index + 1;
        }
        entries
    }

    #[must_use]
    pub fn element_ranking(&self, jump_name: &str) -> Option<ElementRanking> {
        self.elements.get(jump_name).map(rank_element)
    }

    /// Rankings for every jump attempted in the period, by jump name.
    #[must_use]
    pub fn element_rankings(&self) -> Vec<ElementRanking> {
        self.elements.values().map(rank_element).collect()
    }
}

fn compare_entries(sort: LeaderboardSort, a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    let primary = match sort {
        LeaderboardSort::WinRate => b
            .win_rate
            .total_cmp(&a.win_rate)
            .then_with(|| b.stick_rate.total_cmp(&a.stick_rate)),
        LeaderboardSort::StickRate => b
            .stick_rate
            .total_cmp(&a.stick_rate)
            .then_with(|| b.wins.cmp(&a.wins)),
        LeaderboardSort::Falls => b.falls.cmp(&a.falls),
    };
    primary.then_with(|| a.name.cmp(&b.name))
}

fn rank_element(element: &ElementAggregate) -> ElementRanking {
    let mut entries: Vec<ElementRankingEntry> = element
        .players
        .iter()
        .map(|(player_name, tally)| ElementRankingEntry {
            rank: 0,
            player_name: player_name.clone(),
            sticks: tally.sticks,
            total: tally.total,
            stick_rate: tally.stick_rate(),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.stick_rate
            .total_cmp(&a.stick_rate)
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }
    ElementRanking {
        jump_name: element.jump_name.clone(),
        entries,
    }
}

/// Records whose completion instant falls inside `range`.
#[must_use]
pub fn filter_records<'a, Tz: TimeZone>(
    history: &'a [MatchRecord],
    range: &DateRange<Tz>,
) -> Vec<&'a MatchRecord> {
    history
        .iter()
        .filter(|record| range.contains(&record.date))
        .collect()
}

/// Fold records into player and jump aggregates.
///
/// A player counts towards a match only through their own turns; names on a
/// lineup that never jumped are left out of the aggregates.
#[must_use]
pub fn aggregate<'a, I>(records: I) -> PeriodAnalytics
where
    I: IntoIterator<Item = &'a MatchRecord>,
{
    let mut analytics = PeriodAnalytics::default();
    for record in records {
        analytics.match_count += 1;
        let key = record.key();
        let winners: BTreeSet<String> = record.winning_players().into_iter().collect();
        if winners.is_empty() {
            warn!(
                target: LOG_TARGET_ANALYTICS,
                "no participants found for winner '{}' of match {key:?}", record.winner
            );
        }

        for event in &record.events {
            let player = player_entry(&mut analytics.players, &event.player_name);
            player.turns += 1;
            match event.result {
                Outcome::Stick => player.sticks += 1,
                Outcome::Fall => player.falls += 1,
                Outcome::NoStick => {}
            }
            player.matches_played.insert(key);
            if winners.contains(&event.player_name) {
                player.matches_won.insert(key);
            }
            player
                .jumps
                .entry(event.jump_name.clone())
                .or_default()
                .record(event.result);

            analytics
                .elements
                .entry(event.jump_name.clone())
                .or_insert_with(|| ElementAggregate {
                    jump_name: event.jump_name.clone(),
                    players: BTreeMap::new(),
                })
                .players
                .entry(event.player_name.clone())
                .or_default()
                .record(event.result);
        }
    }
    debug!(
        target: LOG_TARGET_ANALYTICS,
        "aggregated {} matches for {} players over {} jumps",
        analytics.match_count,
        analytics.players.len(),
        analytics.elements.len()
    );
    analytics
}

fn player_entry<'a>(
    players: &'a mut BTreeMap<String, PlayerAggregate>,
    name: &str,
) -> &'a mut PlayerAggregate {
    players
        .entry(name.to_owned())
        .or_insert_with(|| PlayerAggregate::new(name))
}

/// Filter `history` to `range` and aggregate the result.
#[must_use]
pub fn analyze<Tz: TimeZone>(history: &[MatchRecord], range: &DateRange<Tz>) -> PeriodAnalytics {
    aggregate(filter_records(history, range))
}

/// Records inside `range`, newest first.
#[must_use]
pub fn recent_matches<'a, Tz: TimeZone>(
    history: &'a [MatchRecord],
    range: &DateRange<Tz>,
) -> Vec<&'a MatchRecord> {
    let mut records = filter_records(history, range);
    records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{GameEvent, MatchStats};
    use crate::period::{Granularity, period_range};
    use crate::record::TeamLineup;
    use chrono::{DateTime, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn turn(player: &str, jump: &str, result: Outcome) -> GameEvent {
        GameEvent {
            team_id: 1,
            player_id: 1,
            player_name: player.to_string(),
            jump_name: jump.to_string(),
            result,
            previous_position: 0,
            choice_jump_number: None,
        }
    }

    fn record(
        id: Option<u64>,
        date: DateTime<Utc>,
        winner: &str,
        participants: &[&str],
        events: Vec<GameEvent>,
    ) -> MatchRecord {
        MatchRecord {
            id,
            date,
            winner: winner.to_string(),
            participants: participants.iter().map(ToString::to_string).collect(),
            stats: MatchStats::from_events(&events),
            events,
            lineups: Vec::new(),
        }
    }

    fn history() -> Vec<MatchRecord> {
        vec![
            record(
                Some(1),
                at(10, 18),
                "Hawks",
                &["Hawks: Ana", "Owls: Ben"],
                vec![
                    turn("Ana", "Axel", Outcome::Stick),
                    turn("Ben", "Axel", Outcome::Fall),
                    turn("Ana", "Lutz", Outcome::Stick),
                    turn("Ben", "Lutz", Outcome::Stick),
                ],
            ),
            record(
                Some(2),
                at(12, 18),
                "Owls",
                &["Hawks: Ana", "Owls: Ben"],
                vec![
                    turn("Ana", "Axel", Outcome::Fall),
                    turn("Ben", "Axel", Outcome::Stick),
                    turn("Ana", "Lutz", Outcome::NoStick),
                    turn("Ben", "Lutz", Outcome::Stick),
                ],
            ),
            // Outside the week of the 12th.
            record(
                Some(3),
                at(17, 9),
                "Hawks",
                &["Hawks: Ana", "Owls: Ben"],
                vec![turn("Ana", "Axel", Outcome::Stick)],
            ),
        ]
    }

    fn week_of_the_twelfth() -> DateRange<Utc> {
        period_range(Granularity::Week, 0, &at(12, 12)).unwrap()
    }

    #[test]
    fn filters_to_the_period() {
        let history = history();
        let analytics = analyze(&history, &week_of_the_twelfth());
        assert_eq!(analytics.match_count, 2);
        let ana = analytics.player("Ana").unwrap();
        assert_eq!(ana.turns, 4);
        assert_eq!(ana.sticks, 2);
        assert_eq!(ana.falls, 1);
        assert_eq!(ana.matches_played.len(), 2);
        assert_eq!(ana.matches_won.len(), 1);
        assert_eq!(ana.jumps["Axel"], JumpTally { sticks: 1, total: 2 });
    }

    #[test]
    fn leaderboard_orders_by_each_sort() {
        let history = history();
        let analytics = analyze(&history, &week_of_the_twelfth());

        let by_stick = analytics.leaderboard(LeaderboardSort::StickRate);
        assert_eq!(by_stick[0].name, "Ben");
        assert!((by_stick[0].stick_rate - 75.0).abs() < f64::EPSILON);
        assert_eq!(by_stick[1].rank, 2);

        // Both won once; Ben's stick rate breaks the tie.
        let by_wins = analytics.leaderboard(LeaderboardSort::WinRate);
        assert_eq!(by_wins[0].name, "Ben");
        assert!((by_wins[1].win_rate - 50.0).abs() < f64::EPSILON);

        let by_falls = analytics.leaderboard(LeaderboardSort::Falls);
        assert_eq!(
            by_falls.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>(),
            ["Ana", "Ben"]
        );
    }

    #[test]
    fn equal_stats_fall_back_to_name_order() {
        let records = vec![record(
            Some(1),
            at(11, 10),
            "Owls",
            &["Owls: Zed, Amy"],
            vec![turn("Zed", "Axel", Outcome::Stick), turn("Amy", "Axel", Outcome::Stick)],
        )];
        for sort in LeaderboardSort::ALL {
            let names: Vec<String> = aggregate(&records)
                .leaderboard(sort)
                .into_iter()
                .map(|entry| entry.name)
                .collect();
            assert_eq!(names, ["Amy", "Zed"], "sort {sort}");
        }
    }

    #[test]
    fn players_without_turns_are_left_out() {
        let records = vec![record(
            None,
            at(11, 10),
            "Hawks",
            &["Hawks: Ana, Dee", "Owls: Ben, Cleo"],
            vec![
                turn("Ana", "Axel", Outcome::Fall),
                turn("Ben", "Axel", Outcome::Stick),
            ],
        )];
        let analytics = aggregate(&records);
        assert!(analytics.player("Dee").is_none());
        assert!(analytics.player("Cleo").is_none());

        let ana = analytics.player("Ana").unwrap();
        assert_eq!(ana.matches_won.len(), 1);
        assert!(ana.stick_rate().abs() < f64::EPSILON);
        assert!(analytics.player("Ben").unwrap().matches_won.is_empty());

        let board = analytics.leaderboard(LeaderboardSort::WinRate);
        let names: Vec<&str> = board.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["Ana", "Ben"]);
        assert!(board.iter().all(|entry| entry.stick_rate.is_finite()));

        let empty = aggregate(&Vec::<MatchRecord>::new());
        assert!(empty.is_empty());
        assert!(empty.leaderboard(LeaderboardSort::WinRate).is_empty());
        assert!(JumpTally::default().stick_rate().abs() < f64::EPSILON);
        assert!(PlayerAggregate::new("Nobody").win_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn matches_count_once_per_player_even_without_ids() {
        let records = vec![
            record(
                None,
                at(10, 9),
                "Hawks",
                &["Hawks: Ana"],
                vec![
                    turn("Ana", "Axel", Outcome::Stick),
                    turn("Ana", "Lutz", Outcome::Stick),
                ],
            ),
            record(
                None,
                at(10, 10),
                "Hawks",
                &["Hawks: Ana"],
                vec![turn("Ana", "Axel", Outcome::Stick)],
            ),
        ];
        let analytics = aggregate(&records);
        let ana = analytics.player("Ana").unwrap();
        assert_eq!(ana.matches_played.len(), 2);
        assert_eq!(ana.matches_won.len(), 2);
    }

    #[test]
    fn structured_lineups_resolve_winners() {
        let mut with_lineups = record(
            Some(8),
            at(11, 10),
            "Blue: Team",
            &[],
            vec![turn("Dee", "Loop", Outcome::Stick)],
        );
        with_lineups.lineups = vec![TeamLineup {
            team_name: "Blue: Team".to_string(),
            player_names: vec!["Dee".to_string()],
        }];
        let analytics = aggregate([&with_lineups]);
        assert_eq!(analytics.player("Dee").unwrap().matches_won.len(), 1);
    }

    #[test]
    fn element_rankings_sort_by_rate_then_attempts() {
        let records = vec![record(
            Some(1),
            at(11, 10),
            "Owls",
            &["Owls: Ana, Ben, Cleo"],
            vec![
                turn("Ana", "Flip", Outcome::Stick),
                turn("Ben", "Flip", Outcome::Stick),
                turn("Ben", "Flip", Outcome::Stick),
                turn("Cleo", "Flip", Outcome::Fall),
            ],
        )];
        let analytics = aggregate(&records);
        let ranking = analytics.element_ranking("Flip").unwrap();
        let order: Vec<&str> = ranking
            .entries
            .iter()
            .map(|entry| entry.player_name.as_str())
            .collect();
        assert_eq!(order, ["Ben", "Ana", "Cleo"]);
        assert_eq!(analytics.elements["Flip"].attempts(), 4);
        assert!(analytics.element_ranking("Axel").is_none());
        assert_eq!(analytics.element_rankings().len(), 1);
    }

    #[test]
    fn recent_matches_are_newest_first() {
        let history = history();
        let recent = recent_matches(&history, &week_of_the_twelfth());
        assert_eq!(
            recent.iter().map(|record| record.id).collect::<Vec<_>>(),
            [Some(2), Some(1)]
        );
    }

    #[test]
    fn sort_parses_from_cli_names() {
        assert_eq!("win_rate".parse::<LeaderboardSort>(), Ok(LeaderboardSort::WinRate));
        assert_eq!("Falls".parse::<LeaderboardSort>(), Ok(LeaderboardSort::Falls));
        assert!("streak".parse::<LeaderboardSort>().is_err());
    }
}
