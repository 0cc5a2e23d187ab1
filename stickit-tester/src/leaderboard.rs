//! Period leaderboards over stored match history.
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use colored::Colorize;
use serde::Serialize;
use stickit_game::{
    ElementRanking, Granularity, LeaderboardEntry, LeaderboardSort, MatchEngine, MatchId,
    MatchRecord, MatchStats, MatchStorage, PeriodCursor, RosterLoader, recent_matches,
};

/// Everything shown for one period.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardReport {
    pub granularity: Granularity,
    pub offset: u32,
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sort: LeaderboardSort,
    pub match_count: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub elements: Vec<ElementRanking>,
    pub recent: Vec<RecentMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentMatch {
    pub id: Option<MatchId>,
    pub date: DateTime<Utc>,
    pub winner: String,
    pub participants: Vec<String>,
    pub turns: usize,
    pub stats: MatchStats,
}

impl From<&MatchRecord> for RecentMatch {
    fn from(record: &MatchRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            winner: record.winner.clone(),
            participants: record.participants.clone(),
            turns: record.events.len(),
            stats: record.stats,
        }
    }
}

/// Resolve `cursor` against `now` and rank the history it selects.
pub fn build_report<L, S, Tz>(
    engine: &MatchEngine<L, S>,
    cursor: &PeriodCursor,
    now: &DateTime<Tz>,
    sort: LeaderboardSort,
    recent_limit: usize,
) -> Result<LeaderboardReport>
where
    L: RosterLoader,
    S: MatchStorage,
    Tz: TimeZone,
{
    let (range, analytics) = engine
        .period_analytics(cursor, now)
        .context("failed to build period analytics")?;
    let history = engine.load_history()?;
    let recent = recent_matches(&history, &range)
        .into_iter()
        .take(recent_limit)
        .map(RecentMatch::from)
        .collect();
    let period = range.label();
    let utc = range.to_utc();

    Ok(LeaderboardReport {
        granularity: cursor.granularity(),
        offset: cursor.offset(),
        period,
        start: utc.start,
        end: utc.end,
        sort,
        match_count: analytics.match_count,
        leaderboard: analytics.leaderboard(sort),
        elements: analytics.element_rankings(),
        recent,
    })
}

pub fn generate_console_report(out: &mut dyn Write, report: &LeaderboardReport) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{} {} ({}), by {}",
        "🏆 Leaderboard".bright_cyan().bold(),
        period_heading(report),
        report.period,
        report.sort
    )?;
    writeln!(out, "{}", "==============================".cyan())?;

    if report.match_count == 0 {
        writeln!(out, "No matches recorded in this period.")?;
        return Ok(());
    }
    writeln!(out, "Matches: {}", report.match_count)?;
    writeln!(out)?;

    for entry in &report.leaderboard {
        writeln!(
            out,
            "{:>3}. {:<14} stick {:>5.1}% ({}/{})  wins {}/{} ({:.1}%)  falls {}",
            entry.rank,
            entry.name,
            entry.stick_rate,
            entry.sticks,
            entry.turns,
            entry.wins,
            entry.matches,
            entry.win_rate,
            entry.falls
        )?;
    }

    if !report.elements.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "🎯 Jump Rankings".bright_yellow().bold())?;
        for ranking in &report.elements {
            let line = ranking
                .entries
                .iter()
                .map(|entry| {
                    format!(
                        "{}. {} {:.1}% ({}/{})",
                        entry.rank, entry.player_name, entry.stick_rate, entry.sticks, entry.total
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "   {}: {line}", ranking.jump_name.bold())?;
        }
    }

    if !report.recent.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "🕒 Recent Matches".bright_yellow().bold())?;
        for recent in &report.recent {
            writeln!(
                out,
                "   {} {}  winner {}  [{}]",
                match_label(recent),
                recent.date.format("%Y-%m-%d %H:%M UTC"),
                recent.winner.green(),
                recent.participants.join(" | ")
            )?;
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &LeaderboardReport) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &LeaderboardReport) -> Result<()> {
    writeln!(
        out,
        "# Stick It Leaderboard: {} ({})\n",
        period_heading(report),
        report.period
    )?;
    writeln!(out, "- **Matches**: {}", report.match_count)?;
    writeln!(out, "- **Sorted by**: {}\n", report.sort)?;

    if report.match_count == 0 {
        writeln!(out, "_No matches recorded in this period._")?;
        return Ok(());
    }

    writeln!(out, "| Rank | Player | Stick % | Sticks | Turns | Wins | Matches | Win % | Falls |")?;
    writeln!(out, "|---:|---|---:|---:|---:|---:|---:|---:|---:|")?;
    for entry in &report.leaderboard {
        writeln!(
            out,
            "| {} | {} | {:.1} | {} | {} | {} | {} | {:.1} | {} |",
            entry.rank,
            entry.name,
            entry.stick_rate,
            entry.sticks,
            entry.turns,
            entry.wins,
            entry.matches,
            entry.win_rate,
            entry.falls
        )?;
    }

    if !report.elements.is_empty() {
        writeln!(out, "\n## Jump Rankings\n")?;
        for ranking in &report.elements {
            writeln!(out, "### {}\n", ranking.jump_name)?;
            for entry in &ranking.entries {
                writeln!(
                    out,
                    "{}. {}: {:.1}% ({}/{})",
                    entry.rank, entry.player_name, entry.stick_rate, entry.sticks, entry.total
                )?;
            }
            writeln!(out)?;
        }
    }

    if !report.recent.is_empty() {
        writeln!(out, "## Recent Matches\n")?;
        for recent in &report.recent {
            writeln!(
                out,
                "- {} {}: **{}** over {}",
                match_label(recent),
                recent.date.format("%Y-%m-%d %H:%M UTC"),
                recent.winner,
                recent.participants.join("; ")
            )?;
        }
    }
    Ok(())
}

fn period_heading(report: &LeaderboardReport) -> String {
    match report.offset {
        0 => format!("this {}", report.granularity),
        1 => format!("last {}", report.granularity),
        offset => format!("{} {}s ago", offset, report.granularity),
    }
}

fn match_label(recent: &RecentMatch) -> String {
    recent
        .id
        .map_or_else(|| "#-".to_string(), |id| format!("#{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::TesterAssets;
    use crate::logic::match_tester::CatalogLoader;
    use std::convert::Infallible;
    use std::sync::Arc;

    #[derive(Clone)]
    struct SampleHistory(Vec<MatchRecord>);

    impl MatchStorage for SampleHistory {
        type Error = Infallible;

        fn save_match(&self, _record: &MatchRecord) -> Result<MatchId, Self::Error> {
            Ok(0)
        }

        fn load_match_history(&self) -> Result<Vec<MatchRecord>, Self::Error> {
            Ok(self.0.clone())
        }
    }

    fn engine() -> MatchEngine<CatalogLoader, SampleHistory> {
        let history =
            serde_json::from_str(include_str!("../../data/sample_history.json")).unwrap();
        let assets = Arc::new(TesterAssets::load_default().unwrap());
        MatchEngine::new(CatalogLoader::new(assets), SampleHistory(history))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 21, 0, 0).unwrap()
    }

    fn render(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn current_week_report_ranks_and_lists_recent_matches() {
        let cursor = PeriodCursor::new(Granularity::Week);
        let report = build_report(&engine(), &cursor, &now(), LeaderboardSort::StickRate, 1)
            .unwrap();

        assert_eq!(report.match_count, 2);
        assert_eq!(report.period, "Mar 10 - Mar 16");
        let names: Vec<&str> = report.leaderboard.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ben", "Cleo", "Ana"]);
        assert_eq!(report.recent.len(), 1);
        assert_eq!(report.recent[0].id, Some(2));
    }

    #[test]
    fn previous_month_shows_the_legacy_record() {
        let cursor = PeriodCursor::new(Granularity::Month).with_offset(1);
        let report =
            build_report(&engine(), &cursor, &now(), LeaderboardSort::WinRate, 5).unwrap();
        assert_eq!(report.match_count, 1);
        assert!(report.leaderboard.is_empty());
        assert_eq!(report.recent[0].id, None);
        assert_eq!(report.recent[0].turns, 0);

        let text = render(|out| generate_markdown_report(out, &report));
        assert!(text.starts_with("# Stick It Leaderboard: last month (Feb 1 - Feb 28)"));
        assert!(text.contains("- #- 2025-02-27 20:00 UTC: **Red Fox**"));
    }

    #[test]
    fn empty_periods_render_a_notice() {
        colored::control::set_override(false);
        let cursor = PeriodCursor::new(Granularity::Day).with_offset(3);
        let report = build_report(&engine(), &cursor, &now(), LeaderboardSort::Falls, 5).unwrap();
        assert!(report.leaderboard.is_empty());

        let text = render(|out| generate_console_report(out, &report));
        assert!(text.contains("3 days ago (Mar 9 - Mar 9)"));
        assert!(text.contains("No matches recorded in this period."));
    }

    #[test]
    fn json_report_carries_rankings() {
        let cursor = PeriodCursor::new(Granularity::Week);
        let report = build_report(&engine(), &cursor, &now(), LeaderboardSort::Falls, 5).unwrap();
        let text = render(|out| generate_json_report(out, &report));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["granularity"], "week");
        assert_eq!(value["sort"], "falls");
        assert_eq!(value["leaderboard"][0]["name"], "Ana");
        assert_eq!(value["elements"][0]["jump_name"], "Axel");
    }
}
