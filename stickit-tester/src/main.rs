mod common;
mod leaderboard;
mod logic;
mod storage;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use common::scenario::{ALL_SCENARIOS, get_scenario, list_scenarios};
use common::split_csv;
use leaderboard::LeaderboardReport;
use logic::match_tester::CatalogLoader;
use logic::{LogicTester, MatchTester, TesterAssets, resolve_seed_inputs};
use stickit_game::{Granularity, LeaderboardSort, MatchEngine, PeriodCursor};
use storage::HistoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestMode {
    /// Simulated matches checked against the engine invariants
    Logic,
    /// Period leaderboard over the match history
    Leaderboard,
    /// Simulate matches, then rank the resulting history
    Both,
}

impl TestMode {
    const fn runs_logic(self) -> bool {
        matches!(self, Self::Logic | Self::Both)
    }

    const fn runs_leaderboard(self) -> bool {
        matches!(self, Self::Leaderboard | Self::Both)
    }
}

#[derive(Debug, Parser)]
#[command(name = "stickit-tester", version = "0.1.0")]
#[command(about = "Automated QA and leaderboard reports for the Stick It match engine")]
struct Args {
    /// Test mode: logic (simulated matches), leaderboard, or both
    #[arg(long, value_enum, default_value_t = TestMode::Logic)]
    mode: TestMode,

    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of matches per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Catalog JSON with players, jump order, library and teams
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Match history JSON; simulated matches are appended to it
    #[arg(long)]
    history: Option<PathBuf>,

    // Leaderboard options
    /// Leaderboard period granularity
    #[arg(long, default_value = "week")]
    #[arg(value_parser = ["day", "week", "month", "year"])]
    period: String,

    /// How many periods back from the current one
    #[arg(long, default_value_t = 0)]
    offset: u32,

    /// Leaderboard ordering
    #[arg(long, default_value = "stick-rate")]
    #[arg(value_parser = ["stick-rate", "win-rate", "falls"])]
    sort: String,

    /// Reference instant (RFC 3339) instead of the local clock
    #[arg(long, value_parser = DateTime::parse_from_rfc3339)]
    now: Option<DateTime<FixedOffset>>,

    /// Recent matches listed under the leaderboard
    #[arg(long, default_value_t = 5)]
    recent: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    if args.mode == TestMode::Leaderboard && args.history.is_none() {
        bail!("leaderboard mode needs --history to read matches from");
    }

    announce_banner();

    let start_time = Instant::now();
    let assets = Arc::new(load_assets(&args)?);
    let history = HistoryStore::from_path(args.history.clone());
    info!("match history: {}", history.describe());

    let results = run_logic_scenarios(&args, &assets, &history)?;
    let report = if args.mode.runs_leaderboard() {
        Some(build_leaderboard(&args, &assets, &history)?)
    } else {
        None
    };

    write_reports(&args, &results, report.as_ref(), start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🤸 Stick It Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_assets(args: &Args) -> Result<TesterAssets> {
    match args.catalog.as_deref() {
        Some(path) => TesterAssets::load_from_path(path),
        None => TesterAssets::load_default(),
    }
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        scenarios.extend(ALL_SCENARIOS.iter().map(ToString::to_string));
    }
    scenarios
}

fn run_logic_scenarios(
    args: &Args,
    assets: &Arc<TesterAssets>,
    history: &HistoryStore,
) -> Result<Vec<logic::ScenarioResult>> {
    let mut results: Vec<logic::ScenarioResult> = Vec::new();
    if !args.mode.runs_logic() {
        return Ok(results);
    }

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let match_tester = MatchTester::new(Arc::clone(assets), history.clone(), args.verbose);
    let logic_tester = LogicTester::new(match_tester, args.verbose);

    for scenario_name in expand_scenarios(&args.scenarios) {
        if let Some(scenario) = get_scenario(&scenario_name) {
            results.extend(logic_tester.run_scenario(&scenario, &seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    Ok(results)
}

fn build_leaderboard(
    args: &Args,
    assets: &Arc<TesterAssets>,
    history: &HistoryStore,
) -> Result<LeaderboardReport> {
    let granularity: Granularity = args.period.parse()?;
    let sort: LeaderboardSort = args.sort.parse().map_err(anyhow::Error::msg)?;
    let cursor = PeriodCursor::new(granularity).with_offset(args.offset);
    let engine = MatchEngine::new(CatalogLoader::new(Arc::clone(assets)), history.clone());

    let report = match args.now {
        Some(now) => leaderboard::build_report(&engine, &cursor, &now, sort, args.recent),
        None => leaderboard::build_report(&engine, &cursor, &Local::now(), sort, args.recent),
    };
    report.with_context(|| format!("failed to rank history from {}", history.describe()))
}

#[derive(Serialize)]
struct CombinedReport<'a> {
    logic: &'a [logic::ScenarioResult],
    leaderboard: &'a LeaderboardReport,
}

fn write_reports(
    args: &Args,
    results: &[logic::ScenarioResult],
    board: Option<&LeaderboardReport>,
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    let out: &mut dyn Write = &mut output_target;

    match args.report.as_str() {
        "json" => match board {
            Some(report) if args.mode == TestMode::Both => {
                let combined = CombinedReport {
                    logic: results,
                    leaderboard: report,
                };
                writeln!(out, "{}", serde_json::to_string_pretty(&combined)?)?;
            }
            Some(report) => leaderboard::generate_json_report(out, report)?,
            None if results.is_empty() => writeln!(out, "[]")?,
            None => logic::reports::generate_json_report(out, results)?,
        },
        "markdown" => {
            if args.mode.runs_logic() {
                if results.is_empty() {
                    writeln!(out, "# Stick It Logic Test Results\n\n_No scenarios executed._")?;
                } else {
                    logic::reports::generate_markdown_report(out, results)?;
                }
            }
            if let Some(report) = board {
                leaderboard::generate_markdown_report(out, report)?;
            }
        }
        _ => {
            if args.mode.runs_logic() {
                if results.is_empty() {
                    writeln!(out, "No logic scenarios executed.")?;
                } else {
                    logic::reports::generate_console_report(out, results, start_time.elapsed())?;
                }
            }
            if let Some(report) = board {
                leaderboard::generate_console_report(out, report)?;
            }
            writeln!(out)?;
            writeln!(out, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
