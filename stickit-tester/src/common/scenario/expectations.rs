//! Post-match checks attached to simulation plans.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail, ensure};
use stickit_game::choice::choice_label;
use stickit_game::constants::CHOICE_JUMP_SLOTS;
use stickit_game::{PlayerId, TurnOutcome, replay_positions};

use crate::logic::SimulationSummary;

pub fn match_completes(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.completed,
        "match did not finish within {} turns",
        summary.turns()
    );
    ensure!(
        summary.saved_id.is_some(),
        "completed match was not saved to history"
    );
    Ok(())
}

pub fn record_matches_state(summary: &SimulationSummary) -> Result<()> {
    let Some(record) = summary.record.as_ref() else {
        bail!("completed match produced no record");
    };
    let state = &summary.final_state;
    let Some(winner) = state.winner() else {
        bail!("record captured without a winner");
    };
    ensure!(
        record.winner == winner.name,
        "record winner {} differs from {}",
        record.winner,
        winner.name
    );
    ensure!(
        record.events.as_slice() == state.events(),
        "record holds {} events, match played {}",
        record.events.len(),
        state.events().len()
    );
    ensure!(
        record.participants.len() == state.teams().len(),
        "record lists {} participant entries for {} teams",
        record.participants.len(),
        state.teams().len()
    );
    let expected: Vec<String> = winner.player_names().map(str::to_owned).collect();
    ensure!(
        record.winning_players() == expected,
        "winning players {:?} differ from roster {:?}",
        record.winning_players(),
        expected
    );
    Ok(())
}

pub fn stats_are_consistent(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let stats = state.stats();
    ensure!(
        stats.total() as usize == state.events().len(),
        "stats count {} turns, log holds {}",
        stats.total(),
        state.events().len()
    );
    if let Some(record) = summary.record.as_ref() {
        ensure!(record.stats_consistent(), "record stats disagree with its events");
    }
    let replayed = replay_positions(state.teams(), state.events(), state.rules());
    for team in state.teams() {
        ensure!(
            replayed.get(&team.id) == Some(&team.position),
            "{} sits at {} but its events replay to {:?}",
            team.name,
            team.position,
            replayed.get(&team.id)
        );
        ensure!(
            team.position <= state.total_steps(),
            "{} overshot the finish",
            team.name
        );
    }
    Ok(())
}

pub fn undo_is_exact(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.undo_mismatches == 0,
        "{} of {} turns did not undo cleanly",
        summary.undo_mismatches,
        summary.turns()
    );
    Ok(())
}

pub fn extensions_are_sequential(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let base = state.total_steps() - state.extra_rounds();
    let mut expected_round = 0;
    for outcome in &summary.outcomes {
        if let TurnOutcome::TieExtended {
            extra_rounds,
            total_steps,
        } = outcome
        {
            expected_round += 1;
            ensure!(
                *extra_rounds == expected_round,
                "extension {extra_rounds} arrived out of order"
            );
            ensure!(
                *total_steps == base + extra_rounds,
                "extension {extra_rounds} moved the finish to {total_steps}"
            );
        }
    }
    ensure!(
        state.extra_rounds() == expected_round,
        "match holds {} extensions but reported {expected_round}",
        state.extra_rounds()
    );
    Ok(())
}

pub fn wins_close_a_round(summary: &SimulationSummary) -> Result<()> {
    if !summary.completed {
        return Ok(());
    }
    let state = &summary.final_state;
    ensure!(
        state.events().len() % state.teams().len() == 0,
        "match ended mid-round after {} turns",
        state.events().len()
    );
    let finishers = state
        .teams()
        .iter()
        .filter(|team| team.position >= state.total_steps())
        .count();
    ensure!(finishers == 1, "{finishers} teams stood on the finish");
    Ok(())
}

pub fn only_choice_jumps_played(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    ensure!(state.jump_order().is_empty(), "plan expected an empty jump order");
    ensure!(
        state.total_steps() == CHOICE_JUMP_SLOTS + state.extra_rounds(),
        "finish {} is not the choice slots plus extensions",
        state.total_steps()
    );
    if let Some(event) = state.events().iter().find(|event| !event.is_choice_jump()) {
        bail!("'{}' was played outside a choice slot", event.jump_name);
    }
    Ok(())
}

pub fn choice_jumps_never_repeat(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let mut picks: BTreeMap<PlayerId, BTreeMap<u32, &str>> = BTreeMap::new();
    for event in state.events() {
        let Some(slot) = event.choice_jump_number else {
            continue;
        };
        if event.jump_name == choice_label(slot) {
            continue;
        }
        ensure!(
            !state.jump_order().contains(&event.jump_name),
            "{} picked base jump '{}' for slot {slot}",
            event.player_name,
            event.jump_name
        );
        let held = picks
            .entry(event.player_id)
            .or_default()
            .entry(slot)
            .or_insert(event.jump_name.as_str());
        ensure!(
            *held == event.jump_name,
            "{} switched slot {slot} from '{held}' to '{}'",
            event.player_name,
            event.jump_name
        );
    }
    for (player_id, slots) in &picks {
        let distinct: BTreeSet<&str> = slots.values().copied().collect();
        ensure!(
            distinct.len() == slots.len(),
            "player {player_id} repeated a choice jump across slots"
        );
    }
    Ok(())
}

pub fn placeholders_label_unpicked_slots(summary: &SimulationSummary) -> Result<()> {
    for event in summary.final_state.events() {
        if let Some(slot) = event.choice_jump_number {
            ensure!(
                event.jump_name == choice_label(slot),
                "slot {slot} was attempted as '{}' without a pick",
                event.jump_name
            );
        }
    }
    Ok(())
}
