use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use stickit_game::{MatchState, Outcome};

/// Policy interface for automated jumpers.
pub trait OutcomePolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Decide how the active player's jump lands.
    fn next_outcome(&mut self, state: &MatchState) -> Outcome;

    /// Pick a choice jump from `candidates`, or `None` to leave the slot
    /// on its placeholder label.
    fn pick_choice(&mut self, state: &MatchState, candidates: &[String]) -> Option<String>;
}

/// Built-in jumper profiles for automated matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeStrategy {
    Steady,
    Reckless,
    Cautious,
    Chaos,
}

impl OutcomeStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Steady => "Steady",
            Self::Reckless => "Reckless",
            Self::Cautious => "Cautious",
            Self::Chaos => "Chaos",
        }
    }

    /// Stick, no-stick and fall weights out of 100.
    const fn weights(self) -> [u32; 3] {
        match self {
            Self::Steady => [80, 15, 5],
            Self::Reckless => [70, 0, 30],
            Self::Cautious => [40, 55, 5],
            Self::Chaos => [50, 25, 25],
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn OutcomePolicy + Send> {
        Box::new(WeightedPolicy::new(self, seed))
    }
}

impl fmt::Display for OutcomeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct WeightedPolicy {
    strategy: OutcomeStrategy,
    rng: ChaCha20Rng,
}

impl WeightedPolicy {
    fn new(strategy: OutcomeStrategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl OutcomePolicy for WeightedPolicy {
    fn name(&self) -> &'static str {
        self.strategy.label()
    }

    fn next_outcome(&mut self, _state: &MatchState) -> Outcome {
        let [stick, no_stick, _] = self.strategy.weights();
        let roll = self.rng.gen_range(0..100);
        if roll < stick {
            Outcome::Stick
        } else if roll < stick + no_stick {
            Outcome::NoStick
        } else {
            Outcome::Fall
        }
    }

    fn pick_choice(&mut self, _state: &MatchState, candidates: &[String]) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..candidates.len());
        candidates.get(idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stickit_game::{JumpOrder, Player, Team};

    fn state() -> MatchState {
        let teams = vec![Team::new(1, "Hawks", vec![Player::new(1, "Ana")])];
        MatchState::with_default_rules(teams, JumpOrder::new(["Axel"])).unwrap()
    }

    #[test]
    fn same_seed_replays_the_same_outcomes() {
        let state = state();
        let mut first = OutcomeStrategy::Chaos.create_policy(11);
        let mut second = OutcomeStrategy::Chaos.create_policy(11);
        let a: Vec<Outcome> = (0..32).map(|_| first.next_outcome(&state)).collect();
        let b: Vec<Outcome> = (0..32).map(|_| second.next_outcome(&state)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn reckless_jumpers_never_land_a_no_stick() {
        let state = state();
        let mut policy = OutcomeStrategy::Reckless.create_policy(3);
        assert!((0..500).all(|_| policy.next_outcome(&state) != Outcome::NoStick));
        assert_eq!(policy.name(), "Reckless");
    }

    #[test]
    fn choices_come_from_the_candidates() {
        let state = state();
        let mut policy = OutcomeStrategy::Steady.create_policy(5);
        assert!(policy.pick_choice(&state, &[]).is_none());
        let candidates = vec!["Flip".to_string(), "Loop".to_string()];
        let pick = policy.pick_choice(&state, &candidates).unwrap();
        assert!(candidates.contains(&pick));
    }
}
