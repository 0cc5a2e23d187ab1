pub mod match_tester;
pub mod policy;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use match_tester::{MatchTester, SimulationPlan, SimulationSummary, TesterAssets};
pub use policy::OutcomeStrategy;
pub use seeds::resolve_seed_inputs;
pub use tester::*;
