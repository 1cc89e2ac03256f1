mod generator;
mod supervisor;

pub use generator::{GeneratorEngine, GeneratorReport};
pub use supervisor::{BestTracker, SupervisorEngine, Verdict};
