//! Research orchestration: cache consult, single-flight generation,
//! background image patching and narration write-back, plus the client
//! session that layers the local tiers on top.

pub mod orchestrator;
pub mod session;
pub mod single_flight;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{BackgroundReport, BackgroundWork, Generators, Orchestrator, ResearchOutcome};
pub use session::ResearchSession;
pub use single_flight::KeyedLocks;
