//! Generation adapters for research artifacts, step narration and
//! follow-up questions.

pub mod artifact;
pub mod followup;
pub mod narrator;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{ArtifactGenerator, GeneratedArtifact, ValidityWindow};
pub use followup::{ResearchChat, ResearchExtender};
pub use narrator::{fallback_steps, Narration, StepNarrator, FALLBACK_STEPS};
