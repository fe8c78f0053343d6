//! Cosmetic research progress: a step-list state machine and a tokio
//! ticker that advances it until real completion is signalled.

pub mod simulator;
pub mod ticker;

pub use simulator::{ProgressSimulator, ProgressView, StepStatus, OVERFLOW_STEPS};
pub use ticker::{ProgressTicker, STEP_INTERVAL};
