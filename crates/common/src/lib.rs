//! Shared types and error definitions for bet-research.

pub mod emphasis;
pub mod error;
pub mod market;
pub mod types;

pub use emphasis::{emphasis_spans, Span};
pub use error::Error;
pub use market::*;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
