//! The saturating threshold model.
//!
//! Implemented as small, pure functions so that fitting/plotting code can stay
//! simple.

pub mod model;

pub use model::*;
