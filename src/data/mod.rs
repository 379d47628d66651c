//! Sample sources: the built-in measured thresholds and a seeded synthetic
//! generator.

pub mod builtin;
pub mod synth;

pub use builtin::*;
pub use synth::*;
