//! Approximate / exact nearest-neighbor backends.

pub mod flat;
