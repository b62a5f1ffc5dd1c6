//! Capacity scaling policy.
//!
//! Pure evaluation of a load sample against the current `ScalingState`.
//! The capacity monitor owns the only mutable copy of the state and
//! publishes every new value to readers.

mod policy;

pub use policy::{LoadSample, ScalingDecision, ScalingPolicy, ScalingState};
