//! Stream Relay - real-time event relay for live video streams.
//!
//! Viewers and streamers hold WebSocket connections grouped into per-stream
//! rooms. Overlays, chat, reactions and poll votes sent into a room are
//! fanned out to every other member. Admission is bounded by a ceiling
//! that a capacity monitor adjusts from load samples, and calls to the
//! video-hosting provider run behind a circuit breaker.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
