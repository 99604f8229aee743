//! Insect Arena round engine
//!
//! A timed arcade round: insects and bonuses spawn in a bounded arena, the
//! player taps them to score, misses cost points and a bonus briefly hands
//! insect movement over to device tilt.
//!
//! # Features
//!
//! - `gold_feed` - Live gold-rate feed over HTTP (golden insects otherwise use the fallback rate)

pub mod config;
pub mod game;
pub mod gold;
pub mod metrics;
pub mod store;
pub mod util;
