//! Cinder Player - headless demo runner library
//!
//! This crate provides the `PlayerApp` driving a demo scene through the
//! frame pipeline, plus the demo systems, a headless draw target and the
//! logger setup used by the binary.

pub mod demo;
pub mod headless;
mod logging;
mod player_app;

pub use logging::init_logging;
pub use player_app::{PlayerApp, PlayerOptions, ProfileRow, RunSummary};
