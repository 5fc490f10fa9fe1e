//! Cinder Core - Foundational types for the Cinder engine
//!
//! This crate provides the types every other Cinder crate depends on:
//! - `CinderError` - the engine-wide error enum
//! - `Result` - alias over `CinderError`

mod error;

pub use error::{CinderError, Result};
