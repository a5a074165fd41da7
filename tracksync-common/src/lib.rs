//! # Tracksync Common Library
//!
//! Shared code for the tracksync workspace:
//! - Logical queue data model and append/rebuild diffing
//! - Event types (engine events in, sync events out)
//! - Error types
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
