//! Shared primitives for the Transcribee coordinator.
//!
//! Every other coordinator crate depends on this one for configuration and
//! the current-time helper; nothing in here talks to the database or the
//! network.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod time;

pub use config::Settings;
pub use time::now_tz_aware;
