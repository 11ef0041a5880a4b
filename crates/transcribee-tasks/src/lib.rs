//! Task dispatch (component C5): claim/keepalive/complete/fail on top of
//! `transcribee_db`'s task repository, plus the periodic sweepers and the
//! export result channel.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dispatcher;
pub mod export;
pub mod sweeper;

pub use dispatcher::{ClaimedTask, DispatchError, TaskDispatcher};
pub use export::ExportChannel;
