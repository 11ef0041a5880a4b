//! Realtime document sync (component C6): per-document pub/sub fan-out
//! over the wire framing defined in `wire`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod hub;
pub mod wire;

pub use hub::{SubscriberId, SyncHub};
pub use wire::Frame;
