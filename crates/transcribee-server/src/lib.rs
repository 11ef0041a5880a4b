//! Request Surface (component C7): HTTP + WebSocket endpoints gluing
//! persistence, auth, task dispatch, and document sync into one axum
//! router, plus the periodic scheduler.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod state;

pub use error::{AppError, AppResult};
pub use server::Server;
pub use state::AppState;
