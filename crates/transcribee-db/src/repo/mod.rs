//! Repository functions: one module per aggregate, each a set of free
//! functions taking `&mut PgConnection` so callers control the
//! transaction boundary.

pub mod api_tokens;
pub mod documents;
pub mod share_tokens;
pub mod tasks;
pub mod updates;
pub mod users;
pub mod workers;
