//! Database persistence layer for credentials, matches and aggregate statistics.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::{DbError, DbErrorKind};
pub use models::{
    MatchRecord, MatchResult, MatchUpdate, NewMatchRecord, NewUser, UserRecord, UserStats,
};
pub use repository::{API_KEY_LEN, GameRepository};
