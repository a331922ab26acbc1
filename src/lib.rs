//! Gridmatch library - server for a single-player grid game
//!
//! Players log in through a one-time OAuth code and receive an API key. With the key
//! they create matches and submit moves; every finished match feeds a per-user average
//! that backs a public leaderboard and a published hall-of-fame page.
//!
//! # Architecture
//!
//! - **Game**: board, move resolution and the match state machine
//! - **Db**: SQLite persistence for credentials, matches and aggregates
//! - **Scoring**: leaderboard computation over the aggregates
//! - **Service**: request-level operations scoped by API key
//! - **Http**: axum routes over the service
//! - **Publish**: best-effort hall-of-fame publication
//!
//! # Example
//!
//! ```no_run
//! use gridmatch::{GameRepository, MatchService, MatchSettings};
//!
//! # fn example() -> anyhow::Result<()> {
//! let repository = GameRepository::new("gridmatch.db".to_string())?;
//! repository.run_migrations()?;
//! let service = MatchService::new(repository, MatchSettings::default());
//! let leaderboard = service.leaderboard()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod auth;
mod config;
mod db;
mod game;
mod http;
mod publish;
mod scoring;
mod service;

// Crate-level exports - Game domain
pub use game::{
    Board, Cell, CellState, CellView, Coord, DEFAULT_BOARD_SIZE, DEFAULT_INITIAL_MOVES,
    Direction, GameError, LINE_BONUS_PER_CELL, MAX_BOARD_SIZE, MAX_INITIAL_MOVES, MAX_POINTS,
    MIN_POINTS, Match, MatchEvent, MatchSettings, MatchStatus, MatchView, MoveOutcome, Player,
    Resolution, resolve,
};

// Crate-level exports - Persistence
pub use db::{
    API_KEY_LEN, DbError, DbErrorKind, GameRepository, MatchRecord, MatchResult, MatchUpdate,
    NewMatchRecord, NewUser, UserRecord, UserStats,
};

// Crate-level exports - Aggregation
pub use scoring::{LeaderboardEntry, ScoreBoard, leaderboard_from, rank_by_score, rank_leaderboard};

// Crate-level exports - Request handling
pub use api::{
    ApiKeyResponse, Leaderboard, MatchCreated, MatchResults, MovePayload, MoveRequest,
    PlayerScore,
};
pub use auth::{AuthError, GithubOAuth, Identity, IdentityProvider};
pub use http::{API_KEY_HEADER, ApiKey, AppState, router};
pub use service::{MatchService, MoveReply, ServiceError};

// Crate-level exports - Configuration and publication
pub use config::{ConfigError, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_DATABASE_URL, ServerConfig};
pub use publish::{
    DirectorySink, HOF_KEY, HallOfFame, HttpSink, PublicationSink, PublishError, PublishStatus,
    render_hall_of_fame,
};
