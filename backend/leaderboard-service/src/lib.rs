//! Leaderboard Service
//!
//! Ranks users by rating. PostgreSQL holds the authoritative rows; a Redis
//! sorted set serves ranked pages and rank lookups while it is warm, with
//! PostgreSQL as the fallback for every read.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod services;
pub mod workers;

// Public re-exports
pub use config::Config;
pub use error::{LeaderboardError, Result};
