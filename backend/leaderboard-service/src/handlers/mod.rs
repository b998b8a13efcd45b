/// HTTP handlers for the leaderboard service
///
/// - Users: create, rating update, rank lookup, search
/// - Leaderboard: ranked pages
/// - Simulation: start/stop/status of the update stressor
/// - Admin: cache index resync
pub mod leaderboard;
pub mod simulation;

use actix_web::web;
use std::sync::Arc;

use crate::services::{IndexSync, LeaderboardService, SimulationService};

/// Shared state handed to every handler
pub struct AppState {
    pub leaderboard: LeaderboardService,
    pub simulation: Arc<SimulationService>,
    /// None when no cache index is configured
    pub sync: Option<IndexSync>,
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(leaderboard::health))
        .route("/users", web::post().to(leaderboard::create_user))
        .route("/users/rating", web::put().to(leaderboard::update_rating))
        .route("/users/rank", web::get().to(leaderboard::get_user_rank))
        .route("/users/search", web::get().to(leaderboard::search_users))
        .route("/leaderboard", web::get().to(leaderboard::get_leaderboard))
        .route("/simulation/start", web::post().to(simulation::start))
        .route("/simulation/stop", web::post().to(simulation::stop))
        .route("/simulation/status", web::get().to(simulation::status))
        .route("/admin/resync", web::post().to(leaderboard::resync));
}
