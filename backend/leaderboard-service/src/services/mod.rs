mod leaderboard;
mod simulation;
mod sync;

pub use leaderboard::LeaderboardService;
pub use simulation::SimulationService;
pub use sync::IndexSync;
