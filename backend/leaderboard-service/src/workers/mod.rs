pub mod driver;
pub mod redis_health;
pub mod resync;

pub use driver::{run_periodic, BackgroundDriver, PeriodicTask};
pub use redis_health::RedisHealthCheck;
pub use resync::PeriodicResync;
