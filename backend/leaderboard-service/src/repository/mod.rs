mod memory;
mod postgres;
mod r#trait;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;
pub use r#trait::UserStore;
