pub mod models;

pub use models::{
    normalize_filter, validate_rating, validate_username, CacheMember, LeaderboardEntry, Page,
    User, UserWithRank, DEFAULT_LIMIT, MAX_LIMIT, SEARCH_LIMIT,
};
