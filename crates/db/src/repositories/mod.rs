//! Database repositories.

pub mod honking_vote;
pub mod performance;
pub mod song;
pub mod user;

pub use honking_vote::{HonkingVoteRepository, PerformanceTally};
pub use performance::PerformanceRepository;
pub use song::SongRepository;
pub use user::UserRepository;
