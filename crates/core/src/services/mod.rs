//! Business logic services.

pub mod honking_cache;
pub mod honking_vote;

pub use honking_cache::{BackfillMode, BackfillReport, HonkingCacheService, SongCache};
pub use honking_vote::{HonkingVersionView, HonkingVoteService, SetVoteOutcome};
