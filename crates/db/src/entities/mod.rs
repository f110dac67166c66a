//! Database entities.

#![allow(missing_docs)]

pub mod honking_vote;
pub mod performance;
pub mod show;
pub mod song;
pub mod user;

pub use honking_vote::Entity as HonkingVote;
pub use performance::Entity as Performance;
pub use show::Entity as Show;
pub use song::Entity as Song;
pub use user::Entity as User;
