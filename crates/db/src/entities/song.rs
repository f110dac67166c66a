//! Song entity.
//!
//! Carries the denormalized honking-version cache: the performance with the
//! most honking votes and its vote count. These columns are only ever
//! written by the cache recalculation engine in `honk-core`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "song")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub name: String,

    /// URL-friendly name
    #[sea_orm(unique)]
    pub slug: String,

    pub artist: String,

    /// Winning performance (cache). NULL when the song has no honking votes.
    #[sea_orm(nullable)]
    pub current_honking_performance_id: Option<String>,

    /// Vote count of the winning performance (cache)
    #[sea_orm(default_value = 0)]
    pub current_honking_vote_count: i32,

    /// Last honking cache recompute
    #[sea_orm(nullable)]
    pub honking_version_updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::performance::Entity")]
    Performances,

    #[sea_orm(has_many = "super::honking_vote::Entity")]
    HonkingVotes,

    #[sea_orm(
        belongs_to = "super::performance::Entity",
        from = "Column::CurrentHonkingPerformanceId",
        to = "super::performance::Column::Id",
        on_delete = "SetNull"
    )]
    HonkingPerformance,
}

impl Related<super::performance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Performances.def()
    }
}

impl Related<super::honking_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HonkingVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
