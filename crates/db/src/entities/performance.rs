//! Performance entity (one rendition of a song at a show).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "performance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub song_id: String,

    #[sea_orm(indexed)]
    pub show_id: String,

    /// Order in setlist (1, 2, 3...)
    pub position: i32,

    /// Which set (1, 2, 3 for encore)
    #[sea_orm(default_value = 1)]
    pub set_number: i32,

    /// "Guest: ...", "Unfinished", "Segue"
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    /// Number of honking votes pointing at this performance (cache)
    #[sea_orm(default_value = 0)]
    pub honking_vote_count: i32,

    /// Last honking cache recompute
    #[sea_orm(nullable)]
    pub honking_votes_updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::song::Entity",
        from = "Column::SongId",
        to = "super::song::Column::Id",
        on_delete = "Cascade"
    )]
    Song,

    #[sea_orm(
        belongs_to = "super::show::Entity",
        from = "Column::ShowId",
        to = "super::show::Column::Id",
        on_delete = "Cascade"
    )]
    Show,

    #[sea_orm(has_many = "super::honking_vote::Entity")]
    HonkingVotes,
}

impl Related<super::song::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Song.def()
    }
}

impl Related<super::show::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Show.def()
    }
}

impl Related<super::honking_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HonkingVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
