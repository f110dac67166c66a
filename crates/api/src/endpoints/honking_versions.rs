//! Honking version endpoints.
//!
//! Reads come straight from the cache columns on songs and performances;
//! only the vote mutations touch the ledger.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use honk_common::AppResult;
use honk_core::SongCache;
use honk_db::entities::{honking_vote, performance};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Winning performance of a song.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HonkingVersionResponse {
    pub performance_id: String,
    pub song_id: String,
    pub show_id: String,
    pub position: i32,
    pub set_number: i32,
    pub notes: Option<String>,
    pub honking_votes: i32,
}

impl From<performance::Model> for HonkingVersionResponse {
    fn from(p: performance::Model) -> Self {
        Self {
            performance_id: p.id,
            song_id: p.song_id,
            show_id: p.show_id,
            position: p.position,
            set_number: p.set_number,
            notes: p.notes,
            honking_votes: p.honking_vote_count,
        }
    }
}

/// Cached votes of one performance.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTallyResponse {
    pub performance_id: String,
    pub vote_count: i32,
}

/// A vote as seen by its owner.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub id: String,
    pub user_id: String,
    pub song_id: String,
    pub performance_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<honking_vote::Model> for VoteResponse {
    fn from(v: honking_vote::Model) -> Self {
        Self {
            id: v.id,
            user_id: v.user_id,
            song_id: v.song_id,
            performance_id: v.performance_id,
            created_at: v.created_at.to_rfc3339(),
            updated_at: v.updated_at.to_rfc3339(),
        }
    }
}

/// Song honking version response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongHonkingResponse {
    pub song_id: String,
    pub honking_version: Option<HonkingVersionResponse>,
    pub honking_votes: Vec<PerformanceTallyResponse>,
    pub user_honking_vote: Option<VoteResponse>,
    pub updated_at: Option<String>,
}

/// Get the honking version of a song.
async fn get_song(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(song_id): Path<String>,
) -> AppResult<ApiResponse<SongHonkingResponse>> {
    let view = state
        .honking_vote_service
        .get_song_honking_version(&song_id)
        .await?;

    let user_honking_vote = match maybe_user {
        Some(user) => state
            .honking_vote_service
            .get_user_vote(&user.id, &song_id)
            .await?
            .map(VoteResponse::from),
        None => None,
    };

    Ok(ApiResponse::ok(SongHonkingResponse {
        song_id: view.song.id,
        honking_version: view.honking_version.map(HonkingVersionResponse::from),
        honking_votes: view
            .tally
            .into_iter()
            .map(|p| PerformanceTallyResponse {
                performance_id: p.id,
                vote_count: p.honking_vote_count,
            })
            .collect(),
        user_honking_vote,
        updated_at: view.song.honking_version_updated_at.map(|t| t.to_rfc3339()),
    }))
}

/// Set vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetVoteRequest {
    #[validate(length(min = 1, max = 64))]
    pub performance_id: String,
}

/// Set vote response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVoteResponse {
    #[serde(flatten)]
    pub vote: VoteResponse,
    pub created: bool,
    pub honking_version: SongCache,
}

/// Set or change the caller's honking vote for a song.
async fn set_vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(song_id): Path<String>,
    Json(req): Json<SetVoteRequest>,
) -> AppResult<ApiResponse<SetVoteResponse>> {
    req.validate()?;

    let outcome = state
        .honking_vote_service
        .set_vote(&user.id, &song_id, &req.performance_id)
        .await?;

    Ok(ApiResponse::ok(SetVoteResponse {
        created: outcome.is_new(),
        honking_version: outcome.honking_version,
        vote: outcome.vote.into(),
    }))
}

/// Delete vote response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVoteResponse {
    pub song_id: String,
    pub honking_version: SongCache,
}

/// Remove the caller's honking vote for a song.
async fn delete_vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(song_id): Path<String>,
) -> AppResult<ApiResponse<DeleteVoteResponse>> {
    let honking_version = state
        .honking_vote_service
        .delete_vote(&user.id, &song_id)
        .await?;

    Ok(ApiResponse::ok(DeleteVoteResponse {
        song_id,
        honking_version,
    }))
}

/// Performance votes response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceVotesResponse {
    pub performance_id: String,
    pub song_id: String,
    pub honking_vote_count: i32,
    pub updated_at: Option<String>,
}

/// Get the cached vote count of a performance.
async fn get_performance(
    State(state): State<AppState>,
    Path(performance_id): Path<String>,
) -> AppResult<ApiResponse<PerformanceVotesResponse>> {
    let perf = state
        .honking_vote_service
        .get_performance_votes(&performance_id)
        .await?;

    Ok(ApiResponse::ok(PerformanceVotesResponse {
        performance_id: perf.id,
        song_id: perf.song_id,
        honking_vote_count: perf.honking_vote_count,
        updated_at: perf.honking_votes_updated_at.map(|t| t.to_rfc3339()),
    }))
}

/// List user votes query.
#[derive(Debug, Deserialize, Validate)]
pub struct ListUserVotesQuery {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    50
}

/// User votes response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVotesResponse {
    pub user_id: String,
    pub honking_versions: Vec<VoteResponse>,
    pub total: usize,
}

/// List a user's honking votes.
async fn list_user_votes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListUserVotesQuery>,
) -> AppResult<ApiResponse<UserVotesResponse>> {
    query.validate()?;

    let votes = state
        .honking_vote_service
        .list_user_votes(&user_id, query.skip as u64, query.limit as u64)
        .await?;

    Ok(ApiResponse::ok(UserVotesResponse {
        user_id,
        total: votes.len(),
        honking_versions: votes.into_iter().map(VoteResponse::from).collect(),
    }))
}

/// Consistency check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyResponse {
    pub song_id: String,
    pub consistent: bool,
}

/// Check a song's cache against the vote ledger.
async fn check_consistency(
    State(state): State<AppState>,
    Path(song_id): Path<String>,
) -> AppResult<ApiResponse<ConsistencyResponse>> {
    let consistent = state
        .honking_vote_service
        .check_song_consistency(&song_id)
        .await?;

    Ok(ApiResponse::ok(ConsistencyResponse {
        song_id,
        consistent,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/song/{song_id}",
            get(get_song).post(set_vote).delete(delete_vote),
        )
        .route("/song/{song_id}/consistency", get(check_consistency))
        .route("/performance/{performance_id}", get(get_performance))
        .route("/user/{user_id}/songs", get(list_user_votes))
}
