//! Milestone feed handlers (behind the Access Gate)

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use circle_core::{FeedEntry, FeedQuery, NewVisaUpdate, ReactionCounts, ReactionKind, VisaUpdate};

use crate::auth::PaidMember;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub reaction: ReactionKind,
}

pub async fn list_updates(
    State(state): State<AppState>,
    Extension(PaidMember(member)): Extension<PaidMember>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedEntry>>, ApiError> {
    Ok(Json(state.feed.list(&member.id, &query).await?))
}

pub async fn create_update(
    State(state): State<AppState>,
    Extension(PaidMember(member)): Extension<PaidMember>,
    payload: Result<Json<NewVisaUpdate>, JsonRejection>,
) -> Result<(StatusCode, Json<VisaUpdate>), ApiError> {
    let Json(payload) = payload?;
    let update = state.feed.create(&member.id, payload).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

pub async fn react(
    State(state): State<AppState>,
    Extension(PaidMember(member)): Extension<PaidMember>,
    Path(update_id): Path<Uuid>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> Result<Json<ReactionCounts>, ApiError> {
    let Json(payload) = payload?;
    let counts = state
        .feed
        .react(update_id, &member.id, payload.reaction)
        .await?;
    Ok(Json(counts))
}
