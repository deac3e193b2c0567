//! Member profile handlers (behind the Access Gate)

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use circle_core::{Profile, ProfileUpdate};

use crate::auth::PaidMember;
use crate::error::ApiError;
use crate::state::AppState;

/// Saved profile, or an empty one before the first save
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(PaidMember(member)): Extension<PaidMember>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .profiles
        .get(&member.id)
        .await?
        .unwrap_or_else(|| Profile::empty(member.id));
    Ok(Json(profile))
}

pub async fn save_profile(
    State(state): State<AppState>,
    Extension(PaidMember(member)): Extension<PaidMember>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(update) = payload?;
    Ok(Json(state.profiles.save(&member.id, update).await?))
}
