use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{aggregate_poll, find_poll};
use crate::entities::like;
use crate::models::poll::{LikeToggleResponse, UserLikeResponse, VoterQuery, VoterRequest};
use crate::polls::{parse_poll_id, require_voter};
use crate::realtime::{LikeUpdated, PollEvent};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{poll_id}/like", post(toggle_like))
        .route("/{poll_id}/like/user", get(get_user_like))
}

/// Flips the voter's like. Repeating the request flips it back.
async fn toggle_like(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<VoterRequest>, JsonRejection>,
) -> Result<Json<LikeToggleResponse>, HttpError> {
    let Json(request) = payload?;
    let voter = require_voter(request.user_id.as_deref())?;
    let poll_id = parse_poll_id(&poll_id)?;
    let poll = find_poll(&state.database, poll_id, state.visibility).await?;

    let unliked = like::Entity::delete_many()
        .filter(like::Column::PollId.eq(poll_id))
        .filter(like::Column::VoterId.eq(voter.clone()))
        .exec(&state.database)
        .await?
        .rows_affected
        > 0;

    if !unliked {
        let now = Utc::now().fixed_offset();
        let row = like::ActiveModel {
            id: Set(Uuid::new_v4()),
            poll_id: Set(poll_id),
            voter_id: Set(voter.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        like::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([like::Column::PollId, like::Column::VoterId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&state.database)
            .await?;
    }
    let liked = !unliked;

    info!(%poll_id, voter = %voter, liked, "Like toggled");

    let aggregate = aggregate_poll(&state.database, poll).await?;
    let total_likes = aggregate.total_likes;
    state.events.publish(PollEvent::LikeUpdated(LikeUpdated {
        poll_id,
        user_id: voter,
        liked,
        poll: aggregate,
    }));

    Ok(Json(LikeToggleResponse {
        success: true,
        liked,
        total_likes,
    }))
}

async fn get_user_like(
    Path(poll_id): Path<String>,
    query: Result<Query<VoterQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<UserLikeResponse>, HttpError> {
    let Query(query) = query?;
    let voter = require_voter(query.user_id.as_deref())?;
    let poll_id = parse_poll_id(&poll_id)?;

    let existing = like::Entity::find()
        .filter(like::Column::PollId.eq(poll_id))
        .filter(like::Column::VoterId.eq(voter))
        .one(&state.database)
        .await?;

    Ok(Json(UserLikeResponse {
        success: true,
        liked: existing.is_some(),
    }))
}
