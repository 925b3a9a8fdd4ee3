use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, IntoActiveModel};
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{aggregate_poll, find_poll, list_active, load_aggregate};
use crate::entities::poll;
use crate::models::poll::{CreatePollRequest, MessageResponse, PollListResponse, PollResponse};
use crate::polls::{parse_poll_id, validate_new_poll};
use crate::realtime::{PollDeleted, PollEvent};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_polls).post(create_poll))
        .route("/{poll_id}", get(get_poll).delete(delete_poll))
}

async fn list_polls(State(state): State<AppState>) -> Result<Json<PollListResponse>, HttpError> {
    let polls = list_active(&state.database).await?;
    Ok(Json(PollListResponse {
        success: true,
        count: polls.len(),
        polls,
    }))
}

async fn get_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PollResponse>, HttpError> {
    let poll_id = parse_poll_id(&poll_id)?;
    let poll = load_aggregate(&state.database, poll_id, state.visibility).await?;
    Ok(Json(PollResponse {
        success: true,
        poll,
    }))
}

async fn create_poll(
    State(state): State<AppState>,
    payload: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PollResponse>), HttpError> {
    let Json(request) = payload?;
    let new_poll = validate_new_poll(&request)?;

    let now = Utc::now().fixed_offset();
    let model = poll::ActiveModel {
        id: Set(Uuid::new_v4()),
        question: Set(new_poll.question),
        options: Set(new_poll.options),
        created_by: Set(new_poll.created_by),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.database)
    .await?;

    info!(poll_id = %model.id, options = model.options.0.len(), "Poll created");

    let aggregate = aggregate_poll(&state.database, model).await?;
    state.events.publish(PollEvent::PollCreated(aggregate.clone()));

    Ok((
        StatusCode::CREATED,
        Json(PollResponse {
            success: true,
            poll: aggregate,
        }),
    ))
}

/// Soft delete: the row, its votes and its likes are kept.
async fn delete_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, HttpError> {
    let poll_id = parse_poll_id(&poll_id)?;
    let existing = find_poll(&state.database, poll_id, state.visibility).await?;

    let mut active = existing.into_active_model();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&state.database).await?;

    info!(%poll_id, "Poll deactivated");
    state
        .events
        .publish(PollEvent::PollDeleted(PollDeleted { poll_id }));

    Ok(Json(MessageResponse {
        success: true,
        message: "Poll deleted successfully".to_string(),
    }))
}
