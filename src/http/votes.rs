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
use crate::entities::vote;
use crate::models::poll::{
    PollMutationResponse, UserVoteResponse, VoteRequest, VoterQuery, VoterRequest,
};
use crate::polls::{PollError, parse_poll_id, require_option_id, require_voter};
use crate::realtime::{PollEvent, VoteRemoved, VoteUpdated};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{poll_id}/vote", post(submit_vote).delete(remove_vote))
        .route("/{poll_id}/vote/user", get(get_user_vote))
}

/// Records the voter's choice, replacing any earlier one.
async fn submit_vote(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<PollMutationResponse>, HttpError> {
    let Json(request) = payload?;
    let voter = require_voter(request.user_id.as_deref())?;
    let option_id = require_option_id(request.option_id.as_deref())?;
    let poll_id = parse_poll_id(&poll_id)?;

    let poll = find_poll(&state.database, poll_id, state.visibility).await?;
    if !poll.options.contains(&option_id) {
        return Err(PollError::InvalidOption.into());
    }

    let previous_option_id = vote::Entity::find()
        .filter(vote::Column::PollId.eq(poll_id))
        .filter(vote::Column::VoterId.eq(voter.clone()))
        .one(&state.database)
        .await?
        .map(|existing| existing.option_id);

    // Keyed on (poll_id, voter_id): a concurrent first vote from the same
    // voter turns into an update instead of a uniqueness failure.
    let now = Utc::now().fixed_offset();
    let row = vote::ActiveModel {
        id: Set(Uuid::new_v4()),
        poll_id: Set(poll_id),
        voter_id: Set(voter.clone()),
        option_id: Set(option_id.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    vote::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([vote::Column::PollId, vote::Column::VoterId])
                .update_columns([vote::Column::OptionId, vote::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(&state.database)
        .await?;

    info!(%poll_id, voter = %voter, option = %option_id, "Vote recorded");

    let aggregate = aggregate_poll(&state.database, poll).await?;
    let message = if previous_option_id.is_some() {
        "Vote updated"
    } else {
        "Vote submitted"
    };

    state.events.publish(PollEvent::VoteUpdated(VoteUpdated {
        poll_id,
        user_id: voter,
        option_id,
        previous_option_id,
        poll: aggregate.clone(),
    }));

    Ok(Json(PollMutationResponse {
        success: true,
        message: message.to_string(),
        poll: aggregate,
    }))
}

async fn remove_vote(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<VoterRequest>, JsonRejection>,
) -> Result<Json<PollMutationResponse>, HttpError> {
    let Json(request) = payload?;
    let voter = require_voter(request.user_id.as_deref())?;
    let poll_id = parse_poll_id(&poll_id)?;
    let poll = find_poll(&state.database, poll_id, state.visibility).await?;

    let removed = vote::Entity::delete_many()
        .filter(vote::Column::PollId.eq(poll_id))
        .filter(vote::Column::VoterId.eq(voter.clone()))
        .exec(&state.database)
        .await?
        .rows_affected;

    let aggregate = aggregate_poll(&state.database, poll).await?;
    if removed > 0 {
        info!(%poll_id, voter = %voter, "Vote removed");
        state.events.publish(PollEvent::VoteRemoved(VoteRemoved {
            poll_id,
            user_id: voter,
            poll: aggregate.clone(),
        }));
    }

    let message = if removed > 0 {
        "Vote removed"
    } else {
        "No vote to remove"
    };
    Ok(Json(PollMutationResponse {
        success: true,
        message: message.to_string(),
        poll: aggregate,
    }))
}

async fn get_user_vote(
    Path(poll_id): Path<String>,
    query: Result<Query<VoterQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<UserVoteResponse>, HttpError> {
    let Query(query) = query?;
    let voter = require_voter(query.user_id.as_deref())?;
    let poll_id = parse_poll_id(&poll_id)?;

    let existing = vote::Entity::find()
        .filter(vote::Column::PollId.eq(poll_id))
        .filter(vote::Column::VoterId.eq(voter))
        .one(&state.database)
        .await?;

    Ok(Json(UserVoteResponse {
        success: true,
        voted: existing.is_some(),
        option_id: existing.map(|vote| vote.option_id),
    }))
}
