//! Read-side view of a poll.
//!
//! Counts are never stored. Every read fetches the poll row, the option ids of
//! its votes and the number of its likes as three independent queries and
//! tallies them here. A write that lands between those queries may or may not
//! be reflected; each count is still internally consistent.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entities::poll::{self, PollOption};
use crate::entities::prelude::*;
use crate::entities::{like, vote};
use crate::models::poll::{OptionTally, PollAggregate};
use crate::polls::PollError;

/// Whether soft-deleted polls resolve when addressed by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactivePolls {
    Include,
    Exclude,
}

impl InactivePolls {
    pub fn from_serve_inactive(serve_inactive: bool) -> Self {
        if serve_inactive {
            Self::Include
        } else {
            Self::Exclude
        }
    }
}

/// The single lookup every handler goes through.
pub async fn find_poll(
    database: &DatabaseConnection,
    poll_id: Uuid,
    visibility: InactivePolls,
) -> Result<poll::Model, PollError> {
    let poll = Poll::find_by_id(poll_id)
        .one(database)
        .await?
        .ok_or(PollError::PollNotFound)?;

    if visibility == InactivePolls::Exclude && !poll.is_active {
        return Err(PollError::PollNotFound);
    }
    Ok(poll)
}

pub async fn load_aggregate(
    database: &DatabaseConnection,
    poll_id: Uuid,
    visibility: InactivePolls,
) -> Result<PollAggregate, PollError> {
    let poll = find_poll(database, poll_id, visibility).await?;
    aggregate_poll(database, poll).await
}

pub async fn aggregate_poll(
    database: &DatabaseConnection,
    poll: poll::Model,
) -> Result<PollAggregate, PollError> {
    let chosen: Vec<String> = Vote::find()
        .select_only()
        .column(vote::Column::OptionId)
        .filter(vote::Column::PollId.eq(poll.id))
        .into_tuple()
        .all(database)
        .await?;

    let total_likes = Like::find()
        .filter(like::Column::PollId.eq(poll.id))
        .count(database)
        .await?;

    let (options, total_votes) = tally(&poll.options.0, &chosen);

    Ok(PollAggregate {
        id: poll.id,
        question: poll.question,
        created_by: poll.created_by,
        is_active: poll.is_active,
        created_at: poll.created_at,
        updated_at: poll.updated_at,
        total_votes,
        total_likes,
        options,
    })
}

/// Active polls, newest first.
pub async fn list_active(database: &DatabaseConnection) -> Result<Vec<PollAggregate>, PollError> {
    let polls = Poll::find()
        .filter(poll::Column::IsActive.eq(true))
        .order_by_desc(poll::Column::CreatedAt)
        .all(database)
        .await?;

    let mut aggregates = Vec::with_capacity(polls.len());
    for poll in polls {
        aggregates.push(aggregate_poll(database, poll).await?);
    }
    Ok(aggregates)
}

/// Counts `chosen` option ids against `options`.
///
/// Every option starts at zero so unvoted options still appear. Ids that match
/// no option are left out of the per-option counts but still count toward the
/// returned total, which is always `chosen.len()`.
pub fn tally(options: &[PollOption], chosen: &[String]) -> (Vec<OptionTally>, u64) {
    let mut counts: HashMap<&str, u64> = options
        .iter()
        .map(|option| (option.id.as_str(), 0))
        .collect();
    for option_id in chosen {
        if let Some(count) = counts.get_mut(option_id.as_str()) {
            *count += 1;
        }
    }

    let total = chosen.len() as u64;
    let tallies = options
        .iter()
        .map(|option| {
            let votes = counts.get(option.id.as_str()).copied().unwrap_or(0);
            OptionTally {
                id: option.id.clone(),
                text: option.text.clone(),
                order: option.order,
                votes,
                percentage: percentage(votes, total),
            }
        })
        .collect();

    (tallies, total)
}

/// `votes / total` as a percentage rounded to one decimal place; 0 when nobody voted.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = votes as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}
