use sea_orm::DbErr;
use uuid::Uuid;

use crate::entities::poll::{PollOption, PollOptions};
use crate::models::poll::CreatePollRequest;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;
pub const MAX_QUESTION_LEN: usize = 500;
pub const MAX_OPTION_TEXT_LEN: usize = 200;
pub const MAX_CREATOR_LEN: usize = 64;
pub const MAX_VOTER_ID_LEN: usize = 128;

pub const DEFAULT_CREATOR: &str = "Anonymous";

const _: [(); 16 - MAX_OPTIONS] = [(); 16 - MAX_OPTIONS];

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidPoll(String),
    #[error("Invalid option")]
    InvalidOption,
    #[error("Poll not found")]
    PollNotFound,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// A validated poll ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub question: String,
    pub options: PollOptions,
    pub created_by: String,
}

pub fn validate_new_poll(request: &CreatePollRequest) -> Result<NewPoll, PollError> {
    let question = request
        .question
        .as_deref()
        .ok_or(PollError::MissingField("question"))?;
    let question = canonicalize_question(question)?;
    let texts = request
        .options
        .as_deref()
        .ok_or(PollError::MissingField("options"))?;
    let options = build_options(texts)?;
    let created_by = canonicalize_creator(request.created_by.as_deref())?;

    Ok(NewPoll {
        question,
        options,
        created_by,
    })
}

pub fn canonicalize_question(value: &str) -> Result<String, PollError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PollError::MissingField("question"));
    }
    if trimmed.chars().count() > MAX_QUESTION_LEN {
        return Err(PollError::InvalidPoll(format!(
            "Question exceeds {MAX_QUESTION_LEN} character limit"
        )));
    }
    Ok(trimmed.to_string())
}

/// Assigns every option a fresh identifier and its position as display order.
pub fn build_options(texts: &[String]) -> Result<PollOptions, PollError> {
    if texts.len() < MIN_OPTIONS {
        return Err(PollError::InvalidPoll(format!(
            "Question and at least {MIN_OPTIONS} options are required"
        )));
    }
    if texts.len() > MAX_OPTIONS {
        return Err(PollError::InvalidPoll(format!(
            "Maximum {MAX_OPTIONS} options allowed"
        )));
    }

    let mut options = Vec::with_capacity(texts.len());
    for (index, text) in texts.iter().enumerate() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PollError::InvalidPoll(format!(
                "Option {} must not be empty",
                index + 1
            )));
        }
        if trimmed.chars().count() > MAX_OPTION_TEXT_LEN {
            return Err(PollError::InvalidPoll(format!(
                "Option {} exceeds {MAX_OPTION_TEXT_LEN} character limit",
                index + 1
            )));
        }
        options.push(PollOption {
            id: Uuid::new_v4().to_string(),
            text: trimmed.to_string(),
            order: index as u32,
        });
    }

    assert!(
        options.len() >= MIN_OPTIONS && options.len() <= MAX_OPTIONS,
        "Option count escaped validation"
    );
    Ok(PollOptions(options))
}

pub fn canonicalize_creator(value: Option<&str>) -> Result<String, PollError> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(DEFAULT_CREATOR.to_string());
    }
    if trimmed.chars().count() > MAX_CREATOR_LEN {
        return Err(PollError::InvalidPoll(format!(
            "createdBy exceeds {MAX_CREATOR_LEN} character limit"
        )));
    }
    Ok(trimmed.to_string())
}

/// Voter ids are opaque: stored and echoed exactly as the client sent them.
pub fn require_voter(value: Option<&str>) -> Result<String, PollError> {
    let voter = value.unwrap_or_default();
    if voter.is_empty() {
        return Err(PollError::MissingField("userId"));
    }
    if voter.chars().count() > MAX_VOTER_ID_LEN {
        return Err(PollError::InvalidPoll(format!(
            "userId exceeds {MAX_VOTER_ID_LEN} character limit"
        )));
    }
    Ok(voter.to_string())
}

pub fn require_option_id(value: Option<&str>) -> Result<String, PollError> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(PollError::MissingField("optionId"));
    }
    Ok(trimmed.to_string())
}

/// Identifiers that are not UUIDs cannot name a stored poll.
pub fn parse_poll_id(value: &str) -> Result<Uuid, PollError> {
    Uuid::parse_str(value.trim()).map_err(|_| PollError::PollNotFound)
}
