use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollAggregate {
    pub id: Uuid,
    pub question: String,
    pub created_by: String,
    pub is_active: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub total_votes: u64,
    pub total_likes: u64,
    pub options: Vec<OptionTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTally {
    pub id: String,
    pub text: String,
    pub order: u32,
    pub votes: u64,
    pub percentage: f64,
}

// Request bodies. Every field is optional so that missing input is reported
// with the API's own envelope rather than a deserializer rejection.

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoteRequest {
    pub user_id: Option<String>,
    pub option_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoterRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoterQuery {
    pub user_id: Option<String>,
}

// Response envelopes

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollListResponse {
    pub success: bool,
    pub count: usize,
    pub polls: Vec<PollAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub success: bool,
    pub poll: PollAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollMutationResponse {
    pub success: bool,
    pub message: String,
    pub poll: PollAggregate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoteResponse {
    pub success: bool,
    pub voted: bool,
    pub option_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggleResponse {
    pub success: bool,
    pub liked: bool,
    pub total_likes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLikeResponse {
    pub success: bool,
    pub liked: bool,
}
