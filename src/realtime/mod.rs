//! Push notifications for poll state changes.
//!
//! Handlers publish one [`PollEvent`] per committed mutation into the
//! process-wide [`EventHub`]. Each WebSocket connection owns a receiver and a
//! [`Subscription`] that decides which events it forwards. Delivery is
//! fire-and-forget: a client that is disconnected or lagging misses events and
//! catches up on its next `request:polls`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::poll::PollAggregate;

pub mod feed;
pub mod socket;

/// Every frame the server pushes, broadcast or direct reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PollEvent {
    #[serde(rename = "poll:created")]
    PollCreated(PollAggregate),
    #[serde(rename = "vote:updated")]
    VoteUpdated(VoteUpdated),
    #[serde(rename = "vote:removed")]
    VoteRemoved(VoteRemoved),
    #[serde(rename = "like:updated")]
    LikeUpdated(LikeUpdated),
    #[serde(rename = "poll:deleted")]
    PollDeleted(PollDeleted),
    #[serde(rename = "poll:data")]
    PollData(PollAggregate),
    #[serde(rename = "polls:list")]
    PollsList(Vec<PollAggregate>),
    #[serde(rename = "error")]
    Error(ErrorFrame),
}

impl PollEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PollCreated(_) => "poll:created",
            Self::VoteUpdated(_) => "vote:updated",
            Self::VoteRemoved(_) => "vote:removed",
            Self::LikeUpdated(_) => "like:updated",
            Self::PollDeleted(_) => "poll:deleted",
            Self::PollData(_) => "poll:data",
            Self::PollsList(_) => "polls:list",
            Self::Error(_) => "error",
        }
    }

    pub fn poll_id(&self) -> Option<Uuid> {
        match self {
            Self::PollCreated(poll) | Self::PollData(poll) => Some(poll.id),
            Self::VoteUpdated(update) => Some(update.poll_id),
            Self::VoteRemoved(removal) => Some(removal.poll_id),
            Self::LikeUpdated(update) => Some(update.poll_id),
            Self::PollDeleted(deletion) => Some(deletion.poll_id),
            Self::PollsList(_) | Self::Error(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteUpdated {
    pub poll_id: Uuid,
    pub user_id: String,
    pub option_id: String,
    pub previous_option_id: Option<String>,
    pub poll: PollAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRemoved {
    pub poll_id: Uuid,
    pub user_id: String,
    pub poll: PollAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeUpdated {
    pub poll_id: Uuid,
    pub user_id: String,
    pub liked: bool,
    pub poll: PollAggregate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDeleted {
    pub poll_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub message: String,
}

/// Commands a client may send over its socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "join:poll", rename_all = "camelCase")]
    JoinPoll { poll_id: Uuid },
    #[serde(rename = "leave:poll", rename_all = "camelCase")]
    LeavePoll { poll_id: Uuid },
    #[serde(rename = "request:polls")]
    RequestPolls,
}

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Arc<PollEvent>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Event channel capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, event: PollEvent) -> usize {
        let name = event.name();
        match self.sender.send(Arc::new(event)) {
            Ok(receivers) => {
                debug!(event = name, receivers, "Published poll event");
                receivers
            }
            Err(_) => {
                debug!(event = name, "No realtime subscribers connected");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PollEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Rooms a single connection has joined.
///
/// With no rooms the connection sees every event. Once it joins rooms it only
/// sees events for those polls, plus newly created polls.
#[derive(Debug, Default, Clone)]
pub struct Subscription {
    rooms: HashSet<Uuid>,
}

impl Subscription {
    pub fn join(&mut self, poll_id: Uuid) -> bool {
        self.rooms.insert(poll_id)
    }

    pub fn leave(&mut self, poll_id: Uuid) -> bool {
        self.rooms.remove(&poll_id)
    }

    pub fn is_unscoped(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn wants(&self, event: &PollEvent) -> bool {
        if self.is_unscoped() {
            return true;
        }
        match event {
            PollEvent::PollCreated(_) => true,
            other => other
                .poll_id()
                .is_some_and(|poll_id| self.rooms.contains(&poll_id)),
        }
    }
}
