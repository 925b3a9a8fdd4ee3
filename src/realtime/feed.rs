use uuid::Uuid;

use crate::models::poll::PollAggregate;

use super::PollEvent;

/// Local mirror of the active poll list, kept fresh from pushed events.
///
/// Entries are matched by poll id. Newer polls sit at the front, and inactive
/// aggregates never stay in the list.
#[derive(Debug, Clone, Default)]
pub struct PollFeed {
    polls: Vec<PollAggregate>,
}

impl PollFeed {
    pub fn new(polls: Vec<PollAggregate>) -> Self {
        let mut feed = Self::default();
        feed.replace_all(polls);
        feed
    }

    pub fn polls(&self) -> &[PollAggregate] {
        &self.polls
    }

    pub fn get(&self, poll_id: Uuid) -> Option<&PollAggregate> {
        self.polls.iter().find(|poll| poll.id == poll_id)
    }

    pub fn apply(&mut self, event: &PollEvent) {
        match event {
            PollEvent::PollCreated(poll) | PollEvent::PollData(poll) => self.upsert(poll),
            PollEvent::VoteUpdated(update) => self.upsert(&update.poll),
            PollEvent::VoteRemoved(removal) => self.upsert(&removal.poll),
            PollEvent::LikeUpdated(update) => self.upsert(&update.poll),
            PollEvent::PollDeleted(deletion) => self.remove(deletion.poll_id),
            PollEvent::PollsList(polls) => self.replace_all(polls.clone()),
            PollEvent::Error(_) => {}
        }
    }

    fn upsert(&mut self, poll: &PollAggregate) {
        if !poll.is_active {
            self.remove(poll.id);
            return;
        }
        match self.polls.iter_mut().find(|existing| existing.id == poll.id) {
            Some(existing) => *existing = poll.clone(),
            None => self.polls.insert(0, poll.clone()),
        }
    }

    fn remove(&mut self, poll_id: Uuid) {
        self.polls.retain(|poll| poll.id != poll_id);
    }

    fn replace_all(&mut self, polls: Vec<PollAggregate>) {
        self.polls = polls.into_iter().filter(|poll| poll.is_active).collect();
    }
}
