use std::time::Instant;

use sea_orm::DatabaseConnection;

use crate::aggregate::InactivePolls;
use crate::realtime::EventHub;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub events: EventHub,
    pub visibility: InactivePolls,
    /// Whether 5xx bodies include the underlying error text.
    pub expose_error_detail: bool,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(database: DatabaseConnection, events: EventHub, visibility: InactivePolls) -> Self {
        Self {
            database,
            events,
            visibility,
            expose_error_detail: false,
            start_time: Instant::now(),
        }
    }

    pub fn with_error_detail(mut self, enabled: bool) -> Self {
        self.expose_error_detail = enabled;
        self
    }
}
