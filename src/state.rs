use crate::clock::{Clock, SystemClock};
use crate::storage::Store;
use chrono::{DateTime, Utc, Weekday};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub clock: Arc<dyn Clock>,
    pub week_start: Weekday,
}

impl AppState {
    pub fn new(store: Store, week_start: Weekday) -> Self {
        Self::with_clock(store, week_start, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, week_start: Weekday, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(store),
            clock,
            week_start,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
