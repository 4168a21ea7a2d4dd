use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

/// Source of the current local time for date stamps and time variables.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// A clock frozen at `at`.
pub fn fixed_clock(at: NaiveDateTime) -> Clock {
    Arc::new(move || at)
}
