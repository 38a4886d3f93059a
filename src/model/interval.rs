use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One clock-in/clock-out pair. Instants are stored in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interval {
    pub id: u64,
    pub employee_id: u64,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Worked time of a closed interval; `None` while still open.
    pub fn duration(&self) -> Option<Duration> {
        self.clock_out.map(|end| end - self.clock_in)
    }
}
