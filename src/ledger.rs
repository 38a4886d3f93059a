//! Clock-in / clock-out state machine.
//!
//! An employee holds zero or one open interval. Events may carry the instant the reader
//! recorded them (offline readers replay their buffer after reconnecting); otherwise server
//! time is used.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::directory::EmployeeDirectory;
use crate::error::{AttendanceError, Result};
use crate::model::employee::{Employee, EmployeeRef};
use crate::model::interval::Interval;
use crate::store::{RecordStore, StoreError};

pub struct Ledger<'a, S> {
    store: &'a S,
    directory: &'a EmployeeDirectory,
}

fn effective_instant(supplied: Option<DateTime<Utc>>) -> DateTime<Utc> {
    supplied.unwrap_or_else(Utc::now)
}

impl<'a, S: RecordStore> Ledger<'a, S> {
    pub fn new(store: &'a S, directory: &'a EmployeeDirectory) -> Self {
        Self { store, directory }
    }

    async fn employee(&self, card_uid: &str) -> Result<Employee> {
        self.directory
            .lookup(self.store, &EmployeeRef::Card(card_uid.to_string()))
            .await
    }

    /// Opens a new interval for the employee holding `card_uid`.
    #[instrument(name = "clock_in", skip(self))]
    pub async fn open(
        &self,
        card_uid: &str,
        supplied: Option<DateTime<Utc>>,
    ) -> Result<(Employee, Interval)> {
        let employee = self.employee(card_uid).await?;

        if self.store.find_open_interval(employee.id).await?.is_some() {
            return Err(AttendanceError::Conflict(
                "Already clocked in: an interval is still open".to_string(),
            ));
        }

        if let Some(at) = supplied {
            info!(employee_id = employee.id, %at, "Offline clock-in detected");
        }
        let start = effective_instant(supplied);

        let interval = match self.store.insert_interval(employee.id, start).await {
            Ok(interval) => interval,
            // lost a race against a concurrent clock-in
            Err(StoreError::OpenIntervalExists(_)) => {
                return Err(AttendanceError::Conflict(
                    "Already clocked in: an interval is still open".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        info!(employee_id = employee.id, interval_id = interval.id, "Clocked in");
        Ok((employee, interval))
    }

    /// Closes the employee's open interval.
    #[instrument(name = "clock_out", skip(self))]
    pub async fn close(
        &self,
        card_uid: &str,
        supplied: Option<DateTime<Utc>>,
    ) -> Result<(Employee, Interval)> {
        let employee = self.employee(card_uid).await?;

        // more than one open interval should never happen; take the latest if it does
        let open = self
            .store
            .find_open_intervals(employee.id)
            .await?
            .into_iter()
            .max_by_key(|i| i.clock_in)
            .ok_or_else(|| AttendanceError::NotFound("Nothing to close: no open interval".to_string()))?;

        if let Some(at) = supplied {
            info!(employee_id = employee.id, %at, "Offline clock-out detected");
        }
        let end = effective_instant(supplied);

        if end < open.clock_in {
            return Err(AttendanceError::InvalidRange(format!(
                "Clock-out {} is earlier than clock-in {}, check the reader's clock",
                end.to_rfc3339(),
                open.clock_in.to_rfc3339()
            )));
        }

        let interval = match self.store.update_interval_end(open.id, end).await {
            Ok(interval) => interval,
            Err(StoreError::IntervalNotOpen(_)) => {
                return Err(AttendanceError::NotFound(
                    "Nothing to close: interval was already closed".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        info!(employee_id = employee.id, interval_id = interval.id, "Clocked out");
        Ok((employee, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::clock_event::ClockEvent;
    use crate::store::{MemoryStore, StoreResult};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    /// Wraps a memory store and replays what a concurrent request would do between the
    /// ledger's check and its write.
    struct RacingStore {
        inner: MemoryStore,
    }

    impl RecordStore for RacingStore {
        async fn find_employee_by_card(&self, card_uid: &str) -> StoreResult<Option<Employee>> {
            self.inner.find_employee_by_card(card_uid).await
        }

        async fn find_employee_by_name(&self, name: &str) -> StoreResult<Option<Employee>> {
            self.inner.find_employee_by_name(name).await
        }

        async fn insert_employee(&self, card_uid: &str, name: &str) -> StoreResult<Employee> {
            self.inner.insert_employee(card_uid, name).await
        }

        // the other request has not committed yet when the ledger looks
        async fn find_open_interval(&self, _employee_id: u64) -> StoreResult<Option<Interval>> {
            Ok(None)
        }

        async fn find_open_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
            self.inner.find_open_intervals(employee_id).await
        }

        async fn find_closed_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
            self.inner.find_closed_intervals(employee_id).await
        }

        async fn insert_interval(
            &self,
            employee_id: u64,
            start: DateTime<Utc>,
        ) -> StoreResult<Interval> {
            self.inner.insert_interval(employee_id, start).await
        }

        // another clock-out lands first
        async fn update_interval_end(
            &self,
            interval_id: u64,
            end: DateTime<Utc>,
        ) -> StoreResult<Interval> {
            self.inner.update_interval_end(interval_id, end).await?;
            self.inner.update_interval_end(interval_id, end).await
        }
    }

    async fn setup() -> (MemoryStore, EmployeeDirectory, Employee) {
        let store = MemoryStore::new();
        let directory = EmployeeDirectory::new();
        let employee = directory
            .register(&store, "DE284269", "Maria Souza")
            .await
            .unwrap();
        (store, directory, employee)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, h, 0, 0).unwrap()
    }

    fn open_count(store: &MemoryStore, employee: &Employee) -> usize {
        store
            .intervals_of(employee.id)
            .iter()
            .filter(|i| i.is_open())
            .count()
    }

    #[actix_web::test]
    async fn open_then_close_with_supplied_instants() {
        let (store, directory, employee) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        let (_, opened) = ledger.open("DE284269", Some(at(11))).await.unwrap();
        assert_eq!(opened.clock_in, at(11));
        assert!(opened.is_open());

        let (_, closed) = ledger.close("DE284269", Some(at(15))).await.unwrap();
        assert_eq!(closed.id, opened.id);
        assert_eq!(closed.clock_out, Some(at(15)));
        assert_eq!(closed.duration(), Some(Duration::hours(4)));
        assert_eq!(open_count(&store, &employee), 0);
    }

    #[actix_web::test]
    async fn missing_instant_uses_server_time() {
        let (store, directory, _) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        let before = Utc::now();
        let (_, opened) = ledger.open("DE284269", None).await.unwrap();
        let after = Utc::now();

        assert!(opened.clock_in >= before && opened.clock_in <= after);
    }

    #[actix_web::test]
    async fn second_open_is_a_conflict_and_changes_nothing() {
        let (store, directory, employee) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        ledger.open("DE284269", Some(at(8))).await.unwrap();
        let err = ledger.open("DE284269", Some(at(9))).await.unwrap_err();

        assert!(matches!(err, AttendanceError::Conflict(_)));
        let intervals = store.intervals_of(employee.id);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].clock_in, at(8));
    }

    #[actix_web::test]
    async fn close_before_start_is_rejected_and_interval_stays_open() {
        let (store, directory, employee) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        ledger.open("DE284269", Some(at(12))).await.unwrap();
        let err = ledger.close("DE284269", Some(at(11))).await.unwrap_err();

        assert!(matches!(err, AttendanceError::InvalidRange(_)));
        assert_eq!(open_count(&store, &employee), 1);

        // a zero-length interval is allowed
        let (_, closed) = ledger.close("DE284269", Some(at(12))).await.unwrap();
        assert_eq!(closed.duration(), Some(Duration::zero()));
    }

    #[actix_web::test]
    async fn close_without_open_interval_is_not_found() {
        let (store, directory, employee) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        let err = ledger.close("DE284269", Some(at(12))).await.unwrap_err();

        assert!(matches!(err, AttendanceError::NotFound(_)));
        assert!(store.intervals_of(employee.id).is_empty());
    }

    #[actix_web::test]
    async fn unknown_card_is_not_found() {
        let (store, directory, _) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        assert!(matches!(
            ledger.open("FFFFFFFF", None).await.unwrap_err(),
            AttendanceError::NotFound(_)
        ));
        assert!(matches!(
            ledger.close("FFFFFFFF", None).await.unwrap_err(),
            AttendanceError::NotFound(_)
        ));
    }

    #[actix_web::test]
    async fn close_picks_latest_open_interval() {
        let (store, directory, employee) = setup().await;
        store.force_interval(employee.id, at(6), None);
        let latest = store.force_interval(employee.id, at(9), None);
        let ledger = Ledger::new(&store, &directory);

        let (_, closed) = ledger.close("DE284269", Some(at(10))).await.unwrap();

        assert_eq!(closed.id, latest.id);
        assert_eq!(open_count(&store, &employee), 1);
    }

    #[actix_web::test]
    async fn open_intervals_never_exceed_one() {
        let (store, directory, employee) = setup().await;
        let ledger = Ledger::new(&store, &directory);

        let events = [
            (true, 8),
            (true, 9),
            (false, 10),
            (false, 11),
            (true, 12),
            (false, 11),
            (false, 13),
            (true, 14),
        ];
        for (clock_in, hour) in events {
            let _ = if clock_in {
                ledger.open("DE284269", Some(at(hour))).await
            } else {
                ledger.close("DE284269", Some(at(hour))).await
            };
            assert!(open_count(&store, &employee) <= 1);
        }

        let intervals = store.intervals_of(employee.id);
        assert_eq!(intervals.len(), 3);
        assert!(intervals
            .iter()
            .filter_map(|i| i.duration())
            .all(|d| d >= Duration::zero()));
    }

    #[actix_web::test]
    async fn millisecond_timestamp_closes_at_server_time() {
        let (store, directory, _) = setup().await;
        let ledger = Ledger::new(&store, &directory);
        ledger.open("DE284269", Some(at(11))).await.unwrap();

        let event: ClockEvent =
            serde_json::from_value(json!({ "card_uid": "DE284269", "timestamp": 1701234567000_i64 }))
                .unwrap();
        let before = Utc::now();
        let (_, closed) = ledger
            .close(&event.card_uid, event.supplied_instant())
            .await
            .unwrap();
        let after = Utc::now();

        let end = closed.clock_out.unwrap();
        assert!(end >= before && end <= after);
    }

    #[actix_web::test]
    async fn lost_clock_in_race_is_a_conflict() {
        let store = RacingStore {
            inner: MemoryStore::new(),
        };
        let directory = EmployeeDirectory::new();
        let employee = directory
            .register(&store, "DE284269", "Maria Souza")
            .await
            .unwrap();
        store.inner.insert_interval(employee.id, at(8)).await.unwrap();
        let ledger = Ledger::new(&store, &directory);

        let err = ledger.open("DE284269", Some(at(9))).await.unwrap_err();

        assert!(matches!(err, AttendanceError::Conflict(_)));
        assert_eq!(store.inner.intervals_of(employee.id).len(), 1);
    }

    #[actix_web::test]
    async fn lost_clock_out_race_is_not_found() {
        let store = RacingStore {
            inner: MemoryStore::new(),
        };
        let directory = EmployeeDirectory::new();
        let employee = directory
            .register(&store, "DE284269", "Maria Souza")
            .await
            .unwrap();
        store.inner.insert_interval(employee.id, at(8)).await.unwrap();
        let ledger = Ledger::new(&store, &directory);

        let err = ledger.close("DE284269", Some(at(12))).await.unwrap_err();

        assert!(matches!(err, AttendanceError::NotFound(_)));
        let intervals = store.inner.intervals_of(employee.id);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].clock_out, Some(at(12)));
    }
}
