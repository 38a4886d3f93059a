//! Record store the attendance core reads and writes through.
//!
//! Implementations must make "check for an open interval, then insert one" a single atomic
//! step: `insert_interval` refuses a second open interval with
//! [`StoreError::OpenIntervalExists`] and `update_interval_end` only closes an interval that is
//! still open.

pub mod memory;
pub mod mysql;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::employee::Employee;
use crate::model::interval::Interval;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("employee {0} already has an open interval")]
    OpenIntervalExists(u64),

    #[error("interval {0} is not open")]
    IntervalNotOpen(u64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[allow(async_fn_in_trait)]
pub trait RecordStore {
    async fn find_employee_by_card(&self, card_uid: &str) -> StoreResult<Option<Employee>>;

    async fn find_employee_by_name(&self, name: &str) -> StoreResult<Option<Employee>>;

    async fn insert_employee(&self, card_uid: &str, name: &str) -> StoreResult<Employee>;

    /// Most recently started open interval, if any.
    async fn find_open_interval(&self, employee_id: u64) -> StoreResult<Option<Interval>>;

    async fn find_open_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>>;

    async fn find_closed_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>>;

    async fn insert_interval(&self, employee_id: u64, start: DateTime<Utc>)
    -> StoreResult<Interval>;

    async fn update_interval_end(&self, interval_id: u64, end: DateTime<Utc>)
    -> StoreResult<Interval>;
}

/// Backend picked at startup from `STORE_BACKEND`.
pub enum Store {
    MySql(MySqlStore),
    Memory(MemoryStore),
}

impl RecordStore for Store {
    async fn find_employee_by_card(&self, card_uid: &str) -> StoreResult<Option<Employee>> {
        match self {
            Store::MySql(s) => s.find_employee_by_card(card_uid).await,
            Store::Memory(s) => s.find_employee_by_card(card_uid).await,
        }
    }

    async fn find_employee_by_name(&self, name: &str) -> StoreResult<Option<Employee>> {
        match self {
            Store::MySql(s) => s.find_employee_by_name(name).await,
            Store::Memory(s) => s.find_employee_by_name(name).await,
        }
    }

    async fn insert_employee(&self, card_uid: &str, name: &str) -> StoreResult<Employee> {
        match self {
            Store::MySql(s) => s.insert_employee(card_uid, name).await,
            Store::Memory(s) => s.insert_employee(card_uid, name).await,
        }
    }

    async fn find_open_interval(&self, employee_id: u64) -> StoreResult<Option<Interval>> {
        match self {
            Store::MySql(s) => s.find_open_interval(employee_id).await,
            Store::Memory(s) => s.find_open_interval(employee_id).await,
        }
    }

    async fn find_open_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
        match self {
            Store::MySql(s) => s.find_open_intervals(employee_id).await,
            Store::Memory(s) => s.find_open_intervals(employee_id).await,
        }
    }

    async fn find_closed_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
        match self {
            Store::MySql(s) => s.find_closed_intervals(employee_id).await,
            Store::Memory(s) => s.find_closed_intervals(employee_id).await,
        }
    }

    async fn insert_interval(
        &self,
        employee_id: u64,
        start: DateTime<Utc>,
    ) -> StoreResult<Interval> {
        match self {
            Store::MySql(s) => s.insert_interval(employee_id, start).await,
            Store::Memory(s) => s.insert_interval(employee_id, start).await,
        }
    }

    async fn update_interval_end(
        &self,
        interval_id: u64,
        end: DateTime<Utc>,
    ) -> StoreResult<Interval> {
        match self {
            Store::MySql(s) => s.update_interval_end(interval_id, end).await,
            Store::Memory(s) => s.update_interval_end(interval_id, end).await,
        }
    }
}
