use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::{RecordStore, StoreError, StoreResult};
use crate::model::employee::Employee;
use crate::model::interval::Interval;

#[derive(Default)]
struct Tables {
    employees: Vec<Employee>,
    intervals: Vec<Interval>,
    next_employee_id: u64,
    next_interval_id: u64,
}

/// In-process store. Every write happens under one write lock, so the open-interval check and
/// the insert cannot interleave.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f(&tables)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tables)
    }

    /// Stores an interval as-is, bypassing the open-interval rule.
    #[cfg(test)]
    pub fn force_interval(
        &self,
        employee_id: u64,
        clock_in: DateTime<Utc>,
        clock_out: Option<DateTime<Utc>>,
    ) -> Interval {
        self.write(|t| {
            t.next_interval_id += 1;
            let interval = Interval {
                id: t.next_interval_id,
                employee_id,
                clock_in,
                clock_out,
            };
            t.intervals.push(interval.clone());
            interval
        })
    }

    #[cfg(test)]
    pub fn intervals_of(&self, employee_id: u64) -> Vec<Interval> {
        self.read(|t| {
            t.intervals
                .iter()
                .filter(|i| i.employee_id == employee_id)
                .cloned()
                .collect()
        })
    }
}

impl RecordStore for MemoryStore {
    async fn find_employee_by_card(&self, card_uid: &str) -> StoreResult<Option<Employee>> {
        Ok(self.read(|t| t.employees.iter().find(|e| e.card_uid == card_uid).cloned()))
    }

    async fn find_employee_by_name(&self, name: &str) -> StoreResult<Option<Employee>> {
        Ok(self.read(|t| t.employees.iter().find(|e| e.name == name).cloned()))
    }

    async fn insert_employee(&self, card_uid: &str, name: &str) -> StoreResult<Employee> {
        self.write(|t| {
            if t.employees.iter().any(|e| e.card_uid == card_uid) {
                return Err(StoreError::Duplicate {
                    field: "card_uid",
                    value: card_uid.to_string(),
                });
            }
            if t.employees.iter().any(|e| e.name == name) {
                return Err(StoreError::Duplicate {
                    field: "name",
                    value: name.to_string(),
                });
            }

            t.next_employee_id += 1;
            let employee = Employee {
                id: t.next_employee_id,
                card_uid: card_uid.to_string(),
                name: name.to_string(),
            };
            t.employees.push(employee.clone());
            Ok(employee)
        })
    }

    async fn find_open_interval(&self, employee_id: u64) -> StoreResult<Option<Interval>> {
        Ok(self.read(|t| {
            t.intervals
                .iter()
                .filter(|i| i.employee_id == employee_id && i.is_open())
                .max_by_key(|i| i.clock_in)
                .cloned()
        }))
    }

    async fn find_open_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
        Ok(self.read(|t| {
            t.intervals
                .iter()
                .filter(|i| i.employee_id == employee_id && i.is_open())
                .cloned()
                .collect()
        }))
    }

    async fn find_closed_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
        Ok(self.read(|t| {
            t.intervals
                .iter()
                .filter(|i| i.employee_id == employee_id && !i.is_open())
                .cloned()
                .collect()
        }))
    }

    async fn insert_interval(
        &self,
        employee_id: u64,
        start: DateTime<Utc>,
    ) -> StoreResult<Interval> {
        self.write(|t| {
            if t
                .intervals
                .iter()
                .any(|i| i.employee_id == employee_id && i.is_open())
            {
                return Err(StoreError::OpenIntervalExists(employee_id));
            }

            t.next_interval_id += 1;
            let interval = Interval {
                id: t.next_interval_id,
                employee_id,
                clock_in: start,
                clock_out: None,
            };
            t.intervals.push(interval.clone());
            Ok(interval)
        })
    }

    async fn update_interval_end(
        &self,
        interval_id: u64,
        end: DateTime<Utc>,
    ) -> StoreResult<Interval> {
        self.write(|t| {
            let interval = t
                .intervals
                .iter_mut()
                .find(|i| i.id == interval_id && i.is_open())
                .ok_or(StoreError::IntervalNotOpen(interval_id))?;
            interval.clock_out = Some(end);
            Ok(interval.clone())
        })
    }
}
