//! Employee registration and lookup.
//!
//! Registered card uids and names are kept in a cuckoo filter for fast "definitely free"
//! answers, and resolved employees are cached. Employees are immutable and never deleted, so
//! neither structure can go stale; they only ever miss.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use autoscale_cuckoo_filter::CuckooFilter;
use futures::{Stream, StreamExt};
use moka::future::Cache;
use tracing::{debug, info};

use crate::error::{AttendanceError, Result};
use crate::model::employee::{Employee, EmployeeRef};
use crate::store::{RecordStore, StoreError};

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

const CACHE_CAPACITY: u64 = 50_000;
const CACHE_TTL: Duration = Duration::from_secs(86400);

pub struct EmployeeDirectory {
    known: RwLock<CuckooFilter<String>>,
    cache: Cache<EmployeeRef, Employee>,
}

impl Default for EmployeeDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeDirectory {
    pub fn new() -> Self {
        Self {
            known: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// false => the reference is certainly unused; true => it may be taken
    fn might_exist(&self, reference: &EmployeeRef) -> bool {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&reference.to_string())
    }

    fn mark_known(&self, employees: &[Employee]) {
        let mut filter = self.known.write().unwrap_or_else(PoisonError::into_inner);
        for employee in employees {
            filter.add(&EmployeeRef::Card(employee.card_uid.clone()).to_string());
            filter.add(&EmployeeRef::Name(employee.name.clone()).to_string());
        }
    }

    async fn cache_employee(&self, employee: &Employee) {
        self.cache
            .insert(EmployeeRef::Card(employee.card_uid.clone()), employee.clone())
            .await;
        self.cache
            .insert(EmployeeRef::Name(employee.name.clone()), employee.clone())
            .await;
    }

    /// Resolves a card uid or name to its employee.
    pub async fn lookup<S: RecordStore>(
        &self,
        store: &S,
        reference: &EmployeeRef,
    ) -> Result<Employee> {
        if let Some(employee) = self.cache.get(reference).await {
            return Ok(employee);
        }

        let found = match reference {
            EmployeeRef::Card(card_uid) => store.find_employee_by_card(card_uid).await?,
            EmployeeRef::Name(name) => store.find_employee_by_name(name).await?,
        };

        match found {
            Some(employee) => {
                self.cache_employee(&employee).await;
                Ok(employee)
            }
            None => Err(AttendanceError::NotFound(format!(
                "Employee not found: {reference}"
            ))),
        }
    }

    async fn is_available<S: RecordStore>(&self, store: &S, reference: &EmployeeRef) -> Result<bool> {
        // 1️⃣ Cuckoo filter — fast negative
        if !self.might_exist(reference) {
            return Ok(true);
        }

        // 2️⃣ Cache — fast positive
        if self.cache.contains_key(reference) {
            return Ok(false);
        }

        // 3️⃣ Store fallback
        match self.lookup(store, reference).await {
            Ok(_) => Ok(false),
            Err(AttendanceError::NotFound(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Registers a new employee under a unique card uid and name.
    pub async fn register<S: RecordStore>(
        &self,
        store: &S,
        card_uid: &str,
        name: &str,
    ) -> Result<Employee> {
        let card_uid = card_uid.trim();
        let name = name.trim();

        if card_uid.is_empty() || name.is_empty() {
            return Err(AttendanceError::Validation(
                "card_uid and name must not be empty".to_string(),
            ));
        }

        if !self.is_available(store, &EmployeeRef::Card(card_uid.to_string())).await? {
            return Err(AttendanceError::Conflict(format!(
                "Card {card_uid} is already registered"
            )));
        }
        if !self.is_available(store, &EmployeeRef::Name(name.to_string())).await? {
            return Err(AttendanceError::Conflict(format!("Name '{name}' is already in use")));
        }

        // the store's unique keys still settle concurrent registrations
        let employee = match store.insert_employee(card_uid, name).await {
            Ok(employee) => employee,
            Err(StoreError::Duplicate { field, value }) => {
                return Err(AttendanceError::Conflict(format!(
                    "{field} {value} is already registered"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        self.mark_known(std::slice::from_ref(&employee));
        self.cache_employee(&employee).await;
        info!(employee_id = employee.id, card_uid, "Employee registered");

        Ok(employee)
    }

    /// Loads every registered employee into the filter, in batches.
    pub async fn warmup_filter<St>(&self, mut stream: St, batch_size: usize) -> anyhow::Result<()>
    where
        St: Stream<Item = std::result::Result<Employee, sqlx::Error>> + Unpin,
    {
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let employee = row.context("DB row fetch failed")?;
            batch.push(employee);
            total += 1;

            if batch.len() >= batch_size {
                self.mark_known(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.mark_known(&batch);
        }

        info!("Employee filter warmup complete: {} employees", total);
        Ok(())
    }

    /// Caches employees that clocked in recently, in batches.
    pub async fn warmup_cache<St>(&self, mut stream: St, batch_size: usize) -> anyhow::Result<()>
    where
        St: Stream<Item = std::result::Result<Employee, sqlx::Error>> + Unpin,
    {
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            batch.push(row.context("DB row fetch failed")?);
            total += 1;

            if batch.len() >= batch_size {
                self.cache_batch(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.cache_batch(&batch).await;
        }

        info!("Employee cache warmup complete: {} recent employees", total);
        Ok(())
    }

    async fn cache_batch(&self, employees: &[Employee]) {
        let futures: Vec<_> = employees.iter().map(|e| self.cache_employee(e)).collect();
        futures::future::join_all(futures).await;
        debug!(count = employees.len(), "Cached employee batch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use futures::stream;

    #[actix_web::test]
    async fn register_then_lookup_by_card_and_name() {
        let store = MemoryStore::new();
        let directory = EmployeeDirectory::new();

        let employee = directory
            .register(&store, " DE284269 ", " Maria Souza ")
            .await
            .unwrap();
        assert_eq!(employee.card_uid, "DE284269");
        assert_eq!(employee.name, "Maria Souza");

        let by_card = directory
            .lookup(&store, &EmployeeRef::Card("DE284269".into()))
            .await
            .unwrap();
        let by_name = directory
            .lookup(&store, &EmployeeRef::Name("Maria Souza".into()))
            .await
            .unwrap();
        assert_eq!(by_card, employee);
        assert_eq!(by_name, employee);
    }

    #[actix_web::test]
    async fn duplicate_card_or_name_is_a_conflict() {
        let store = MemoryStore::new();
        let directory = EmployeeDirectory::new();
        directory.register(&store, "DE284269", "Maria").await.unwrap();

        let err = directory.register(&store, "DE284269", "Ana").await.unwrap_err();
        assert!(matches!(err, AttendanceError::Conflict(_)));

        let err = directory.register(&store, "AB000001", "Maria").await.unwrap_err();
        assert!(matches!(err, AttendanceError::Conflict(_)));
    }

    #[actix_web::test]
    async fn store_duplicates_are_caught_even_when_filter_is_cold() {
        let store = MemoryStore::new();
        store.insert_employee("DE284269", "Maria").await.unwrap();

        // fresh directory: filter says "free", the store disagrees
        let directory = EmployeeDirectory::new();
        let err = directory.register(&store, "DE284269", "Ana").await.unwrap_err();
        assert!(matches!(err, AttendanceError::Conflict(_)));
    }

    #[actix_web::test]
    async fn blank_fields_are_rejected() {
        let store = MemoryStore::new();
        let directory = EmployeeDirectory::new();

        let err = directory.register(&store, "  ", "Maria").await.unwrap_err();
        assert!(matches!(err, AttendanceError::Validation(_)));
        let err = directory.register(&store, "DE284269", "").await.unwrap_err();
        assert!(matches!(err, AttendanceError::Validation(_)));
    }

    #[actix_web::test]
    async fn unknown_employee_is_not_found() {
        let store = MemoryStore::new();
        let directory = EmployeeDirectory::new();

        let err = directory
            .lookup(&store, &EmployeeRef::Card("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn warmup_marks_employees_known() {
        let directory = EmployeeDirectory::new();
        let employee = Employee {
            id: 9,
            card_uid: "CAFE0001".into(),
            name: "Joana".into(),
        };
        let rows = stream::iter(vec![Ok(employee.clone())]);

        directory.warmup_filter(rows, 10).await.unwrap();
        assert!(directory.might_exist(&EmployeeRef::Card("CAFE0001".into())));
        assert!(directory.might_exist(&EmployeeRef::Name("Joana".into())));

        directory
            .warmup_cache(stream::iter(vec![Ok(employee.clone())]), 10)
            .await
            .unwrap();
        // cached entries resolve without touching the (empty) store
        let store = MemoryStore::new();
        let found = directory
            .lookup(&store, &EmployeeRef::Name("Joana".into()))
            .await
            .unwrap();
        assert_eq!(found, employee);
    }

    #[actix_web::test]
    async fn warmups_report_row_failures_alike() {
        let directory = EmployeeDirectory::new();

        let filter_err = directory
            .warmup_filter(stream::iter(vec![Err(sqlx::Error::RowNotFound)]), 10)
            .await
            .unwrap_err();
        let cache_err = directory
            .warmup_cache(stream::iter(vec![Err(sqlx::Error::RowNotFound)]), 10)
            .await
            .unwrap_err();

        assert_eq!(filter_err.to_string(), "DB row fetch failed");
        assert_eq!(cache_err.to_string(), filter_err.to_string());
        assert!(cache_err.downcast_ref::<sqlx::Error>().is_some());
    }
}
