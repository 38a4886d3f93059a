use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sqlx::MySqlPool;
use tracing::debug;

use super::{RecordStore, StoreError, StoreResult};
use crate::model::employee::Employee;
use crate::model::interval::Interval;

const INTERVAL_COLUMNS: &str = "id, employee_id, clock_in, clock_out";

pub struct MySqlStore {
    pool: MySqlPool,
}

/// MySQL reports every unique-key violation as SQLSTATE 23000.
fn is_unique_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23000") {
            return Some(db_err.message().to_string());
        }
    }
    None
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Every registered employee, streamed.
    pub fn stream_employees(&self) -> BoxStream<'_, Result<Employee, sqlx::Error>> {
        sqlx::query_as::<_, Employee>("SELECT id, card_uid, name FROM employees").fetch(&self.pool)
    }

    /// Employees that clocked in within the last `days` days, most recent first.
    pub fn stream_recent_employees(
        &self,
        days: u32,
    ) -> BoxStream<'_, Result<Employee, sqlx::Error>> {
        sqlx::query_as::<_, Employee>(
            r#"
            SELECT e.id, e.card_uid, e.name
            FROM employees e
            JOIN intervals i ON i.employee_id = e.id
            WHERE i.clock_in >= UTC_TIMESTAMP() - INTERVAL ? DAY
            GROUP BY e.id, e.card_uid, e.name
            ORDER BY MAX(i.clock_in) DESC
            "#,
        )
        .bind(days)
        .fetch(&self.pool)
    }

    async fn fetch_interval(&self, interval_id: u64) -> StoreResult<Interval> {
        let sql = format!("SELECT {INTERVAL_COLUMNS} FROM intervals WHERE id = ?");
        let interval = sqlx::query_as::<_, Interval>(&sql)
            .bind(interval_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(interval)
    }

    async fn fetch_intervals(&self, employee_id: u64, open: bool) -> StoreResult<Vec<Interval>> {
        let condition = if open { "IS NULL" } else { "IS NOT NULL" };
        let sql = format!(
            "SELECT {INTERVAL_COLUMNS} FROM intervals \
             WHERE employee_id = ? AND clock_out {condition} ORDER BY clock_in DESC"
        );
        debug!(sql = %sql, employee_id, "Fetching intervals");

        let intervals = sqlx::query_as::<_, Interval>(&sql)
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(intervals)
    }
}

impl RecordStore for MySqlStore {
    async fn find_employee_by_card(&self, card_uid: &str) -> StoreResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(
            "SELECT id, card_uid, name FROM employees WHERE card_uid = ?",
        )
        .bind(card_uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn find_employee_by_name(&self, name: &str) -> StoreResult<Option<Employee>> {
        let employee =
            sqlx::query_as::<_, Employee>("SELECT id, card_uid, name FROM employees WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(employee)
    }

    async fn insert_employee(&self, card_uid: &str, name: &str) -> StoreResult<Employee> {
        let result = sqlx::query("INSERT INTO employees (card_uid, name) VALUES (?, ?)")
            .bind(card_uid)
            .bind(name)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(Employee {
                id: done.last_insert_id(),
                card_uid: card_uid.to_string(),
                name: name.to_string(),
            }),
            Err(e) => match is_unique_violation(&e) {
                Some(message) if message.contains("uq_employees_name") => {
                    Err(StoreError::Duplicate {
                        field: "name",
                        value: name.to_string(),
                    })
                }
                Some(_) => Err(StoreError::Duplicate {
                    field: "card_uid",
                    value: card_uid.to_string(),
                }),
                None => Err(e.into()),
            },
        }
    }

    async fn find_open_interval(&self, employee_id: u64) -> StoreResult<Option<Interval>> {
        let sql = format!(
            "SELECT {INTERVAL_COLUMNS} FROM intervals \
             WHERE employee_id = ? AND clock_out IS NULL ORDER BY clock_in DESC LIMIT 1"
        );
        let interval = sqlx::query_as::<_, Interval>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(interval)
    }

    async fn find_open_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
        self.fetch_intervals(employee_id, true).await
    }

    async fn find_closed_intervals(&self, employee_id: u64) -> StoreResult<Vec<Interval>> {
        self.fetch_intervals(employee_id, false).await
    }

    async fn insert_interval(
        &self,
        employee_id: u64,
        start: DateTime<Utc>,
    ) -> StoreResult<Interval> {
        // uq_intervals_open rejects a second row with clock_out IS NULL for the same employee
        let result = sqlx::query("INSERT INTO intervals (employee_id, clock_in) VALUES (?, ?)")
            .bind(employee_id)
            .bind(start)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(Interval {
                id: done.last_insert_id(),
                employee_id,
                clock_in: start,
                clock_out: None,
            }),
            Err(e) if is_unique_violation(&e).is_some() => {
                Err(StoreError::OpenIntervalExists(employee_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_interval_end(
        &self,
        interval_id: u64,
        end: DateTime<Utc>,
    ) -> StoreResult<Interval> {
        let result =
            sqlx::query("UPDATE intervals SET clock_out = ? WHERE id = ? AND clock_out IS NULL")
                .bind(end)
                .bind(interval_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::IntervalNotOpen(interval_id));
        }

        self.fetch_interval(interval_id).await
    }
}
