use anyhow::Context;
use sqlx::MySqlPool;
use tracing::info;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
        card_uid VARCHAR(100) NOT NULL,
        name VARCHAR(100) NOT NULL,
        UNIQUE KEY uq_employees_card_uid (card_uid),
        UNIQUE KEY uq_employees_name (name)
    )
    "#,
    // open_marker is 1 while the interval is open and NULL once closed; the unique key allows
    // any number of NULLs, so each employee can hold at most one open interval
    r#"
    CREATE TABLE IF NOT EXISTS intervals (
        id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
        employee_id BIGINT UNSIGNED NOT NULL,
        clock_in DATETIME(6) NOT NULL,
        clock_out DATETIME(6) NULL,
        open_marker TINYINT AS (IF(clock_out IS NULL, 1, NULL)) STORED,
        UNIQUE KEY uq_intervals_open (employee_id, open_marker),
        KEY ix_intervals_employee_clock_in (employee_id, clock_in),
        CONSTRAINT fk_intervals_employee FOREIGN KEY (employee_id) REFERENCES employees (id)
    )
    "#,
];

pub async fn init_db(database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .context("Failed to create schema")?;
    }
    info!("Database schema ready");

    Ok(pool)
}
