use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::aggregator::{Aggregator, Hms, Period, Totals, WorkedTime};
use crate::config::Config;
use crate::directory::EmployeeDirectory;
use crate::ledger::Ledger;
use crate::model::clock_event::ClockEvent;
use crate::model::employee::{Employee, EmployeeRef};
use crate::model::interval::Interval;
use crate::store::Store;

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "employee_id": 1,
    "employee_name": "Maria Souza",
    "clock_in": "2025-11-10T08:00:00-03:00",
    "clock_out": "2025-11-10T12:00:00-03:00",
    "worked_seconds": 14400
}))]
pub struct IntervalResponse {
    pub id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    /// Clock-in in the configured local offset
    #[schema(value_type = String, format = "date-time")]
    pub clock_in: DateTime<FixedOffset>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out: Option<DateTime<FixedOffset>>,
    pub worked_seconds: Option<i64>,
}

impl IntervalResponse {
    fn new(employee: &Employee, interval: &Interval, offset: FixedOffset) -> Self {
        Self {
            id: interval.id,
            employee_id: interval.employee_id,
            employee_name: employee.name.clone(),
            clock_in: interval.clock_in.with_timezone(&offset),
            clock_out: interval.clock_out.map(|end| end.with_timezone(&offset)),
            worked_seconds: interval.duration().map(|d| d.num_seconds()),
        }
    }
}

/// One period's total, rendered both as a breakdown and as flat values.
#[derive(Serialize, ToSchema)]
pub struct PeriodTotal {
    #[schema(example = 14400)]
    pub seconds: i64,
    #[schema(example = 4.0)]
    pub hours: f64,
    pub hms: Hms,
    #[schema(example = "04:00:00")]
    pub clock: String,
}

impl From<WorkedTime> for PeriodTotal {
    fn from(time: WorkedTime) -> Self {
        Self {
            seconds: time.seconds(),
            hours: time.hours(),
            hms: time.hms(),
            clock: time.clock(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PeriodTotals {
    pub day: PeriodTotal,
    pub week: PeriodTotal,
    pub month: PeriodTotal,
    pub total: PeriodTotal,
}

#[derive(Serialize, ToSchema)]
pub struct TotalsResponse {
    pub employee: Employee,
    pub periods: PeriodTotals,
}

impl From<Totals> for TotalsResponse {
    fn from(totals: Totals) -> Self {
        let periods = PeriodTotals {
            day: totals.get(Period::Day).into(),
            week: totals.get(Period::Week).into(),
            month: totals.get(Period::Month).into(),
            total: totals.get(Period::Total).into(),
        };
        Self {
            employee: totals.employee,
            periods,
        }
    }
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    request_body = ClockEvent,
    responses(
        (status = 201, description = "Clock-in recorded", body = IntervalResponse),
        (status = 404, description = "Card not registered", body = Object, example = json!({
            "message": "Employee not found: card DE284269"
        })),
        (status = 409, description = "Already clocked in", body = Object, example = json!({
            "message": "Already clocked in: an interval is still open"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    store: web::Data<Store>,
    directory: web::Data<EmployeeDirectory>,
    config: web::Data<Config>,
    payload: web::Json<ClockEvent>,
) -> actix_web::Result<impl Responder> {
    let ledger = Ledger::new(store.get_ref(), directory.get_ref());
    let (employee, interval) = ledger
        .open(&payload.card_uid, payload.supplied_instant())
        .await?;

    Ok(HttpResponse::Created().json(IntervalResponse::new(
        &employee,
        &interval,
        config.local_offset,
    )))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    request_body = ClockEvent,
    responses(
        (status = 200, description = "Clock-out recorded", body = IntervalResponse),
        (status = 400, description = "Clock-out earlier than clock-in", body = Object, example = json!({
            "message": "Clock-out 2025-11-10T10:00:00+00:00 is earlier than clock-in 2025-11-10T11:00:00+00:00, check the reader's clock"
        })),
        (status = 404, description = "Card not registered or nothing to close", body = Object, example = json!({
            "message": "Nothing to close: no open interval"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    store: web::Data<Store>,
    directory: web::Data<EmployeeDirectory>,
    config: web::Data<Config>,
    payload: web::Json<ClockEvent>,
) -> actix_web::Result<impl Responder> {
    let ledger = Ledger::new(store.get_ref(), directory.get_ref());
    let (employee, interval) = ledger
        .close(&payload.card_uid, payload.supplied_instant())
        .await?;

    Ok(HttpResponse::Ok().json(IntervalResponse::new(
        &employee,
        &interval,
        config.local_offset,
    )))
}

async fn totals_for(
    store: &Store,
    directory: &EmployeeDirectory,
    config: &Config,
    reference: EmployeeRef,
) -> actix_web::Result<HttpResponse> {
    let totals = Aggregator::new(store, directory, config.local_offset)
        .compute_totals(&reference, Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(TotalsResponse::from(totals)))
}

/// Worked-time totals by card
#[utoipa::path(
    get,
    path = "/api/attendance/totals/{card_uid}",
    params(
        ("card_uid", Path, description = "Badge identifier")
    ),
    responses(
        (status = 200, description = "Day, week, month and all-time totals", body = TotalsResponse),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn totals_by_card(
    store: web::Data<Store>,
    directory: web::Data<EmployeeDirectory>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let reference = EmployeeRef::Card(path.into_inner());
    totals_for(store.get_ref(), directory.get_ref(), config.get_ref(), reference).await
}

/// Worked-time totals by name
#[utoipa::path(
    get,
    path = "/api/attendance/totals/by-name/{name}",
    params(
        ("name", Path, description = "Employee display name")
    ),
    responses(
        (status = 200, description = "Day, week, month and all-time totals", body = TotalsResponse),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn totals_by_name(
    store: web::Data<Store>,
    directory: web::Data<EmployeeDirectory>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let reference = EmployeeRef::Name(path.into_inner());
    totals_for(store.get_ref(), directory.get_ref(), config.get_ref(), reference).await
}
