use crate::aggregator::Hms;
use crate::api::attendance::{IntervalResponse, PeriodTotal, PeriodTotals, TotalsResponse};
use crate::api::employee::RegisterEmployee;
use crate::model::clock_event::ClockEvent;
use crate::model::employee::Employee;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Time Clock API",
        version = "1.0.0",
        description = r#"
## Badge Time Clock

Backend for NFC badge readers that record when employees start and stop working.

### 🔹 Key Features
- **Employee Registration**
  - Register a badge (`card_uid`) under a unique display name
- **Clock-in / Clock-out**
  - At most one open interval per employee
  - Readers that were offline may send the original `timestamp` (Unix seconds); a missing or
    unreadable timestamp means server time
- **Worked-time Totals**
  - Current day, week (Monday first), month and all-time totals in local time

### 📦 Response Format
- JSON responses; instants are RFC 3339 in the configured local offset
- Totals are given in seconds, fractional hours, `{hours, minutes, seconds}` and `HH:MM:SS`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::employee::register_employee,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::totals_by_card,
        crate::api::attendance::totals_by_name
    ),
    components(
        schemas(
            RegisterEmployee,
            Employee,
            ClockEvent,
            IntervalResponse,
            Hms,
            PeriodTotal,
            PeriodTotals,
            TotalsResponse
        )
    ),
    tags(
        (name = "Employee", description = "Employee registration APIs"),
        (name = "Attendance", description = "Clock-in, clock-out and totals APIs"),
    )
)]
pub struct ApiDoc;
