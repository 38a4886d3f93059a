use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "card_uid": "DE284269",
        "name": "Maria Souza"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    /// Badge identifier read by the NFC clock
    #[schema(example = "DE284269")]
    pub card_uid: String,

    #[schema(example = "Maria Souza")]
    pub name: String,
}

/// The two ways a caller can point at an employee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum EmployeeRef {
    #[display(fmt = "card {}", _0)]
    Card(String),
    #[display(fmt = "name {}", _0)]
    Name(String),
}

impl EmployeeRef {
    pub fn matches(&self, employee: &Employee) -> bool {
        match self {
            EmployeeRef::Card(card_uid) => &employee.card_uid == card_uid,
            EmployeeRef::Name(name) => &employee.name == name,
        }
    }
}
