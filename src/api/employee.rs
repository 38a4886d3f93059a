use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::directory::EmployeeDirectory;
use crate::model::employee::Employee;
use crate::store::Store;

#[derive(Deserialize, ToSchema)]
pub struct RegisterEmployee {
    #[schema(example = "DE284269")]
    pub card_uid: String,
    #[schema(example = "Maria Souza")]
    pub name: String,
}

/// Register Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = RegisterEmployee,
    responses(
        (status = 201, description = "Employee registered", body = Employee),
        (status = 400, description = "card_uid or name missing", body = Object, example = json!({
            "message": "card_uid and name must not be empty"
        })),
        (status = 409, description = "Card or name already registered", body = Object, example = json!({
            "message": "Card DE284269 is already registered"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee"
)]
pub async fn register_employee(
    store: web::Data<Store>,
    directory: web::Data<EmployeeDirectory>,
    payload: web::Json<RegisterEmployee>,
) -> actix_web::Result<impl Responder> {
    let employee: Employee = directory
        .register(store.get_ref(), &payload.card_uid, &payload.name)
        .await?;

    Ok(HttpResponse::Created().json(employee))
}
