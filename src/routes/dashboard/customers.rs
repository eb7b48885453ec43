use axum::{extract::State, response::IntoResponse};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::identity::{self, UserProfile},
    app_error::{AppError, StdResponse},
    app_state::AppState,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(utoipa_axum::routes!(get_customers))
}

/// Customer accounts as the identity service reports them. The storefront
/// stores none of this itself.
#[utoipa::path(
    get,
    path = "/customers",
    tags = ["Dashboard"],
    responses(
        (status = 200, description = "List customers", body = StdResponse<Vec<UserProfile>, String>),
        (status = 503, description = "Identity service unreachable")
    )
)]
async fn get_customers(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let customers = identity::get_customers(
        state.http_client.clone(),
        &state.config.identity_service_url,
    )
    .await?;

    Ok(StdResponse {
        data: Some(customers),
        message: Some("Get customers successfully"),
    })
}
