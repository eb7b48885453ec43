use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::identity::{self, UserProfile},
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
    session::SessionHandle,
};

pub mod catalog;
pub mod customers;
pub mod orders;

/// Staff area. Only the login route is open; everything else sits behind
/// the staff gate, on the dashboard's own cookie.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/dashboard",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(login))
            .merge(
                OpenApiRouter::new()
                    .merge(catalog::routes_with_openapi())
                    .merge(orders::routes_with_openapi())
                    .merge(customers::routes_with_openapi())
                    .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
            ),
    )
}

#[derive(Deserialize, ToSchema)]
struct DashboardLoginReq {
    username: String,
    password: String,
}

/// Staff sign-in. Valid customer credentials are refused here, so a shopper
/// account can never reach the dashboard by logging in on this route.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Dashboard"],
    request_body = DashboardLoginReq,
    responses(
        (status = 200, description = "Logged in", body = StdResponse<UserProfile, String>),
        (status = 400, description = "Credentials rejected"),
        (status = 403, description = "Not a staff account")
    )
)]
async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(body): Json<DashboardLoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let profile = identity::verify_credentials(
        state.http_client.clone(),
        &state.config.identity_service_url,
        body.username.trim(),
        &body.password,
    )
    .await?;

    let Some(profile) = profile else {
        return Err(AppError::BadRequest(
            "Tên đăng nhập hoặc mật khẩu không đúng.".to_string(),
        ));
    };
    if !profile.is_staff() {
        return Err(AppError::ForbiddenResource(
            "Staff access required".to_string(),
        ));
    }

    session.login(profile.id, &profile.role);

    tracing::info!("Staff user #{} signed in to the dashboard", profile.id);
    Ok(StdResponse {
        data: Some(profile),
        message: Some("Login successfully"),
    })
}
