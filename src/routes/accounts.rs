use anyhow::Context;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::identity::{self, CreateUserReq, UserProfile},
    app_error::{AppError, StdResponse},
    app_state::AppState,
    cart,
    middleware,
    session::SessionHandle,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/accounts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(login))
            .routes(utoipa_axum::routes!(register))
            .routes(utoipa_axum::routes!(logout))
            .merge(
                OpenApiRouter::new()
                    .routes(utoipa_axum::routes!(get_me))
                    .route_layer(axum::middleware::from_fn(
                        middleware::customer_authorization,
                    )),
            ),
    )
}

/// Strips a phone-shaped identifier down to digits and `+`. Identifiers with
/// an `@` are emails and are never rewritten; the result is `None` when
/// normalizing would not change anything.
fn normalize_identifier(identifier: &str) -> Option<String> {
    if identifier.contains('@') {
        return None;
    }
    let normalized: String = identifier
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '+')
        .collect();
    if normalized.is_empty() || normalized == identifier {
        None
    } else {
        Some(normalized)
    }
}

/// Phone as stored: digits and `+` only, or the raw input when nothing
/// survives the stripping.
fn normalize_phone(raw: &str) -> String {
    let raw = raw.trim();
    let normalized: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '+')
        .collect();
    if normalized.is_empty() {
        raw.to_string()
    } else {
        normalized
    }
}

#[derive(Deserialize, ToSchema)]
struct LoginReq {
    pub identifier: String,
    pub password: String,
}

/// Sign in with a phone number, email or username. A login folds whatever
/// the visitor already put in their session cart into the account's cart.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Accounts"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in", body = StdResponse<UserProfile, String>),
        (status = 400, description = "Credentials rejected")
    )
)]
async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(body): Json<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let identifier = body.identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::BadRequest(
            "Tên đăng nhập hoặc mật khẩu không đúng.".to_string(),
        ));
    }

    let base_url = &state.config.identity_service_url;
    let mut profile = identity::verify_credentials(
        state.http_client.clone(),
        base_url,
        identifier,
        &body.password,
    )
    .await?;

    // Customers often type their phone with spaces or dots; retry with the
    // normalized form before giving up.
    if profile.is_none() {
        if let Some(normalized) = normalize_identifier(identifier) {
            profile = identity::verify_credentials(
                state.http_client.clone(),
                base_url,
                &normalized,
                &body.password,
            )
            .await?;
        }
    }

    let Some(profile) = profile else {
        return Err(AppError::BadRequest(
            "Tên đăng nhập hoặc mật khẩu không đúng.".to_string(),
        ));
    };

    session.login(profile.id, &profile.role);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    cart::db::merge_session_cart(conn, &session, profile.id).await?;

    tracing::info!("User #{} logged in", profile.id);
    Ok(StdResponse {
        data: Some(profile),
        message: Some("Login successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct RegisterReq {
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

/// Create an account and sign it in. The phone number doubles as the
/// username; the identity service enforces its uniqueness.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Accounts"],
    request_body = RegisterReq,
    responses(
        (status = 200, description = "Registered and logged in", body = StdResponse<UserProfile, String>),
        (status = 400, description = "Registration refused")
    )
)]
async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(body): Json<RegisterReq>,
) -> Result<impl IntoResponse, AppError> {
    let full_name = body.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Vui lòng nhập họ tên.".to_string()));
    }

    let phone = normalize_phone(&body.phone);
    if phone.is_empty() {
        return Err(AppError::BadRequest(
            "Vui lòng nhập số điện thoại.".to_string(),
        ));
    }

    if body.password.chars().count() < 8 {
        return Err(AppError::BadRequest(
            "Mật khẩu phải có ít nhất 8 ký tự.".to_string(),
        ));
    }

    let req = CreateUserReq {
        username: phone.clone(),
        full_name: full_name.to_string(),
        birth_date: body.birth_date,
        phone,
        email: body.email.trim().to_string(),
        password: body.password,
        role: "customer".to_string(),
    };

    let res =
        identity::register_user(state.http_client.clone(), &state.config.identity_service_url, &req)
            .await?;

    let Some(profile) = res.data else {
        return Err(AppError::BadRequest(res.message.unwrap_or_else(|| {
            "Đăng ký không thành công.".to_string()
        })));
    };

    session.login(profile.id, &profile.role);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    cart::db::merge_session_cart(conn, &session, profile.id).await?;

    tracing::info!("User #{} registered", profile.id);
    Ok(StdResponse {
        data: Some(profile),
        message: Some("Register successfully"),
    })
}

/// Drop the whole session, cart and checkout draft included.
#[utoipa::path(
    post,
    path = "/logout",
    tags = ["Accounts"],
    responses(
        (status = 200, description = "Logged out", body = StdResponse<String, String>)
    )
)]
async fn logout(
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, AppError> {
    session.flush();
    Ok(StdResponse::<String, _> {
        data: None,
        message: Some("Logout successfully"),
    })
}

/// Profile of the signed-in customer.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Accounts"],
    security(("cookieAuth" = [])),
    responses(
        (status = 200, description = "Current profile", body = StdResponse<UserProfile, String>),
        (status = 404, description = "Account no longer exists")
    )
)]
async fn get_me(
    State(state): State<AppState>,
    Extension(user_id): Extension<i32>,
) -> Result<impl IntoResponse, AppError> {
    let profile = identity::get_user_profile(
        state.http_client.clone(),
        &state.config.identity_service_url,
        user_id,
    )
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(profile),
        message: Some("Get profile successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_shaped_identifiers_are_normalized() {
        assert_eq!(
            normalize_identifier("090 123 4567"),
            Some("0901234567".to_string())
        );
        assert_eq!(
            normalize_identifier("+84-90-123-4567"),
            Some("+84901234567".to_string())
        );
    }

    #[test]
    fn emails_and_plain_identifiers_stay_as_typed() {
        assert_eq!(normalize_identifier("user@example.com"), None);
        assert_eq!(normalize_identifier("0901234567"), None);
        assert_eq!(normalize_identifier("johndoe"), None);
    }

    #[test]
    fn phone_normalization_falls_back_to_the_raw_input() {
        assert_eq!(normalize_phone(" 090 123.4567 "), "0901234567");
        assert_eq!(normalize_phone("abc"), "abc");
        assert_eq!(normalize_phone("  "), "");
    }
}
