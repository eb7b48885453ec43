use anyhow::Context;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::{
    app_error::AppError,
    app_state::AppState,
    config::SessionConfig,
    models::{SessionEntity, is_staff_role},
    schema::sessions,
    session::SessionHandle,
};

fn cookie_name_for<'a>(session: &'a SessionConfig, path: &str) -> &'a str {
    if path.starts_with("/dashboard") {
        &session.admin_cookie_name
    } else {
        &session.cookie_name
    }
}

/// Loads the session row named by the request cookie, hands a shared handle
/// to the inner service and persists whatever the handlers did to it once
/// the response is ready. Untouched sessions are never written.
///
/// The dashboard runs on its own cookie, so a staff login and a customer
/// session can coexist in one browser without clobbering each other.
pub async fn session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(req.headers());
    let cookie_name = cookie_name_for(&state.config.session, req.uri().path()).to_string();

    let token = jar
        .get(&cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    // The connection is released again before the inner service runs.
    let session = match token {
        Some(token) => {
            let conn = &mut state
                .db_pool
                .get()
                .await
                .context("Failed to obtain a DB connection pool")?;

            let row: Option<SessionEntity> = sessions::table
                .find(token)
                .filter(sessions::expires_at.gt(Utc::now()))
                .select(SessionEntity::as_select())
                .first(conn)
                .await
                .optional()
                .context("Failed to load session")?;

            row.map(SessionHandle::from_entity)
                .unwrap_or_else(SessionHandle::anonymous)
        }
        None => SessionHandle::anonymous(),
    };

    req.extensions_mut().insert(session.clone());
    let response = next.run(req).await;

    if !session.is_dirty() {
        return Ok(response);
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    let previous = session.token();

    // Nothing left to keep: drop the row and the cookie with it.
    if session.is_empty() {
        if let Some(token) = previous {
            diesel::delete(sessions::table.find(token))
                .execute(conn)
                .await
                .context("Failed to delete session")?;
        }
        let mut removal = Cookie::new(cookie_name, "");
        removal.set_path("/");
        return Ok((jar.remove(removal), response).into_response());
    }

    // Logins rotate the token so a pre-login cookie never names the
    // authenticated row.
    let token = match (session.rotated(), previous) {
        (false, Some(token)) => token,
        (rotated, previous) => {
            if rotated {
                if let Some(old) = previous {
                    diesel::delete(sessions::table.find(old))
                        .execute(conn)
                        .await
                        .context("Failed to drop the pre-login session")?;
                }
            }
            Uuid::new_v4()
        }
    };

    let expires_at = Utc::now() + Duration::days(state.config.session.ttl_days);
    let row = session.save_row(token, expires_at)?;
    diesel::insert_into(sessions::table)
        .values(&row)
        .on_conflict(sessions::id)
        .do_update()
        .set(&row)
        .execute(conn)
        .await
        .context("Failed to save session")?;

    let cookie = Cookie::build((cookie_name, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), response).into_response())
}

/// Rejects anonymous requests and exposes the customer id to handlers.
pub async fn customer_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<SessionHandle>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;
    let user_id = session.user_id().ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Gate for the dashboard: the session must belong to a staff account.
pub async fn staff_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<SessionHandle>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;
    let user_id = session.user_id().ok_or(AppError::Unauthorized)?;

    let role = session.role().unwrap_or_default();
    if !is_staff_role(&role) {
        return Err(AppError::ForbiddenResource(
            "Staff access required".to_string(),
        ));
    }

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_config() -> SessionConfig {
        SessionConfig {
            cookie_name: "sessionid".to_string(),
            admin_cookie_name: "admin_sessionid".to_string(),
            ttl_days: 14,
        }
    }

    #[test]
    fn dashboard_paths_use_the_admin_cookie() {
        let config = session_config();
        assert_eq!(cookie_name_for(&config, "/dashboard"), "admin_sessionid");
        assert_eq!(
            cookie_name_for(&config, "/dashboard/orders/5/status"),
            "admin_sessionid"
        );
    }

    #[test]
    fn storefront_paths_use_the_customer_cookie() {
        let config = session_config();
        assert_eq!(cookie_name_for(&config, "/"), "sessionid");
        assert_eq!(cookie_name_for(&config, "/cart"), "sessionid");
        assert_eq!(cookie_name_for(&config, "/checkout/payment"), "sessionid");
    }
}
