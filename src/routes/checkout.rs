use std::collections::BTreeMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::identity,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    cart::{Cart, CartLine},
    checkout::{
        AddressForm, CartTotals, CheckoutDraft, cart_totals, commit, parse_payment_method,
        validate_address, vietqr_url,
    },
    middleware,
    session::SessionHandle,
};

/// The two checkout steps. Both are gated on a signed-in customer; an empty
/// cart bounces back to `/cart` and a missing shipping draft bounces the
/// payment step back to the first step.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/checkout",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_info))
            .routes(utoipa_axum::routes!(submit_info))
            .routes(utoipa_axum::routes!(get_payment))
            .routes(utoipa_axum::routes!(submit_payment))
            .route_layer(axum::middleware::from_fn(
                middleware::customer_authorization,
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct CheckoutInfoRes {
    pub form: AddressForm,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
}

/// Shipping form for the first step, prefilled from the saved draft or the
/// customer's profile.
#[utoipa::path(
    get,
    path = "/info",
    tags = ["Checkout"],
    security(("cookieAuth" = [])),
    responses(
        (status = 200, description = "Shipping form and cart summary", body = StdResponse<CheckoutInfoRes, String>),
        (status = 303, description = "Cart is empty")
    )
)]
async fn get_info(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(user_id): Extension<i32>,
) -> Result<Response, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = Cart::resolve(&session);
    if cart.total_quantity(conn).await? <= 0 {
        return Ok(Redirect::to("/cart").into_response());
    }
    let lines = cart.lines(conn).await?;
    let totals = cart_totals(&lines);

    let form = match session.checkout_draft() {
        Some(draft) => AddressForm::from(draft),
        None => {
            let profile = identity::get_user_profile(
                state.http_client.clone(),
                &state.config.identity_service_url,
                user_id,
            )
            .await?;
            let mut form = AddressForm {
                delivery_method: "delivery".to_string(),
                ..AddressForm::default()
            };
            if let Some(profile) = profile {
                form.full_name = profile.display_name().to_string();
                form.phone = profile.phone;
                form.email = profile.email;
            }
            form
        }
    };

    Ok(StdResponse {
        data: Some(CheckoutInfoRes {
            form,
            lines,
            totals,
        }),
        message: Some("Get checkout info successfully"),
    }
    .into_response())
}

#[derive(Serialize, ToSchema)]
struct AddressErrorsRes {
    pub form: AddressForm,
    pub errors: BTreeMap<String, String>,
}

/// Validate and park the shipping details, then move on to payment.
#[utoipa::path(
    post,
    path = "/info",
    tags = ["Checkout"],
    security(("cookieAuth" = [])),
    request_body = AddressForm,
    responses(
        (status = 303, description = "Draft saved, continue to payment"),
        (status = 422, description = "Form rejected", body = AddressErrorsRes)
    )
)]
async fn submit_info(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(body): Json<AddressForm>,
) -> Result<Response, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = Cart::resolve(&session);
    if cart.total_quantity(conn).await? <= 0 {
        return Ok(Redirect::to("/cart").into_response());
    }

    match validate_address(body) {
        Ok(draft) => {
            session.set_checkout_draft(draft);
            Ok(Redirect::to("/checkout/payment").into_response())
        }
        Err((form, errors)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(AddressErrorsRes { form, errors }),
        )
            .into_response()),
    }
}

#[derive(Serialize, ToSchema)]
struct CheckoutPaymentRes {
    pub checkout: CheckoutDraft,
    pub address_display: String,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub bank_qr_url: Option<String>,
}

/// Review step: the saved draft, the cart once more and the transfer QR when
/// bank payment is configured.
#[utoipa::path(
    get,
    path = "/payment",
    tags = ["Checkout"],
    security(("cookieAuth" = [])),
    responses(
        (status = 200, description = "Payment step summary", body = StdResponse<CheckoutPaymentRes, String>),
        (status = 303, description = "Cart is empty or the shipping step was skipped")
    )
)]
async fn get_payment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = Cart::resolve(&session);
    if cart.total_quantity(conn).await? <= 0 {
        return Ok(Redirect::to("/cart").into_response());
    }
    let Some(draft) = session.checkout_draft() else {
        return Ok(Redirect::to("/checkout/info").into_response());
    };

    let lines = cart.lines(conn).await?;
    let totals = cart_totals(&lines);
    let bank_qr_url = vietqr_url(&state.config.vietqr, totals.total);

    Ok(StdResponse {
        data: Some(CheckoutPaymentRes {
            address_display: draft.address_display(),
            checkout: draft,
            lines,
            totals,
            bank_qr_url,
        }),
        message: Some("Get checkout payment successfully"),
    }
    .into_response())
}

#[derive(serde::Deserialize, ToSchema)]
struct PaymentReq {
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub coupon: String,
}

#[derive(Serialize, ToSchema)]
struct PaymentErrorsRes {
    pub errors: BTreeMap<String, String>,
    pub payment_method: String,
    pub coupon_code: String,
}

/// Place the order. Stock is re-checked against the rows read for this
/// request; on success the cart is emptied, the draft dropped and the
/// customer sent to the new order.
#[utoipa::path(
    post,
    path = "/payment",
    tags = ["Checkout"],
    security(("cookieAuth" = [])),
    request_body = PaymentReq,
    responses(
        (status = 303, description = "Order placed"),
        (status = 422, description = "Payment choice or stock rejected", body = PaymentErrorsRes)
    )
)]
async fn submit_payment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(user_id): Extension<i32>,
    Json(body): Json<PaymentReq>,
) -> Result<Response, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = Cart::resolve(&session);
    if cart.total_quantity(conn).await? <= 0 {
        return Ok(Redirect::to("/cart").into_response());
    }
    let Some(draft) = session.checkout_draft() else {
        return Ok(Redirect::to("/checkout/info").into_response());
    };

    let raw_method = {
        let trimmed = body.payment_method.trim();
        if trimmed.is_empty() {
            "cod".to_string()
        } else {
            trimmed.to_string()
        }
    };
    let coupon_code = body.coupon.trim().to_string();

    let lines = cart.lines(conn).await?;
    let totals = cart_totals(&lines);

    let mut errors = BTreeMap::new();
    let parsed_method = parse_payment_method(&raw_method);
    if parsed_method.is_none() {
        errors.insert(
            "payment_method".to_string(),
            "Vui lòng chọn phương thức thanh toán hợp lệ.".to_string(),
        );
    }
    if let Some(message) = commit::check_stock(&lines) {
        errors.insert("stock".to_string(), message);
    }

    let Some(payment_method) = parsed_method.filter(|_| errors.is_empty()) else {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(PaymentErrorsRes {
                errors,
                payment_method: raw_method,
                coupon_code,
            }),
        )
            .into_response());
    };

    let order = commit::place_order(
        conn,
        commit::PlaceOrder {
            user_id,
            draft,
            payment_method,
            coupon_code,
            totals,
        },
        &lines,
    )
    .await?;

    // Only forget the draft once the order is actually in.
    session.clear_checkout_draft();

    Ok(Redirect::to(&format!("/orders/{}", order.id)).into_response())
}
