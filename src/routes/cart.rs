use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::QueryDsl;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    cart::{Cart, CartLine},
    checkout::{CartTotals, cart_totals},
    schema::products,
    session::SessionHandle,
};

/// Cart routes work for visitors and customers alike; the session decides
/// which backend the engine talks to.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(add_to_cart))
            .routes(utoipa_axum::routes!(decrease_cart_item))
            .routes(utoipa_axum::routes!(remove_cart_item))
            .routes(utoipa_axum::routes!(clear_cart)),
    )
}

#[derive(Serialize, ToSchema)]
struct CartRes {
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub total_quantity: i64,
}

async fn snapshot(conn: &mut AsyncPgConnection, cart: &mut Cart) -> Result<CartRes> {
    let lines = cart.lines(conn).await?;
    let totals = cart_totals(&lines);
    let total_quantity = cart.total_quantity(conn).await?;
    Ok(CartRes {
        lines,
        totals,
        total_quantity,
    })
}

/// The current cart with its lines and totals.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    responses(
        (status = 200, description = "Current cart", body = StdResponse<CartRes, String>)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = Cart::resolve(&session);
    let cart = snapshot(conn, &mut cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddToCartReq {
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Add a product to the cart. Quantities below one leave the cart as it is.
#[utoipa::path(
    post,
    path = "/add/{product_id}",
    tags = ["Cart"],
    params(
        ("product_id" = i32, Path, description = "Product to add")
    ),
    request_body = AddToCartReq,
    responses(
        (status = 200, description = "Cart after the add", body = StdResponse<CartRes, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn add_to_cart(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(body): Json<AddToCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    products::table
        .find(product_id)
        .select(products::id)
        .first::<i32>(conn)
        .await?;

    let mut cart = Cart::resolve(&session);
    cart.add(conn, product_id, body.quantity).await?;
    let cart = snapshot(conn, &mut cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Add to cart successfully"),
    })
}

/// Take one unit off a line; the line disappears when it reaches zero.
#[utoipa::path(
    post,
    path = "/decrease/{product_id}",
    tags = ["Cart"],
    params(
        ("product_id" = i32, Path, description = "Product to decrease")
    ),
    responses(
        (status = 200, description = "Cart after the decrease", body = StdResponse<CartRes, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn decrease_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    products::table
        .find(product_id)
        .select(products::id)
        .first::<i32>(conn)
        .await?;

    let mut cart = Cart::resolve(&session);
    cart.decrease(conn, product_id).await?;
    let cart = snapshot(conn, &mut cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Decrease cart item successfully"),
    })
}

/// Drop a line entirely, whatever its quantity.
#[utoipa::path(
    post,
    path = "/remove/{product_id}",
    tags = ["Cart"],
    params(
        ("product_id" = i32, Path, description = "Product to remove")
    ),
    responses(
        (status = 200, description = "Cart after the removal", body = StdResponse<CartRes, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn remove_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    products::table
        .find(product_id)
        .select(products::id)
        .first::<i32>(conn)
        .await?;

    let mut cart = Cart::resolve(&session);
    cart.remove(conn, product_id).await?;
    let cart = snapshot(conn, &mut cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Remove cart item successfully"),
    })
}

/// Empty the cart in one go.
#[utoipa::path(
    post,
    path = "/clear",
    tags = ["Cart"],
    responses(
        (status = 200, description = "Emptied cart", body = StdResponse<CartRes, String>)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = Cart::resolve(&session);
    cart.clear(conn).await?;
    let cart = snapshot(conn, &mut cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Clear cart successfully"),
    })
}
