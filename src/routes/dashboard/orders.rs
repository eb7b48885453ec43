use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    models::{OrderEntity, OrderItemEntity, OrderStatus},
    routes::orders::GetOrderRes,
    schema::{order_items, orders},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_orders))
        .routes(utoipa_axum::routes!(get_order))
        .routes(utoipa_axum::routes!(update_order_status))
}

#[derive(Deserialize, utoipa::IntoParams)]
struct OrderListParams {
    status: Option<String>,
}

/// All orders, newest first, optionally narrowed to one status.
#[utoipa::path(
    get,
    path = "/orders",
    tags = ["Dashboard"],
    params(OrderListParams),
    responses(
        (status = 200, description = "List orders", body = StdResponse<Vec<OrderEntity>, String>),
        (status = 400, description = "Unknown status value")
    )
)]
async fn get_orders(
    Query(params): Query<OrderListParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            OrderStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest("Invalid order status".to_string()))?,
        ),
    };

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = orders::table.into_boxed();
    if let Some(status) = status {
        query = query.filter(orders::status.eq(status.as_str()));
    }
    let listed: Vec<OrderEntity> = query
        .order(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    Ok(StdResponse {
        data: Some(listed),
        message: Some("Get orders successfully"),
    })
}

/// One order with its line snapshots, regardless of owner.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tags = ["Dashboard"],
    params(
        ("id" = i32, Path, description = "Order id")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table.find(id).first(conn).await?;
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .order(order_items::id.asc())
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    Ok(StdResponse {
        data: Some(GetOrderRes {
            address_display: order.address_display(),
            order,
            items,
        }),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: String,
}

/// Moves an order through the fulfilment flow. The status vocabulary is
/// closed; anything outside it is refused before the database is touched.
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    tags = ["Dashboard"],
    params(
        ("id" = i32, Path, description = "Order id")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Status updated", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Unknown status value"),
        (status = 404, description = "Order not found")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let status = OrderStatus::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest("Invalid order status".to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated: OrderEntity = diesel::update(orders::table.find(id))
        .set(orders::status.eq(status.as_str()))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Order #{} moved to status {}", updated.id, updated.status);
    Ok(StdResponse {
        data: Some(updated),
        message: Some("Order status updated successfully"),
    })
}
