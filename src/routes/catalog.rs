use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{BoolExpressionMethods, ExpressionMethods, PgTextExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    models::{CategoryEntity, ProductEntity},
    schema::{categories, products},
};

/// Public storefront browsing. Everything here is reachable without a
/// session.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(home))
        .routes(utoipa_axum::routes!(get_product))
        .routes(utoipa_axum::routes!(get_categories))
        .routes(utoipa_axum::routes!(get_category))
        .routes(utoipa_axum::routes!(search))
}

/// Featured products for the landing page.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Catalog"],
    responses(
        (status = 200, description = "Featured products", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn home(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let featured: Vec<ProductEntity> = products::table
        .filter(products::is_active.eq(true))
        .filter(products::is_featured.eq(true))
        .order(products::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get featured products")?;

    Ok(StdResponse {
        data: Some(featured),
        message: Some("Get featured products successfully"),
    })
}

/// Fetch one active product by its slug.
#[utoipa::path(
    get,
    path = "/products/{slug}",
    tags = ["Catalog"],
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn get_product(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = products::table
        .filter(products::slug.eq(&slug))
        .filter(products::is_active.eq(true))
        .first(conn)
        .await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Get product successfully"),
    })
}

/// All categories, for navigation.
#[utoipa::path(
    get,
    path = "/categories",
    tags = ["Catalog"],
    responses(
        (status = 200, description = "List categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn get_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<CategoryEntity> = categories::table
        .order(categories::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get categories successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct GetCategoryRes {
    pub category: CategoryEntity,
    pub products: Vec<ProductEntity>,
}

/// One category with its active products.
#[utoipa::path(
    get,
    path = "/categories/{slug}",
    tags = ["Catalog"],
    params(
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Get category successfully", body = StdResponse<GetCategoryRes, String>),
        (status = 404, description = "Category not found")
    )
)]
async fn get_category(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = categories::table
        .filter(categories::slug.eq(&slug))
        .first(conn)
        .await?;

    let listed: Vec<ProductEntity> = products::table
        .filter(products::category_id.eq(category.id))
        .filter(products::is_active.eq(true))
        .order(products::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get category products")?;

    Ok(StdResponse {
        data: Some(GetCategoryRes {
            category,
            products: listed,
        }),
        message: Some("Get category successfully"),
    })
}

#[derive(Deserialize, utoipa::IntoParams)]
struct SearchParams {
    q: Option<String>,
}

/// Name and description search over active products. A missing or empty
/// query returns no products rather than the whole catalog.
#[utoipa::path(
    get,
    path = "/search",
    tags = ["Catalog"],
    params(SearchParams),
    responses(
        (status = 200, description = "Search results", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn search(
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Ok(StdResponse {
            data: Some(Vec::<ProductEntity>::new()),
            message: Some("Search results"),
        });
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pattern = format!("%{}%", query.trim());
    let found: Vec<ProductEntity> = products::table
        .filter(products::is_active.eq(true))
        .filter(
            products::name
                .ilike(&pattern)
                .or(products::description.ilike(&pattern)),
        )
        .order(products::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to search products")?;

    Ok(StdResponse {
        data: Some(found),
        message: Some("Search results"),
    })
}
