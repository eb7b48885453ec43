use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    models::{
        BrandEntity, CategoryEntity, CreateBrandEntity, CreateCategoryEntity, CreateProductEntity,
        ProductEntity,
    },
    schema::{brands, categories, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_categories))
        .routes(utoipa_axum::routes!(create_category))
        .routes(utoipa_axum::routes!(delete_category))
        .routes(utoipa_axum::routes!(get_brands))
        .routes(utoipa_axum::routes!(create_brand))
        .routes(utoipa_axum::routes!(delete_brand))
        .routes(utoipa_axum::routes!(get_products))
        .routes(utoipa_axum::routes!(create_product))
        .routes(utoipa_axum::routes!(delete_product))
}

/// ASCII slug for URLs. Vietnamese letters fold to their base form and any
/// other run of non-alphanumeric characters collapses into a single hyphen.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.chars() {
        for lower in ch.to_lowercase() {
            let folded = fold_vietnamese(lower);
            if folded.is_ascii_alphanumeric() {
                slug.push(folded);
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn fold_vietnamese(ch: char) -> char {
    match ch {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
        | 'ẩ' | 'ẫ' | 'ậ' => 'a',
        'đ' => 'd',
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
        | 'ở' | 'ỡ' | 'ợ' => 'o',
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        other => other,
    }
}

#[utoipa::path(
    get,
    path = "/categories",
    tags = ["Dashboard"],
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

    let listed: Vec<CategoryEntity> = categories::table
        .order(categories::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(listed),
        message: Some("Get categories successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateCategoryReq {
    name: String,
}

/// Creates a category; its slug is derived from the name.
#[utoipa::path(
    post,
    path = "/categories",
    tags = ["Dashboard"],
    request_body = CreateCategoryReq,
    responses(
        (status = 200, description = "Category created", body = StdResponse<CategoryEntity, String>),
        (status = 400, description = "Missing name")
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let created: CategoryEntity = diesel::insert_into(categories::table)
        .values(&CreateCategoryEntity {
            name: name.to_string(),
            slug: slugify(name),
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create category")?;

    Ok(StdResponse {
        data: Some(created),
        message: Some("Category created successfully"),
    })
}

/// Removes a category. Its products go with it.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tags = ["Dashboard"],
    params(
        ("id" = i32, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category deleted", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "Category not found")
    )
)]
async fn delete_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted: CategoryEntity = diesel::delete(categories::table.find(id))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Category deleted successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/brands",
    tags = ["Dashboard"],
    responses(
        (status = 200, description = "List brands", body = StdResponse<Vec<BrandEntity>, String>)
    )
)]
async fn get_brands(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let listed: Vec<BrandEntity> = brands::table
        .order(brands::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get brands")?;

    Ok(StdResponse {
        data: Some(listed),
        message: Some("Get brands successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateBrandReq {
    name: String,
}

#[utoipa::path(
    post,
    path = "/brands",
    tags = ["Dashboard"],
    request_body = CreateBrandReq,
    responses(
        (status = 200, description = "Brand created", body = StdResponse<BrandEntity, String>),
        (status = 400, description = "Missing name")
    )
)]
async fn create_brand(
    State(state): State<AppState>,
    Json(body): Json<CreateBrandReq>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Brand name is required".to_string()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let created: BrandEntity = diesel::insert_into(brands::table)
        .values(&CreateBrandEntity {
            name: name.to_string(),
        })
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create brand")?;

    Ok(StdResponse {
        data: Some(created),
        message: Some("Brand created successfully"),
    })
}

/// Removes a brand. Its products go with it.
#[utoipa::path(
    delete,
    path = "/brands/{id}",
    tags = ["Dashboard"],
    params(
        ("id" = i32, Path, description = "Brand id")
    ),
    responses(
        (status = 200, description = "Brand deleted", body = StdResponse<BrandEntity, String>),
        (status = 404, description = "Brand not found")
    )
)]
async fn delete_brand(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted: BrandEntity = diesel::delete(brands::table.find(id))
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Brand deleted successfully"),
    })
}

/// Every product, active or not. The storefront routes only ever show
/// active ones; this is where the rest are managed.
#[utoipa::path(
    get,
    path = "/products",
    tags = ["Dashboard"],
    responses(
        (status = 200, description = "List products", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn get_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let listed: Vec<ProductEntity> = products::table
        .order(products::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get products")?;

    Ok(StdResponse {
        data: Some(listed),
        message: Some("Get products successfully"),
    })
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
struct CreateProductReq {
    #[serde(default)]
    name: String,
    /// Optional; derived from the name when blank.
    #[serde(default)]
    slug: String,
    category_id: Option<i32>,
    brand_id: Option<i32>,
    #[serde(default)]
    price: Decimal,
    old_price: Option<Decimal>,
    #[serde(default)]
    stock: i32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    specifications: String,
    #[serde(default)]
    image_url: String,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    is_featured: bool,
}

#[utoipa::path(
    post,
    path = "/products",
    tags = ["Dashboard"],
    request_body = CreateProductReq,
    responses(
        (status = 200, description = "Product created", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Missing required fields"),
        (status = 404, description = "Category or brand not found")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name.trim();
    let image_url = body.image_url.trim();
    let (Some(category_id), Some(brand_id)) = (body.category_id, body.brand_id) else {
        return Err(AppError::BadRequest(
            "Product name, category, brand and image are required".to_string(),
        ));
    };
    if name.is_empty() || image_url.is_empty() {
        return Err(AppError::BadRequest(
            "Product name, category, brand and image are required".to_string(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    // Both parents must exist before anything is written.
    categories::table
        .find(category_id)
        .select(categories::id)
        .first::<i32>(conn)
        .await?;
    brands::table
        .find(brand_id)
        .select(brands::id)
        .first::<i32>(conn)
        .await?;

    let slug = match body.slug.trim() {
        "" => slugify(name),
        provided => provided.to_string(),
    };

    let created: ProductEntity = diesel::insert_into(products::table)
        .values(&CreateProductEntity {
            name: name.to_string(),
            slug,
            brand_id,
            category_id,
            price: body.price,
            old_price: body.old_price,
            stock: body.stock,
            description: body.description,
            specifications: body.specifications,
            image_url: image_url.to_string(),
            is_active: body.is_active,
            is_featured: body.is_featured,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create product")?;

    Ok(StdResponse {
        data: Some(created),
        message: Some("Product created successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tags = ["Dashboard"],
    params(
        ("id" = i32, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product deleted", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn delete_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted: ProductEntity = diesel::delete(products::table.find(id))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Product deleted successfully"),
    })
}
