#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use diesel::SelectableHelper;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use techmart_storefront::{
    app_state::AppState,
    config, db, middleware,
    models::{CreateBrandEntity, CreateCategoryEntity, CreateProductEntity, ProductEntity},
    routes,
    schema::{brands, categories, products},
};
use uuid::Uuid;

/// One connection with an open test transaction; nothing written on it
/// survives the test.
pub async fn connect() -> AsyncPgConnection {
    let url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a Postgres database");
    let mut conn = AsyncPgConnection::establish(&url)
        .await
        .expect("failed to connect to Postgres");
    conn.begin_test_transaction()
        .await
        .expect("failed to open the test transaction");
    conn
}

/// Seeds a product under a fresh category and brand. Slugs carry a random
/// suffix so the rows never collide with whatever the database holds.
pub async fn seed_product(
    conn: &mut AsyncPgConnection,
    name: &str,
    price: Decimal,
    stock: i32,
) -> ProductEntity {
    let suffix = Uuid::new_v4().simple().to_string();

    let category_id: i32 = diesel::insert_into(categories::table)
        .values(&CreateCategoryEntity {
            name: "Điện thoại".to_string(),
            slug: format!("dien-thoai-{suffix}"),
        })
        .returning(categories::id)
        .get_result(conn)
        .await
        .expect("failed to seed category");

    let brand_id: i32 = diesel::insert_into(brands::table)
        .values(&CreateBrandEntity {
            name: "Samsung".to_string(),
        })
        .returning(brands::id)
        .get_result(conn)
        .await
        .expect("failed to seed brand");

    diesel::insert_into(products::table)
        .values(&CreateProductEntity {
            name: name.to_string(),
            slug: format!("test-{suffix}"),
            brand_id,
            category_id,
            price,
            old_price: None,
            stock,
            description: String::new(),
            specifications: String::new(),
            image_url: "https://example.com/p.jpg".to_string(),
            is_active: true,
            is_featured: false,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .expect("failed to seed product")
}

/// Application state over the configured database, for router-level tests.
pub async fn app_state() -> AppState {
    let config = config::load().expect("DATABASE_URL must be set for Postgres tests");
    let db_pool = db::create_pool(&config.database.url)
        .await
        .expect("failed to build the pool");
    AppState {
        db_pool,
        http_client: reqwest::Client::new(),
        config: Arc::new(config),
    }
}

/// The service as `main` wires it, minus Swagger.
pub fn app(state: AppState) -> Router {
    let (router, _openapi) = routes::routes_with_openapi().split_for_parts();
    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session,
        ))
        .with_state(state)
}
