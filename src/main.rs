use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use techmart_storefront::{app_state::AppState, bootstrap, config, db, middleware, routes, swagger};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database.url).await?;
    let state = AppState {
        db_pool,
        http_client: reqwest::Client::new(),
        config: Arc::new(config),
    };

    let routes = routes::routes_with_openapi();

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("TechMart Storefront API")
        .version("1.0.0")
        .build();
    openapi
        .components
        .get_or_insert_with(Default::default)
        .add_security_scheme(
            "cookieAuth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                state.config.session.cookie_name.clone(),
            ))),
        );
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let bind_addr = state.config.server.bind_addr.clone();
    // The session layer wraps the API routes only; Swagger assets never
    // touch the sessions table.
    let app = Router::new()
        .merge(routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session,
        ))
        .merge(swagger_ui)
        .with_state(state);

    bootstrap::serve("Storefront", &bind_addr, app).await?;
    Ok(())
}
