use std::sync::Arc;

use crate::{aliases::DbPool, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
}
