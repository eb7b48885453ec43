use utoipa_axum::router::OpenApiRouter;

use crate::app_state::AppState;

pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod orders;

/// Every route group of the service merged into one router, without the
/// session layer or state.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    catalog::routes_with_openapi()
        .merge(cart::routes_with_openapi())
        .merge(accounts::routes_with_openapi())
        .merge(checkout::routes_with_openapi())
        .merge(orders::routes_with_openapi())
        .merge(dashboard::routes_with_openapi())
}
