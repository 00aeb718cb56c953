use axum::Router;

pub mod inventory;
pub mod quotes;
pub mod rates;
pub mod sales;
pub mod system;

/// Router for all business endpoints.
pub fn router() -> Router {
    Router::new()
        .merge(inventory::router())
        .merge(rates::router())
        .merge(quotes::router())
        .merge(sales::router())
}
