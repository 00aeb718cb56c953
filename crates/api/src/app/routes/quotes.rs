use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::post};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/quotes", post(quote_item))
}

pub async fn quote_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::QuoteRequest>,
) -> axum::response::Response {
    match services.engine().quote_item(body.item_id, body.pricing).await {
        Ok((item, quote)) => Json(dto::QuoteResponse {
            item_id: item.id_typed(),
            availability: item.availability(),
            quote,
        })
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
