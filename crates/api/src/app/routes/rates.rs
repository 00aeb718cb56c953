use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::put,
};
use chrono::Utc;
use rust_decimal::Decimal;

use goldline_pricing::MarketRate;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/rates/current", put(publish_rate).get(current_rate))
}

/// Publish today's per-gram rate (typed in by the operator).
pub async fn publish_rate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PublishRateRequest>,
) -> axum::response::Response {
    if body.rate_per_gram <= Decimal::ZERO {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "rate_per_gram must be positive",
        );
    }
    let pricing = services.engine().pricing();
    let currency = body.currency.unwrap_or(pricing.base_currency);
    if !pricing.supports(currency) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("currency {currency} is not supported"),
        );
    }

    let rate = MarketRate {
        rate_per_gram: body.rate_per_gram,
        currency,
        as_of: body.as_of.unwrap_or_else(Utc::now),
    };
    if let Err(e) = services.rates().publish(rate.clone()) {
        return errors::domain_error_to_response(e.into());
    }
    tracing::info!(rate_per_gram = %rate.rate_per_gram, currency = %rate.currency, "market rate published");

    Json(rate).into_response()
}

/// The current rate, or 404 if none is published or it has gone stale.
pub async fn current_rate(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.engine().current_rate().await {
        Ok(Some(rate)) => Json(rate).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no current market rate"),
        Err(e) => errors::domain_error_to_response(e),
    }
}
