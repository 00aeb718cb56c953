use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use goldline_core::{DomainResult, TransactionId};
use goldline_sales::{DraftOrder, ReferenceNumber};

use crate::app::services::{AppServices, Engine};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/sales", post(commit_sale).get(find_by_reference))
        .route("/sales/:id", get(get_sale))
        .route("/sales/:id/returns", post(return_line).get(list_returns))
}

/// Price every requested line and put it into a fresh draft order.
async fn assemble_draft(engine: &Engine, lines: Vec<dto::SaleLineRequest>) -> DomainResult<DraftOrder> {
    let mut draft = DraftOrder::new(Utc::now());
    for line in lines {
        let (item, quote) = engine.quote_item(line.item_id, line.pricing).await?;
        draft.add_line(&item, quote)?;
    }
    Ok(draft)
}

pub async fn commit_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CommitSaleRequest>,
) -> axum::response::Response {
    let engine = services.engine();
    let mut draft = match assemble_draft(engine, body.lines).await {
        Ok(draft) => draft,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match engine.commit(&mut draft, &body.customer, &body.payment).await {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// `GET /sales?reference=N`: the safe-retry lookup.
pub async fn find_by_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::SalesQuery>,
) -> axum::response::Response {
    let reference = match ReferenceNumber::parse(&query.reference) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().find_by_reference(reference).await {
        Ok(Some(tx)) => Json(tx).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no sale with reference {reference}"),
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.engine().transaction(transaction_id).await {
        Ok(tx) => Json(tx).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn return_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReturnRequest>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.engine().reverse(transaction_id, body.item_id).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_returns(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.engine().returns_for(transaction_id).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
