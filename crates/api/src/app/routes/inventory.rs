use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use goldline_core::ItemId;
use goldline_inventory::ReceiveItem;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/inventory/items", post(receive_item).get(find_by_barcode))
        .route("/inventory/items/:id", get(get_item))
        .route("/inventory/items/:id/movements", get(get_movements))
}

pub async fn receive_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReceiveItemRequest>,
) -> axum::response::Response {
    let cmd = ReceiveItem {
        item_id: ItemId::new(),
        barcode: body.barcode,
        name: body.name,
        category: body.category,
        weight_grams: body.weight_grams,
        purity_karat: body.purity_karat,
        acquisition_cost: body.acquisition_cost,
        occurred_at: Utc::now(),
    };

    match services.engine().receive_item(cmd).await {
        Ok(item) => (StatusCode::CREATED, Json(dto::ItemView::from_item(&item))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.engine().item(item_id).await {
        Ok(item) => Json(dto::ItemView::from_item(&item)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn find_by_barcode(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::BarcodeQuery>,
) -> axum::response::Response {
    match services.engine().item_by_barcode(&query.barcode).await {
        Ok(item) => Json(dto::ItemView::from_item(&item)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.engine().movements(item_id).await {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
