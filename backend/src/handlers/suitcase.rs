//! HTTP handlers for suitcase and suitcase item endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{ItemStatus, SaleAnnotation, SuitcaseItem};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reconciliation::CleanupReport;
use crate::services::suitcase_item::{AddItemInput, AnnotateSaleInput, UpdateQuantityInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub status: Option<ItemStatus>,
}

/// List items in a suitcase
pub async fn list_items(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(suitcase_id): Path<Uuid>,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<Vec<SuitcaseItem>>> {
    let items = state
        .suitcase_item_service()
        .list_items(suitcase_id, query.status)
        .await?;
    Ok(Json(items))
}

/// Check stock out into a suitcase
pub async fn add_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(suitcase_id): Path<Uuid>,
    Json(input): Json<AddItemInput>,
) -> AppResult<(StatusCode, Json<SuitcaseItem>)> {
    let item = state
        .suitcase_item_service()
        .add_item(suitcase_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Re-run cleanup on a suitcase left with items after a settlement
pub async fn reconcile_suitcase(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(suitcase_id): Path<Uuid>,
) -> AppResult<Json<CleanupReport>> {
    let report = state
        .reconciliation_service()
        .reconcile_suitcase(suitcase_id)
        .await?;
    Ok(Json(report))
}

/// Change how many units an item holds
pub async fn update_quantity(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateQuantityInput>,
) -> AppResult<Json<SuitcaseItem>> {
    let item = state
        .suitcase_item_service()
        .update_quantity(item_id, input)
        .await?;
    Ok(Json(item))
}

/// Return an item to stock
pub async fn return_item(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<SuitcaseItem>> {
    let item = state.suitcase_item_service().return_item(item_id).await?;
    Ok(Json(item))
}

/// Mark an item as lost
pub async fn mark_lost(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<SuitcaseItem>> {
    let item = state.suitcase_item_service().mark_lost(item_id).await?;
    Ok(Json(item))
}

/// Record customer and payment details for an item
pub async fn annotate_sale(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AnnotateSaleInput>,
) -> AppResult<Json<SaleAnnotation>> {
    let annotation = state
        .suitcase_item_service()
        .annotate_sale(item_id, input)
        .await?;
    Ok(Json(annotation))
}
