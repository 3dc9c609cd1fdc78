//! HTTP handlers for settlement endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::{Pagination, Settlement, SettlementDetails, SettlementStatus};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::settlement::{CreateSettlementInput, UpdateSettlementStatusInput};
use crate::store::SettlementFilter;
use crate::AppState;

/// Query parameters for listing settlements
#[derive(Debug, Deserialize)]
pub struct ListSettlementsQuery {
    pub suitcase_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub status: Option<SettlementStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<ListSettlementsQuery> for SettlementFilter {
    fn from(query: ListSettlementsQuery) -> Self {
        SettlementFilter {
            suitcase_id: query.suitcase_id,
            seller_id: query.seller_id,
            status: query.status,
            from: query.from,
            to: query.to,
            page: Pagination::from_query(query.limit, query.offset),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteSettlementResponse {
    pub deleted: bool,
}

/// Settle a suitcase
pub async fn create_settlement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSettlementInput>,
) -> AppResult<(StatusCode, Json<SettlementDetails>)> {
    tracing::debug!(
        user_id = %current_user.0.user_id,
        suitcase_id = %input.suitcase_id,
        "Settlement requested"
    );
    let details = state.settlement_service().create_settlement(input).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// List settlements
pub async fn list_settlements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListSettlementsQuery>,
) -> AppResult<Json<Vec<Settlement>>> {
    let settlements = state
        .settlement_service()
        .list_settlements(query.into())
        .await?;
    Ok(Json(settlements))
}

/// Get a settlement with its sold items
pub async fn get_settlement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(settlement_id): Path<Uuid>,
) -> AppResult<Json<SettlementDetails>> {
    let details = state
        .settlement_service()
        .get_settlement_by_id(settlement_id)
        .await?;
    Ok(Json(details))
}

/// Update settlement status
pub async fn update_settlement_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(settlement_id): Path<Uuid>,
    Json(input): Json<UpdateSettlementStatusInput>,
) -> AppResult<Json<Settlement>> {
    let settlement = state
        .settlement_service()
        .update_settlement_status(settlement_id, input)
        .await?;
    Ok(Json(settlement))
}

/// Reverse and delete a settlement (administrators only)
pub async fn delete_settlement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(settlement_id): Path<Uuid>,
) -> AppResult<Json<DeleteSettlementResponse>> {
    let deleted = state
        .settlement_service()
        .delete_settlement(current_user.0.user_id, settlement_id)
        .await?;
    Ok(Json(DeleteSettlementResponse { deleted }))
}

/// Render the settlement receipt
pub async fn generate_receipt(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(settlement_id): Path<Uuid>,
) -> AppResult<Json<Settlement>> {
    let settlement = state
        .settlement_service()
        .generate_receipt(settlement_id)
        .await?;
    Ok(Json(settlement))
}
