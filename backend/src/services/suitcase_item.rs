//! Suitcase item service: checking stock out to suitcases and back

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{InvalidTransition, ItemStatus, SaleAnnotation, SuitcaseItem, TransitionKind};

use crate::error::{AppError, AppResult};
use crate::services::saga::{Compensation, CompensationLog};
use crate::store::{NewSuitcaseItem, ResizeOutcome, Store};

/// Suitcase item service
#[derive(Clone)]
pub struct SuitcaseItemService {
    store: Arc<dyn Store>,
}

/// Input for checking an inventory item out into a suitcase
#[derive(Debug, Deserialize, Validate)]
pub struct AddItemInput {
    pub inventory_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Input for changing how many units an item holds
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityInput {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Point-of-sale note recorded by the seller
#[derive(Debug, Deserialize, Validate)]
pub struct AnnotateSaleInput {
    #[validate(length(min = 1, max = 120, message = "Customer name must be 1-120 characters"))]
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
}

impl SuitcaseItemService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// List a suitcase's items, optionally by status
    pub async fn list_items(
        &self,
        suitcase_id: Uuid,
        status: Option<ItemStatus>,
    ) -> AppResult<Vec<SuitcaseItem>> {
        self.store
            .get_suitcase(suitcase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Suitcase".to_string()))?;

        self.store.list_suitcase_items(suitcase_id, status).await
    }

    /// Check units out of the warehouse into a suitcase
    pub async fn add_item(&self, suitcase_id: Uuid, input: AddItemInput) -> AppResult<SuitcaseItem> {
        input.validate()?;

        self.store
            .get_suitcase(suitcase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Suitcase".to_string()))?;

        if self
            .store
            .get_inventory_items(&[input.inventory_id])
            .await?
            .is_empty()
        {
            return Err(AppError::NotFound("Inventory item".to_string()));
        }

        let remaining = self
            .store
            .adjust_quantity(input.inventory_id, -input.quantity)
            .await?;

        let mut log = CompensationLog::new("add_suitcase_item");
        log.record(Compensation::RestoreInventory {
            inventory_id: input.inventory_id,
            quantity: input.quantity,
        });

        let item = match self
            .store
            .insert_suitcase_item(NewSuitcaseItem {
                suitcase_id,
                inventory_id: input.inventory_id,
                quantity: input.quantity,
            })
            .await
        {
            Ok(item) => item,
            Err(err) => {
                tracing::error!(
                    suitcase_id = %suitcase_id,
                    inventory_id = %input.inventory_id,
                    error = %err,
                    "Failed to attach item; returning stock"
                );
                log.unwind(self.store.as_ref()).await;
                return Err(err);
            }
        };

        tracing::info!(
            suitcase_id = %suitcase_id,
            item_id = %item.id,
            inventory_id = %item.inventory_id,
            quantity = item.quantity,
            stock_left = remaining,
            "Item checked out to suitcase"
        );

        Ok(item)
    }

    /// Change the quantity of an in-possession item, moving the difference to or from stock
    pub async fn update_quantity(
        &self,
        item_id: Uuid,
        input: UpdateQuantityInput,
    ) -> AppResult<SuitcaseItem> {
        input.validate()?;

        let item = self.get_item(item_id).await?;
        item.status.ensure_mutable()?;

        if item.quantity == input.quantity {
            return Ok(item);
        }

        match self.store.resize_item(item_id, input.quantity).await? {
            ResizeOutcome::Resized(item) => {
                tracing::info!(item_id = %item_id, quantity = item.quantity, "Item quantity changed");
                Ok(item)
            }
            ResizeOutcome::NotInPossession(status) => {
                Err(InvalidTransition::NotMutable { status }.into())
            }
        }
    }

    /// Send an item back to the warehouse
    pub async fn return_item(&self, item_id: Uuid) -> AppResult<SuitcaseItem> {
        let item = self.get_item(item_id).await?;
        item.status
            .transition(ItemStatus::Returned, TransitionKind::Forward)?;

        // Lost a race with a settlement or another return
        if !self.store.return_item_to_stock(item_id).await? {
            let current = self.get_item(item_id).await?;
            return Err(InvalidTransition::Transition {
                from: current.status,
                to: ItemStatus::Returned,
            }
            .into());
        }

        tracing::info!(
            item_id = %item_id,
            inventory_id = %item.inventory_id,
            quantity = item.quantity,
            "Item returned to stock"
        );
        self.get_item(item_id).await
    }

    /// Record an item as lost; its units are not restored to stock
    pub async fn mark_lost(&self, item_id: Uuid) -> AppResult<SuitcaseItem> {
        let item = self.get_item(item_id).await?;
        item.status.transition(ItemStatus::Lost, TransitionKind::Forward)?;

        if !self
            .store
            .compare_and_set_item_status(item_id, ItemStatus::InPossession, ItemStatus::Lost)
            .await?
        {
            let current = self.get_item(item_id).await?;
            return Err(InvalidTransition::Transition {
                from: current.status,
                to: ItemStatus::Lost,
            }
            .into());
        }

        tracing::warn!(item_id = %item_id, suitcase_id = %item.suitcase_id, "Item marked lost");
        self.get_item(item_id).await
    }

    /// Attach customer and payment details for the next settlement
    pub async fn annotate_sale(
        &self,
        item_id: Uuid,
        input: AnnotateSaleInput,
    ) -> AppResult<SaleAnnotation> {
        input.validate()?;

        if let Some(method) = input.payment_method.as_deref() {
            shared::validate_payment_method(method).map_err(|msg| {
                AppError::validation("payment_method", msg, "Forma de pagamento desconhecida")
            })?;
        }

        let item = self.get_item(item_id).await?;
        item.status.ensure_mutable()?;

        self.store
            .upsert_sale_annotation(SaleAnnotation {
                suitcase_item_id: item_id,
                customer_name: input.customer_name,
                payment_method: input.payment_method,
                recorded_at: Utc::now(),
            })
            .await
    }

    async fn get_item(&self, item_id: Uuid) -> AppResult<SuitcaseItem> {
        self.store
            .get_suitcase_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Suitcase item".to_string()))
    }
}
