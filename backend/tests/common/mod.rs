//! Shared fixtures for backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use consignment_backend::config::{SettlementConfig, SoldItemPolicy};
use consignment_backend::services::settlement::CreateSettlementInput;
use consignment_backend::services::suitcase_item::AddItemInput;
use consignment_backend::services::{
    CsvReceiptRenderer, SettlementService, StaticAdminCheck, SuitcaseItemService, SuitcaseLocks,
};
use consignment_backend::store::InMemoryStore;
use shared::{Seller, Suitcase, SuitcaseItem};

/// One seller, one suitcase, an admin and the services wired to an in-memory store
pub struct Fixture {
    pub store: InMemoryStore,
    pub settlements: SettlementService,
    pub items: SuitcaseItemService,
    pub admin_id: Uuid,
    pub seller: Seller,
    pub suitcase: Suitcase,
}

impl Fixture {
    pub fn new(commission_rate: Option<Decimal>) -> Self {
        Self::with_settings(commission_rate, SettlementConfig::default())
    }

    pub fn with_policy(policy: SoldItemPolicy) -> Self {
        Self::with_settings(
            Some(Decimal::new(3, 1)),
            SettlementConfig {
                sold_item_policy: policy,
                ..SettlementConfig::default()
            },
        )
    }

    pub fn with_settings(commission_rate: Option<Decimal>, settings: SettlementConfig) -> Self {
        let store = InMemoryStore::new();
        let seller = store.add_seller("Joana", commission_rate).unwrap();
        let suitcase = store.add_suitcase("MAL-001", seller.id).unwrap();
        let admin_id = Uuid::new_v4();
        let receipt_dir = std::env::temp_dir().join(format!("consign-receipts-{}", Uuid::new_v4()));

        let settlements = SettlementService::new(
            Arc::new(store.clone()),
            SuitcaseLocks::new(),
            Arc::new(StaticAdminCheck::new([admin_id])),
            Arc::new(CsvReceiptRenderer::new(receipt_dir, "/receipts")),
            &settings,
        );
        let items = SuitcaseItemService::new(Arc::new(store.clone()));

        Self {
            store,
            settlements,
            items,
            admin_id,
            seller,
            suitcase,
        }
    }

    /// Create stock priced `price` and check one unit out into the suitcase
    pub async fn check_out(&self, price: i64) -> SuitcaseItem {
        let stock = self
            .store
            .add_inventory_item(&format!("SKU-{}", Uuid::new_v4()), Decimal::from(price), 5)
            .unwrap();
        self.items
            .add_item(
                self.suitcase.id,
                AddItemInput {
                    inventory_id: stock.id,
                    quantity: 1,
                },
            )
            .await
            .unwrap()
    }

    pub fn settle_input(&self, items_present: Vec<Uuid>) -> CreateSettlementInput {
        CreateSettlementInput {
            suitcase_id: self.suitcase.id,
            seller_id: self.seller.id,
            settlement_date: date(2024, 6, 1),
            next_settlement_date: Some(date(2024, 7, 1)),
            items_present,
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
