//! Settlement workflow tests
//!
//! Covers the settlement orchestrator end to end against the in-memory store:
//! - Sold set is everything in possession that was not confirmed present
//! - Totals and commission are exact
//! - The suitcase is emptied afterwards
//! - Failures while writing financial records are compensated
//! - Concurrent settlements of one suitcase sell each item once

mod common;

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use common::{date, Fixture};
use consignment_backend::error::AppError;
use consignment_backend::services::settlement::UpdateSettlementStatusInput;
use consignment_backend::services::suitcase_item::AnnotateSaleInput;
use consignment_backend::store::{
    FailPoint, NewSettlement, SettlementFilter, SettlementLedger, SuitcaseStore,
};
use shared::{ItemStatus, SettlementStatus};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Orchestrator Scenarios
// ============================================================================

#[tokio::test]
async fn test_three_items_one_present() {
    let fx = Fixture::new(Some(dec("0.3")));
    let kept = fx.check_out(10).await;
    let sold_a = fx.check_out(20).await;
    let sold_b = fx.check_out(30).await;

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![kept.id]))
        .await
        .unwrap();

    assert_eq!(details.settlement.total_sales, dec("50"));
    assert_eq!(details.settlement.commission_amount, dec("15.0"));
    assert_eq!(details.settlement.status, SettlementStatus::Completed);

    let sold: HashSet<Uuid> = details.sold_item_ids().collect();
    assert_eq!(sold, HashSet::from([sold_a.id, sold_b.id]));

    // Suitcase emptied; the present item went back to stock
    assert_eq!(fx.store.count_suitcase_items(fx.suitcase.id).await.unwrap(), 0);
    assert_eq!(fx.store.inventory_quantity(kept.inventory_id).unwrap(), Some(5));
    assert_eq!(fx.store.inventory_quantity(sold_a.inventory_id).unwrap(), Some(4));
    assert_eq!(fx.store.inventory_quantity(sold_b.inventory_id).unwrap(), Some(4));

    let suitcase = fx.store.get_suitcase(fx.suitcase.id).await.unwrap().unwrap();
    assert_eq!(suitcase.next_settlement_date, Some(date(2024, 7, 1)));
}

#[tokio::test]
async fn test_second_settlement_does_not_double_count() {
    let fx = Fixture::new(Some(dec("0.3")));
    let kept = fx.check_out(10).await;
    fx.check_out(20).await;
    fx.check_out(30).await;

    fx.settlements
        .create_settlement(fx.settle_input(vec![kept.id]))
        .await
        .unwrap();
    let second = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();

    assert_eq!(second.settlement.total_sales, Decimal::ZERO);
    assert_eq!(second.settlement.commission_amount, Decimal::ZERO);
    assert!(second.sold_items.is_empty());
    assert_eq!(fx.store.settlement_count().unwrap(), 2);
    assert_eq!(fx.store.all_sold_items().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_present_list_sells_everything() {
    let fx = Fixture::new(Some(dec("0.25")));
    fx.check_out(40).await;
    fx.check_out(60).await;

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();

    assert_eq!(details.sold_items.len(), 2);
    assert_eq!(details.settlement.total_sales, dec("100"));
    assert_eq!(details.settlement.commission_amount, dec("25"));
}

#[tokio::test]
async fn test_seller_without_rate_uses_default() {
    let fx = Fixture::new(None);
    fx.check_out(100).await;

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();

    assert_eq!(details.settlement.commission_amount, dec("30"));
}

#[tokio::test]
async fn test_unknown_present_ids_are_ignored() {
    let fx = Fixture::new(Some(dec("0.3")));
    let item = fx.check_out(15).await;

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![item.id, Uuid::new_v4()]))
        .await
        .unwrap();

    assert!(details.sold_items.is_empty());
    assert_eq!(details.settlement.total_sales, Decimal::ZERO);
}

#[tokio::test]
async fn test_pending_settlement_is_completed_in_place() {
    let fx = Fixture::new(Some(dec("0.3")));
    fx.check_out(20).await;

    let pending = fx
        .store
        .insert_settlement(NewSettlement {
            suitcase_id: fx.suitcase.id,
            seller_id: fx.seller.id,
            settlement_date: date(2024, 5, 20),
            next_settlement_date: None,
            total_sales: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            status: SettlementStatus::Pending,
        })
        .await
        .unwrap();

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();

    assert_eq!(details.settlement.id, pending.id);
    assert_eq!(details.settlement.status, SettlementStatus::Completed);
    assert_eq!(details.settlement.settlement_date, date(2024, 6, 1));
    assert_eq!(details.settlement.total_sales, dec("20"));
    assert_eq!(fx.store.settlement_count().unwrap(), 1);
}

#[tokio::test]
async fn test_sale_annotation_is_copied_to_sold_record() {
    let fx = Fixture::new(Some(dec("0.3")));
    let item = fx.check_out(35).await;
    fx.items
        .annotate_sale(
            item.id,
            AnnotateSaleInput {
                customer_name: Some("Maria".to_string()),
                payment_method: Some("pix".to_string()),
            },
        )
        .await
        .unwrap();

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();

    let record = &details.sold_items[0];
    assert_eq!(record.suitcase_item_id, item.id);
    assert_eq!(record.price, dec("35"));
    assert_eq!(record.customer_name.as_deref(), Some("Maria"));
    assert_eq!(record.payment_method.as_deref(), Some("pix"));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_unknown_suitcase_and_seller() {
    let fx = Fixture::new(None);

    let mut input = fx.settle_input(vec![]);
    input.suitcase_id = Uuid::new_v4();
    let err = fx.settlements.create_settlement(input).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref r) if r == "Suitcase"));

    let mut input = fx.settle_input(vec![]);
    input.seller_id = Uuid::new_v4();
    let err = fx.settlements.create_settlement(input).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref r) if r == "Seller"));
}

#[tokio::test]
async fn test_next_date_before_settlement_date_rejected() {
    let fx = Fixture::new(None);
    fx.check_out(10).await;

    let mut input = fx.settle_input(vec![]);
    input.next_settlement_date = Some(date(2024, 5, 1));
    let err = fx.settlements.create_settlement(input).await.unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "next_settlement_date"));
    assert_eq!(fx.store.settlement_count().unwrap(), 0);
}

// ============================================================================
// Partial Failures
// ============================================================================

#[tokio::test]
async fn test_sold_item_insert_failure_is_compensated() {
    let fx = Fixture::new(Some(dec("0.3")));
    let items = vec![
        fx.check_out(10).await,
        fx.check_out(20).await,
        fx.check_out(30).await,
    ];
    fx.store.fail_after(FailPoint::InsertSoldItem, 1, 1);

    let err = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));

    assert_eq!(fx.store.settlement_count().unwrap(), 0);
    assert!(fx.store.all_sold_items().unwrap().is_empty());
    for item in &items {
        let current = fx.store.get_suitcase_item(item.id).await.unwrap().unwrap();
        assert_eq!(current.status, ItemStatus::InPossession);
    }

    // Retry goes through cleanly
    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();
    assert_eq!(details.sold_items.len(), 3);
    assert_eq!(fx.store.all_sold_items().unwrap().len(), 3);
}

#[tokio::test]
async fn test_status_update_failure_restores_pending_settlement() {
    let fx = Fixture::new(Some(dec("0.3")));
    fx.check_out(10).await;
    fx.check_out(20).await;

    let pending = fx
        .store
        .insert_settlement(NewSettlement {
            suitcase_id: fx.suitcase.id,
            seller_id: fx.seller.id,
            settlement_date: date(2024, 5, 20),
            next_settlement_date: None,
            total_sales: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            status: SettlementStatus::Pending,
        })
        .await
        .unwrap();
    fx.store
        .fail_after(FailPoint::CompareAndSetItemStatus, 1, 1);

    fx.settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap_err();

    let restored = fx.store.get_settlement(pending.id).await.unwrap().unwrap();
    assert_eq!(restored.status, SettlementStatus::Pending);
    assert_eq!(restored.settlement_date, date(2024, 5, 20));
    assert_eq!(restored.total_sales, Decimal::ZERO);

    let in_possession = fx
        .store
        .list_suitcase_items(fx.suitcase.id, Some(ItemStatus::InPossession))
        .await
        .unwrap();
    assert_eq!(in_possession.len(), 2);
}

#[tokio::test]
async fn test_next_date_failure_keeps_financial_records() {
    let fx = Fixture::new(Some(dec("0.3")));
    fx.check_out(10).await;
    fx.store.fail_next(FailPoint::SetNextSettlementDate, 1);

    let err = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));

    // The settlement is durable and visible for inspection
    assert_eq!(fx.store.settlement_count().unwrap(), 1);
    assert_eq!(fx.store.all_sold_items().unwrap().len(), 1);
}

#[tokio::test]
async fn test_incomplete_cleanup_still_returns_settlement() {
    let fx = Fixture::new(Some(dec("0.3")));
    let kept = fx.check_out(10).await;
    let sold = fx.check_out(20).await;
    fx.store.fail_next(FailPoint::DeleteSuitcaseItems, 3);

    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![kept.id]))
        .await
        .unwrap();
    assert_eq!(details.settlement.total_sales, dec("20"));

    // Leftovers are visible: the sold item is sold, the present one is back in stock
    let sold_now = fx.store.get_suitcase_item(sold.id).await.unwrap().unwrap();
    let kept_now = fx.store.get_suitcase_item(kept.id).await.unwrap().unwrap();
    assert_eq!(sold_now.status, ItemStatus::Sold);
    assert_eq!(kept_now.status, ItemStatus::Returned);
    assert_eq!(fx.store.inventory_quantity(kept.inventory_id).unwrap(), Some(5));
}

// ============================================================================
// Status, Listing and Receipts
// ============================================================================

#[tokio::test]
async fn test_pending_settlement_can_be_completed() {
    let fx = Fixture::new(None);
    let pending = fx
        .store
        .insert_settlement(NewSettlement {
            suitcase_id: fx.suitcase.id,
            seller_id: fx.seller.id,
            settlement_date: date(2024, 5, 20),
            next_settlement_date: None,
            total_sales: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            status: SettlementStatus::Pending,
        })
        .await
        .unwrap();

    let completed = fx
        .settlements
        .update_settlement_status(
            pending.id,
            UpdateSettlementStatusInput {
                status: SettlementStatus::Completed,
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.status, SettlementStatus::Completed);

    let err = fx
        .settlements
        .update_settlement_status(
            Uuid::new_v4(),
            UpdateSettlementStatusInput {
                status: SettlementStatus::Completed,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_completed_settlement_cannot_be_reopened() {
    let fx = Fixture::new(Some(dec("0.3")));
    fx.check_out(10).await;
    fx.check_out(20).await;
    let first = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();
    assert_eq!(first.settlement.total_sales, dec("30"));

    let err = fx
        .settlements
        .update_settlement_status(
            first.settlement.id,
            UpdateSettlementStatusInput {
                status: SettlementStatus::Pending,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // The next settlement is a fresh record; the first keeps its totals and records
    fx.check_out(5).await;
    let second = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();
    assert_ne!(second.settlement.id, first.settlement.id);
    assert_eq!(second.settlement.total_sales, dec("5"));

    let first_now = fx
        .store
        .get_settlement(first.settlement.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first_now.status, SettlementStatus::Completed);
    assert_eq!(first_now.total_sales, dec("30"));
    assert_eq!(first_now.commission_amount, dec("9"));
    assert_eq!(
        fx.store
            .list_sold_items(first.settlement.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_settlements_sell_each_item_once() {
    let fx = Fixture::new(Some(dec("0.3")));
    fx.check_out(10).await;
    fx.check_out(20).await;

    let a = fx.settlements.clone();
    let b = fx.settlements.clone();
    let input_a = fx.settle_input(vec![]);
    let input_b = fx.settle_input(vec![]);
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.create_settlement(input_a).await }),
        tokio::spawn(async move { b.create_settlement(input_b).await }),
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    let mut totals = vec![first.settlement.total_sales, second.settlement.total_sales];
    totals.sort();
    assert_eq!(totals, vec![Decimal::ZERO, dec("30")]);
    assert_ne!(first.settlement.id, second.settlement.id);
    assert_eq!(fx.store.all_sold_items().unwrap().len(), 2);
    assert_eq!(fx.store.count_suitcase_items(fx.suitcase.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_settlements_filters() {
    let fx = Fixture::new(None);
    fx.settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();

    let mut later = fx.settle_input(vec![]);
    later.settlement_date = date(2024, 8, 1);
    later.next_settlement_date = None;
    fx.settlements.create_settlement(later).await.unwrap();

    let all = fx
        .settlements
        .list_settlements(SettlementFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].settlement_date, date(2024, 8, 1));

    let june = fx
        .settlements
        .list_settlements(SettlementFilter {
            from: Some(date(2024, 6, 1)),
            to: Some(date(2024, 6, 30)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(june.len(), 1);

    let err = fx
        .settlements
        .list_settlements(SettlementFilter {
            from: Some(date(2024, 7, 1)),
            to: Some(date(2024, 6, 1)),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_generate_receipt_stores_url_and_digest() {
    let fx = Fixture::new(Some(dec("0.3")));
    fx.check_out(10).await;
    let details = fx
        .settlements
        .create_settlement(fx.settle_input(vec![]))
        .await
        .unwrap();
    assert!(details.settlement.receipt_url.is_none());

    let settlement = fx
        .settlements
        .generate_receipt(details.settlement.id)
        .await
        .unwrap();

    assert_eq!(
        settlement.receipt_url,
        Some(format!("/receipts/acerto-{}.csv", settlement.id))
    );
    let digest = settlement.receipt_digest.unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Items not confirmed present are exactly the sold set and the total is their price sum
        #[test]
        fn prop_sold_set_is_complement_of_present(
            items in prop::collection::vec((1i64..500, any::<bool>()), 0..8),
            rate_pct in 0i64..=100
        ) {
            let rate = Decimal::new(rate_pct, 2);
            let fx = Fixture::new(Some(rate));

            let (expected_sold, expected_total, details) = tokio_test::block_on(async {
                let mut present = Vec::new();
                let mut expected_sold = HashSet::new();
                let mut expected_total = Decimal::ZERO;

                for (price, is_present) in &items {
                    let item = fx.check_out(*price).await;
                    if *is_present {
                        present.push(item.id);
                    } else {
                        expected_sold.insert(item.id);
                        expected_total += Decimal::from(*price);
                    }
                }

                let details = fx
                    .settlements
                    .create_settlement(fx.settle_input(present))
                    .await
                    .unwrap();
                (expected_sold, expected_total, details)
            });

            let sold: HashSet<Uuid> = details.sold_item_ids().collect();
            prop_assert_eq!(sold, expected_sold);
            prop_assert_eq!(details.settlement.total_sales, expected_total);
            prop_assert_eq!(details.settlement.commission_amount, expected_total * rate);

            let remaining = tokio_test::block_on(fx.store.count_suitcase_items(fx.suitcase.id)).unwrap();
            prop_assert_eq!(remaining, 0);
        }
    }
}
