//! End-to-end checkout, refund and stock tests against an in-memory store.

mod common;

use common::*;
use medix_core::{
    MovementReason, NewBatch, PaymentMethod, SaleStatus, ValidationError, MAX_BATCH_QUANTITY,
    MAX_PRICE_CENTS,
};
use medix_settlement::{CheckoutRequest, RefundRequest, RestockPolicy, SettlementError};
use rust_decimal::Decimal;

fn cart() -> CheckoutRequest {
    CheckoutRequest::new("staff-1", PaymentMethod::Cash)
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_allocates_fefo_across_batches() {
    let engine = memory_engine().await;
    let paracetamol = add_medicine(&engine, "Paracetamol 500mg").await;
    // Received out of expiry order on purpose
    let b2 = add_batch(&engine, &paracetamol, "B2", 10, date(2025, 6, 1), 300).await;
    let b1 = add_batch(&engine, &paracetamol, "B1", 5, date(2025, 1, 1), 250).await;

    let record = engine.checkout(&cart().line(&paracetamol.id, 8)).await.unwrap();

    assert_eq!(record.lines.len(), 2);
    assert_eq!(record.lines[0].batch_id, b1.id);
    assert_eq!(record.lines[0].quantity, 5);
    assert_eq!(record.lines[0].line_no, 0);
    assert_eq!(record.lines[1].batch_id, b2.id);
    assert_eq!(record.lines[1].quantity, 3);
    assert_eq!(record.lines[1].batch_number, "B2");
    assert_eq!(record.lines[1].medicine_name, "Paracetamol 500mg");

    assert_eq!(quantity(&engine, &b1).await, 0);
    assert_eq!(quantity(&engine, &b2).await, 7);

    // 5 × 2.50 + 3 × 3.00 = 21.50, VAT 2.795 → 2.80
    let sale = &record.sale;
    assert_eq!(sale.status, SaleStatus::Completed);
    assert_eq!(sale.subtotal_cents, 2150);
    assert_eq!(sale.discount_cents, 0);
    assert_eq!(sale.vat_cents, 280);
    assert_eq!(sale.total_cents, 2430);
    assert_eq!(
        record.lines.iter().map(|l| l.subtotal_cents).sum::<i64>(),
        sale.subtotal_cents
    );
    assert_eq!(
        sale.total_cents,
        sale.subtotal_cents - sale.discount_cents + sale.vat_cents
    );
}

#[tokio::test]
async fn test_checkout_is_persisted_as_returned() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Cetirizine 10mg").await;
    let batch = add_batch(&engine, &med, "LOT-1", 20, date(2025, 3, 1), 120).await;

    let request = cart()
        .line(&med.id, 4)
        .customer(Some("  Ayesha Khan "), Some("+92 300 1234567"));
    let record = engine.checkout(&request).await.unwrap();

    let stored = engine.sale(&record.sale.invoice_number).await.unwrap();
    assert_eq!(stored.sale.id, record.sale.id);
    assert_eq!(stored.sale.total_cents, record.sale.total_cents);
    assert_eq!(stored.sale.customer_name.as_deref(), Some("Ayesha Khan"));
    assert_eq!(stored.lines.len(), 1);
    assert_eq!(stored.lines[0].id, record.lines[0].id);
    assert!(stored.refunds.is_empty());

    let movements = engine.database().batches().movements_for_batch(&batch.id).await.unwrap();
    let sale_movement = movements
        .iter()
        .find(|m| m.reason == MovementReason::Sale)
        .unwrap();
    assert_eq!(sale_movement.delta, -4);
    assert_eq!(sale_movement.reference.as_deref(), Some(record.sale.invoice_number.as_str()));
}

#[tokio::test]
async fn test_checkout_applies_discount_then_vat() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Amoxicillin 250mg").await;
    add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 1000).await;

    let record = engine
        .checkout(&cart().line(&med.id, 3).discount(Decimal::from(10)))
        .await
        .unwrap();

    assert_eq!(record.sale.discount_bps, 1000);
    assert_eq!(record.sale.subtotal_cents, 3000);
    assert_eq!(record.sale.discount_cents, 300);
    assert_eq!(record.sale.vat_cents, 351);
    assert_eq!(record.sale.total_cents, 3051);
}

#[tokio::test]
async fn test_insufficient_stock_changes_nothing() {
    let engine = memory_engine().await;
    let plenty = add_medicine(&engine, "Ibuprofen 200mg").await;
    let scarce = add_medicine(&engine, "Insulin Glargine").await;
    let plenty_batch = add_batch(&engine, &plenty, "LOT-1", 10, date(2025, 3, 1), 100).await;
    let scarce_batch = add_batch(&engine, &scarce, "LOT-1", 2, date(2025, 3, 1), 5000).await;

    let err = engine
        .checkout(&cart().line(&plenty.id, 3).line(&scarce.id, 5))
        .await
        .unwrap_err();

    match err {
        SettlementError::InsufficientStock {
            medicine_id,
            medicine_name,
            available,
            requested,
        } => {
            assert_eq!(medicine_id, scarce.id);
            assert_eq!(medicine_name, "Insulin Glargine");
            assert_eq!(available, 2);
            assert_eq!(requested, 5);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    assert_eq!(quantity(&engine, &plenty_batch).await, 10);
    assert_eq!(quantity(&engine, &scarce_batch).await, 2);
    assert_eq!(sale_count(&engine).await, 0);
}

#[tokio::test]
async fn test_expired_and_expiring_today_batches_are_not_sold() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Salbutamol Inhaler").await;
    let expired = add_batch(&engine, &med, "OLD", 50, date(2024, 11, 1), 900).await;
    let expiring = add_batch(&engine, &med, "TODAY", 50, today(), 900).await;
    let fresh = add_batch(&engine, &med, "NEW", 2, date(2025, 8, 1), 950).await;

    let err = engine.checkout(&cart().line(&med.id, 3)).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InsufficientStock { available: 2, requested: 3, .. }
    ));

    let record = engine.checkout(&cart().line(&med.id, 2)).await.unwrap();
    assert_eq!(record.lines.len(), 1);
    assert_eq!(record.lines[0].batch_id, fresh.id);
    assert_eq!(quantity(&engine, &expired).await, 50);
    assert_eq!(quantity(&engine, &expiring).await, 50);
}

#[tokio::test]
async fn test_two_lines_for_one_medicine_share_stock() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Omeprazole 20mg").await;
    let batch = add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 200).await;

    let err = engine
        .checkout(&cart().line(&med.id, 6).line(&med.id, 5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InsufficientStock { available: 4, requested: 5, .. }
    ));
    assert_eq!(quantity(&engine, &batch).await, 10);

    let record = engine
        .checkout(&cart().line(&med.id, 6).line(&med.id, 4))
        .await
        .unwrap();
    assert_eq!(record.lines.len(), 2);
    assert_eq!(record.sale.subtotal_cents, 2000);
    assert_eq!(quantity(&engine, &batch).await, 0);
}

#[tokio::test]
async fn test_zero_quantity_is_rejected() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Metformin 500mg").await;
    let batch = add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 80).await;

    let err = engine.checkout(&cart().line(&med.id, 0)).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::MustBePositive { .. })
    ));
    assert_eq!(quantity(&engine, &batch).await, 10);
    assert_eq!(sale_count(&engine).await, 0);
}

#[tokio::test]
async fn test_unknown_and_inactive_medicines() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Ranitidine 150mg").await;
    add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 80).await;

    let err = engine
        .checkout(&cart().line("00000000-0000-4000-8000-000000000000", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::MedicineNotFound { .. }));

    engine.database().medicines().set_active(&med.id, false).await.unwrap();
    let err = engine.checkout(&cart().line(&med.id, 1)).await.unwrap_err();
    assert!(matches!(err, SettlementError::MedicineInactive { .. }));
    assert_eq!(sale_count(&engine).await, 0);
}

#[tokio::test]
async fn test_invoice_collision_draws_a_new_number() {
    let engine = memory_engine().await.with_invoice_generator(ScriptedInvoices::new(&[
        "INV-241201-AAAAAAAA",
        "INV-241201-AAAAAAAA",
        "INV-241201-BBBBBBBB",
    ]));
    let med = add_medicine(&engine, "Azithromycin 500mg").await;
    add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 400).await;

    let first = engine.checkout(&cart().line(&med.id, 1)).await.unwrap();
    let second = engine.checkout(&cart().line(&med.id, 1)).await.unwrap();

    assert_eq!(first.sale.invoice_number, "INV-241201-AAAAAAAA");
    assert_eq!(second.sale.invoice_number, "INV-241201-BBBBBBBB");
    assert_eq!(sale_count(&engine).await, 2);

    // The first sale was not overwritten
    let stored = engine.sale("INV-241201-AAAAAAAA").await.unwrap();
    assert_eq!(stored.sale.id, first.sale.id);
}

#[tokio::test]
async fn test_invoice_attempts_are_bounded() {
    let engine = memory_engine()
        .await
        .with_invoice_generator(ScriptedInvoices::new(&["INV-241201-CCCCCCCC"]))
        .with_max_invoice_attempts(3);
    let med = add_medicine(&engine, "Amlodipine 5mg").await;
    let batch = add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 150).await;

    engine.checkout(&cart().line(&med.id, 1)).await.unwrap();
    let err = engine.checkout(&cart().line(&med.id, 1)).await.unwrap_err();

    match err {
        SettlementError::Persistence(db) => assert!(db.is_unique_violation_on("invoice_number")),
        other => panic!("expected Persistence, got {:?}", other),
    }
    assert_eq!(quantity(&engine, &batch).await, 9);
    assert_eq!(sale_count(&engine).await, 1);
}

#[tokio::test]
async fn test_failure_after_decrement_rolls_everything_back() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Metformin 500mg").await;
    let b1 = add_batch(&engine, &med, "B1", 5, date(2025, 1, 1), 120).await;
    let b2 = add_batch(&engine, &med, "B2", 10, date(2025, 6, 1), 130).await;

    // Sale lines are written after the header and the batch decrements
    sqlx::query(
        "CREATE TRIGGER reject_sale_lines BEFORE INSERT ON sale_lines \
         BEGIN SELECT RAISE(ABORT, 'sale lines rejected'); END",
    )
    .execute(engine.database().pool())
    .await
    .unwrap();

    let err = engine.checkout(&cart().line(&med.id, 8)).await.unwrap_err();
    assert!(matches!(err, SettlementError::Persistence(_)), "got {:?}", err);

    assert_eq!(quantity(&engine, &b1).await, 5);
    assert_eq!(quantity(&engine, &b2).await, 10);
    assert_eq!(sale_count(&engine).await, 0);

    for batch in [&b1, &b2] {
        let movements = engine
            .database()
            .batches()
            .movements_for_batch(&batch.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reason, MovementReason::Receipt);
    }
}

#[tokio::test]
async fn test_checkout_of_most_expensive_batch_prices_exactly() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Monoclonal Antibody Vial").await;
    add_batch(&engine, &med, "LOT-1", 999, date(2025, 3, 1), MAX_PRICE_CENTS).await;

    let record = engine.checkout(&cart().line(&med.id, 999)).await.unwrap();

    let subtotal = 999 * MAX_PRICE_CENTS;
    assert_eq!(record.sale.subtotal_cents, subtotal);
    assert_eq!(record.sale.vat_cents, subtotal / 100 * 13);
    assert_eq!(record.sale.total_cents, subtotal + record.sale.vat_cents);
}

#[tokio::test]
async fn test_oversized_stored_amounts_are_rejected_not_overflowed() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Imported Stock").await;
    let batches = engine.database().batches();

    // Rows written straight through the repository skip receipt validation
    let receipt = |number: &str, quantity: i64, price: i64| NewBatch {
        medicine_id: med.id.clone(),
        batch_number: number.to_string(),
        quantity,
        expiry_date: date(2025, 3, 1),
        manufactured_date: date(2024, 1, 1),
        sale_price_cents: price,
        purchase_cost_cents: 0,
    };
    batches.receive(&receipt("BIG-1", i64::MAX, 100), None).await.unwrap();
    batches.receive(&receipt("BIG-2", i64::MAX, 100), None).await.unwrap();

    let record = engine.checkout(&cart().line(&med.id, 1)).await.unwrap();
    assert_eq!(record.sale.subtotal_cents, 100);

    let pricey = add_medicine(&engine, "Mispriced Import").await;
    let mut row = receipt("PRICEY", 20, i64::MAX / 10);
    row.medicine_id = pricey.id.clone();
    batches.receive(&row, None).await.unwrap();

    let err = engine.checkout(&cart().line(&pricey.id, 11)).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::InvalidFormat { .. })
    ));
    assert_eq!(sale_count(&engine).await, 1);
}

// =============================================================================
// Refund
// =============================================================================

#[tokio::test]
async fn test_full_refund_restores_every_batch() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Paracetamol 500mg").await;
    let b1 = add_batch(&engine, &med, "B1", 5, date(2025, 1, 1), 250).await;
    let b2 = add_batch(&engine, &med, "B2", 10, date(2025, 6, 1), 300).await;

    let sold = engine.checkout(&cart().line(&med.id, 8)).await.unwrap();
    let request =
        RefundRequest::full(&sold.sale.invoice_number, "staff-2").reason("customer return");
    let refunded = engine
        .refund(&request)
        .await
        .unwrap();

    assert_eq!(quantity(&engine, &b1).await, 5);
    assert_eq!(quantity(&engine, &b2).await, 10);

    assert_eq!(refunded.sale.status, SaleStatus::Refunded);
    assert_eq!(refunded.sale.total_cents, 0);
    assert_eq!(refunded.sale.subtotal_cents, 0);
    assert_eq!(refunded.sale.vat_cents, 0);
    assert_eq!(refunded.sale.refunded_cents, sold.sale.total_cents);
    assert_eq!(refunded.sale.version, sold.sale.version + 1);

    // Sale lines are never rewritten; the reversal lives in refund lines
    assert_eq!(refunded.lines.len(), 2);
    assert_eq!(refunded.lines[0].quantity, 5);
    assert_eq!(refunded.refunds.len(), 2);
    assert!(refunded.refunds.iter().all(|r| r.restocked));
    assert!(refunded
        .refunds
        .iter()
        .all(|r| r.reason.as_deref() == Some("customer return")));

    let err = engine
        .refund(&RefundRequest::full(&sold.sale.invoice_number, "staff-2"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidSaleStatus {
            status: SaleStatus::Refunded,
            ..
        }
    ));
}

#[tokio::test]
async fn test_partial_refunds_then_the_rest() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Paracetamol 500mg").await;
    let b1 = add_batch(&engine, &med, "B1", 5, date(2025, 1, 1), 250).await;
    let b2 = add_batch(&engine, &med, "B2", 10, date(2025, 6, 1), 300).await;

    let sold = engine.checkout(&cart().line(&med.id, 8)).await.unwrap();
    let b2_line = sold.lines[1].id.clone();

    let partial = engine
        .refund(&RefundRequest::full(&sold.sale.invoice_number, "staff-1").line(&b2_line, 2))
        .await
        .unwrap();

    // Remaining 5 × 2.50 + 1 × 3.00 = 15.50, VAT 2.015 → 2.02
    assert_eq!(partial.sale.status, SaleStatus::PartiallyRefunded);
    assert_eq!(partial.sale.subtotal_cents, 1550);
    assert_eq!(partial.sale.vat_cents, 202);
    assert_eq!(partial.sale.total_cents, 1752);
    assert_eq!(partial.sale.refunded_cents, 2430 - 1752);
    assert_eq!(partial.remaining_quantity(&partial.lines[1]), 1);
    assert_eq!(quantity(&engine, &b2).await, 9);

    // More than remains on the line
    let err = engine
        .refund(&RefundRequest::full(&sold.sale.invoice_number, "staff-1").line(&b2_line, 2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::OutOfRange { max: 1, .. })
    ));

    let rest = engine
        .refund(&RefundRequest::full(&sold.sale.invoice_number, "staff-1"))
        .await
        .unwrap();
    assert_eq!(rest.sale.status, SaleStatus::Refunded);
    assert_eq!(rest.sale.total_cents, 0);
    assert_eq!(rest.sale.refunded_cents, 2430);
    assert_eq!(quantity(&engine, &b1).await, 5);
    assert_eq!(quantity(&engine, &b2).await, 10);
}

#[tokio::test]
async fn test_refund_keeps_discount_rate() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Clotrimazole Cream").await;
    add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 1000).await;

    let sold = engine
        .checkout(&cart().line(&med.id, 3).discount(Decimal::from(10)))
        .await
        .unwrap();
    let request =
        RefundRequest::full(&sold.sale.invoice_number, "staff-1").line(&sold.lines[0].id, 1);
    let partial = engine
        .refund(&request)
        .await
        .unwrap();

    // 2 × 10.00 = 20.00, 10% off = 18.00, VAT 2.34
    assert_eq!(partial.sale.discount_bps, 1000);
    assert_eq!(partial.sale.discount_cents, 200);
    assert_eq!(partial.sale.vat_cents, 234);
    assert_eq!(partial.sale.total_cents, 2034);
}

#[tokio::test]
async fn test_unsellable_refund_leaves_ledger_alone() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Ondansetron Injection").await;
    let batch = add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 700).await;

    let sold = engine.checkout(&cart().line(&med.id, 4)).await.unwrap();
    let refunded = engine
        .refund(
            &RefundRequest::full(&sold.sale.invoice_number, "staff-1")
                .restock(RestockPolicy::Unsellable)
                .reason("cold chain broken"),
        )
        .await
        .unwrap();

    assert_eq!(refunded.sale.status, SaleStatus::Refunded);
    assert_eq!(refunded.refunds.len(), 1);
    assert!(!refunded.refunds[0].restocked);
    assert_eq!(quantity(&engine, &batch).await, 6);
}

#[tokio::test]
async fn test_refund_rejects_foreign_lines_and_unknown_invoices() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Dextromethorphan Syrup").await;
    let batch = add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 350).await;

    let first = engine.checkout(&cart().line(&med.id, 1)).await.unwrap();
    let second = engine.checkout(&cart().line(&med.id, 1)).await.unwrap();

    let request =
        RefundRequest::full(&first.sale.invoice_number, "staff-1").line(&second.lines[0].id, 1);
    let err = engine
        .refund(&request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::InvalidFormat { .. })
    ));

    let err = engine
        .refund(&RefundRequest::full("INV-000000-00000000", "staff-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::SaleNotFound { .. }));

    assert_eq!(quantity(&engine, &batch).await, 8);
}

// =============================================================================
// Stock
// =============================================================================

#[tokio::test]
async fn test_receive_batch_rejects_duplicates_and_bad_dates() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Ciprofloxacin Drops").await;
    let batch = add_batch(&engine, &med, "LOT-7", 10, date(2025, 3, 1), 300).await;
    assert_eq!(batch.version, 0);

    let mut again = NewBatch {
        medicine_id: med.id.clone(),
        batch_number: "LOT-7".to_string(),
        quantity: 5,
        expiry_date: date(2025, 9, 1),
        manufactured_date: date(2024, 9, 1),
        sale_price_cents: 300,
        purchase_cost_cents: 200,
    };
    let err = engine.receive_batch(&again, None).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::Duplicate { .. })
    ));

    again.batch_number = "LOT-8".to_string();
    again.expiry_date = date(2024, 8, 1);
    let err = engine.receive_batch(&again, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidInput(_)));

    again.expiry_date = date(2025, 9, 1);
    again.medicine_id = "00000000-0000-4000-8000-000000000000".to_string();
    let err = engine.receive_batch(&again, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::MedicineNotFound { .. }));
}

#[tokio::test]
async fn test_receive_batch_rejects_oversized_price_and_quantity() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Insulin Glargine").await;

    let mut receipt = NewBatch {
        medicine_id: med.id.clone(),
        batch_number: "LOT-1".to_string(),
        quantity: 20,
        expiry_date: date(2025, 9, 1),
        manufactured_date: date(2024, 9, 1),
        sale_price_cents: i64::MAX / 10,
        purchase_cost_cents: 100,
    };
    let err = engine.receive_batch(&receipt, None).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::OutOfRange { max: MAX_PRICE_CENTS, .. })
    ));

    receipt.sale_price_cents = 2_500;
    receipt.quantity = i64::MAX;
    let err = engine.receive_batch(&receipt, None).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::OutOfRange { max: MAX_BATCH_QUANTITY, .. })
    ));

    let on_hand = engine.database().batches().quantity_on_hand(&med.id).await.unwrap();
    assert_eq!(on_hand, 0);
}

#[tokio::test]
async fn test_adjust_stock_never_goes_negative() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Oral Rehydration Salts").await;
    let batch = add_batch(&engine, &med, "LOT-1", 10, date(2025, 3, 1), 60).await;

    let adjusted = engine.adjust_stock(&batch.id, -3, Some("damaged")).await.unwrap();
    assert_eq!(adjusted.quantity, 7);
    assert_eq!(adjusted.version, batch.version + 1);

    let err = engine.adjust_stock(&batch.id, -8, None).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InvalidInput(ValidationError::OutOfRange { min: -7, .. })
    ));
    assert!(engine.adjust_stock(&batch.id, 0, None).await.is_err());
    assert!(matches!(
        engine.adjust_stock(&batch.id, i64::MAX, None).await,
        Err(SettlementError::InvalidInput(ValidationError::OutOfRange { .. }))
    ));
    assert!(matches!(
        engine.adjust_stock(&batch.id, MAX_BATCH_QUANTITY, None).await,
        Err(SettlementError::InvalidInput(ValidationError::OutOfRange { max, .. }))
            if max == MAX_BATCH_QUANTITY - 7
    ));
    assert!(matches!(
        engine.adjust_stock("missing", 1, None).await,
        Err(SettlementError::BatchNotFound { .. })
    ));

    let movements = engine
        .database()
        .batches()
        .movements_for_batch(&batch.id)
        .await
        .unwrap();
    let net: i64 = movements.iter().map(|m| m.delta).sum();
    assert_eq!(net, 7);
    assert!(movements.iter().any(|m| {
        m.reason == MovementReason::Adjustment && m.reference.as_deref() == Some("damaged")
    }));
}

#[tokio::test]
async fn test_stock_level_separates_on_hand_from_sellable() {
    let engine = memory_engine().await;
    let med = add_medicine(&engine, "Salbutamol Inhaler").await;
    let expired = add_batch(&engine, &med, "OLD", 4, date(2024, 11, 1), 900).await;
    add_batch(&engine, &med, "NEW", 6, date(2025, 11, 1), 950).await;
    add_batch(&engine, &med, "MID", 3, date(2025, 2, 1), 920).await;
    engine.checkout(&cart().line(&med.id, 2)).await.unwrap();

    let level = engine.stock_level(&med.id).await.unwrap();
    assert_eq!(level.medicine.id, med.id);
    assert_eq!(level.on_hand, 4 + 6 + 3 - 2);
    assert_eq!(level.sellable, 6 + 3 - 2);

    let numbers: Vec<&str> = level.batches.iter().map(|b| b.batch_number.as_str()).collect();
    assert_eq!(numbers, vec!["OLD", "MID", "NEW"]);
    assert_eq!(level.batches[0].id, expired.id);

    assert!(matches!(
        engine.stock_level("missing").await,
        Err(SettlementError::MedicineNotFound { .. })
    ));
}

#[tokio::test]
async fn test_active_medicines_hide_withdrawn_ones() {
    let engine = memory_engine().await;
    let kept = add_medicine(&engine, "Zinc Sulfate").await;
    let withdrawn = add_medicine(&engine, "Ranitidine 150mg").await;
    add_medicine(&engine, "Azithromycin 250mg").await;

    engine
        .database()
        .medicines()
        .set_active(&withdrawn.id, false)
        .await
        .unwrap();

    let names: Vec<String> = engine
        .active_medicines()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["Azithromycin 250mg".to_string(), kept.name]);
}

#[tokio::test]
async fn test_sale_lookup_of_unknown_invoice() {
    let engine = memory_engine().await;
    assert!(matches!(
        engine.sale("INV-991231-FFFFFFFF").await,
        Err(SettlementError::SaleNotFound { .. })
    ));
}
