//! Integration tests for the sales pipeline.
//!
//! Tests: receive → quote → draft → commit → reverse, over the in-memory store.
//!
//! Verifies:
//! - Commit is all-or-nothing and re-checks availability
//! - Concurrent commits over a shared item yield exactly one winner
//! - Returns flip items back and are rejected the second time
//! - The checkout terminal persists and resumes its session

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;

    use goldline_core::{Conflict, CustomerId, Dependency, DomainError, ItemId, TransactionId};
    use goldline_inventory::{InventoryItem, ReceiveItem};
    use goldline_parties::{ContactInfo, Customer, CustomerRef};
    use goldline_pricing::{Currency, MarketRate, PricingConfig, PricingError, PricingMode};
    use goldline_sales::{DraftOrder, PaymentFields, ReferenceNumber, ResumeOutcome, WizardStep};

    use crate::config::AppConfig;
    use crate::customers::InMemoryCustomerDirectory;
    use crate::engine::SalesEngine;
    use crate::rates::InMemoryRateSource;
    use crate::session::InMemorySessionStorage;
    use crate::store::{InMemorySalesStore, SalesStore};
    use crate::terminal::CheckoutTerminal;

    type TestEngine = SalesEngine<Arc<InMemorySalesStore>, Arc<InMemoryRateSource>>;
    type TestTerminal = CheckoutTerminal<
        Arc<InMemorySalesStore>,
        Arc<InMemoryRateSource>,
        Arc<InMemorySessionStorage>,
        Arc<InMemoryCustomerDirectory>,
    >;

    fn setup() -> (Arc<TestEngine>, Arc<InMemorySalesStore>, Arc<InMemoryRateSource>) {
        let store = Arc::new(InMemorySalesStore::new());
        let rates = Arc::new(InMemoryRateSource::new());
        let engine = Arc::new(SalesEngine::new(
            store.clone(),
            rates.clone(),
            PricingConfig::default(),
            Duration::hours(1),
        ));
        (engine, store, rates)
    }

    fn receive_cmd(barcode: &str) -> ReceiveItem {
        ReceiveItem {
            item_id: ItemId::new(),
            barcode: barcode.to_string(),
            name: format!("Bangle {barcode}"),
            category: "bangles".to_string(),
            weight_grams: Decimal::from(10),
            purity_karat: Decimal::from(18),
            acquisition_cost: Decimal::from(15000),
            occurred_at: Utc::now(),
        }
    }

    async fn receive(engine: &TestEngine, barcode: &str) -> InventoryItem {
        engine.receive_item(receive_cmd(barcode)).await.unwrap()
    }

    fn fixed(amount: i64) -> PricingMode {
        PricingMode::Fixed {
            amount: Decimal::from(amount),
            currency: Currency::Irr,
        }
    }

    async fn draft_of(engine: &TestEngine, items: &[&InventoryItem]) -> DraftOrder {
        let mut draft = DraftOrder::new(Utc::now());
        for item in items {
            let (current, quote) = engine.quote_item(item.id_typed(), fixed(1000)).await.unwrap();
            draft.add_line(&current, quote).unwrap();
        }
        draft
    }

    fn test_customer() -> CustomerRef {
        CustomerRef::new(CustomerId::new(), "Sara Ahmadi", "09121234567").unwrap()
    }

    fn test_payment(reference: &str, tendered: i64) -> PaymentFields {
        PaymentFields {
            amount_tendered: Decimal::from(tendered),
            reference_number: reference.to_string(),
            ..PaymentFields::default()
        }
    }

    async fn is_available(store: &InMemorySalesStore, item: &InventoryItem) -> bool {
        store
            .item(item.id_typed())
            .await
            .unwrap()
            .unwrap()
            .is_available()
    }

    #[tokio::test]
    async fn commit_sells_every_item_and_clears_the_draft() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "A-1").await;
        let b = receive(&engine, "B-1").await;
        let mut draft = draft_of(&engine, &[&a, &b]).await;

        let tx = engine
            .commit(&mut draft, &test_customer(), &test_payment("1001", 1500))
            .await
            .unwrap();

        assert!(draft.is_empty());
        assert_eq!(tx.lines.len(), 2);
        assert_eq!(tx.totals.gross, Decimal::from(2000));
        assert_eq!(tx.totals.paid, Decimal::from(1500));
        assert_eq!(tx.totals.remaining_balance, Decimal::from(500));
        assert!(!is_available(&store, &a).await);
        assert!(!is_available(&store, &b).await);

        let found = engine
            .find_by_reference(ReferenceNumber::new(1001).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, tx.id);

        let movements = engine.movements(a.id_typed()).await.unwrap();
        let types: Vec<&str> = movements.iter().map(|m| m.event_type()).collect();
        assert_eq!(types, vec!["inventory.item.received", "inventory.item.sold"]);
        assert_eq!(movements[1].sequence_number(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_over_a_shared_item_yield_one_winner() {
        for round in 0..20 {
            let (engine, store, _) = setup();
            let shared = receive(&engine, &format!("S-{round}")).await;
            let only_a = receive(&engine, &format!("X-{round}")).await;
            let only_b = receive(&engine, &format!("Y-{round}")).await;

            let draft_a = draft_of(&engine, &[&shared, &only_a]).await;
            let draft_b = draft_of(&engine, &[&only_b, &shared]).await;

            let spawn_commit = |mut draft: DraftOrder, reference: &'static str| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .commit(&mut draft, &test_customer(), &test_payment(reference, 2000))
                        .await
                })
            };
            let first = spawn_commit(draft_a, "1");
            let second = spawn_commit(draft_b, "2");
            let results = vec![first.await.unwrap(), second.await.unwrap()];

            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "round {round}: exactly one commit must succeed");

            for result in &results {
                if let Err(err) = result {
                    match err {
                        DomainError::Conflict(Conflict::ItemNoLongerAvailable { item_id }) => {
                            assert_eq!(*item_id, shared.id_typed())
                        }
                        _ => panic!("Expected ItemNoLongerAvailable, got {err:?}"),
                    }
                }
            }

            // The loser's exclusive item is untouched.
            let a_won = results[0].is_ok();
            let loser_item = if a_won { &only_b } else { &only_a };
            assert!(is_available(&store, loser_item).await);
            assert!(!is_available(&store, &shared).await);
        }
    }

    #[tokio::test]
    async fn unavailable_item_fails_the_whole_commit() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "A-2").await;
        let b = receive(&engine, "B-2").await;
        let mut ours = draft_of(&engine, &[&a, &b]).await;

        // Another terminal sells `a` first.
        let mut theirs = draft_of(&engine, &[&a]).await;
        engine
            .commit(&mut theirs, &test_customer(), &test_payment("50", 1000))
            .await
            .unwrap();

        let err = engine
            .commit(&mut ours, &test_customer(), &test_payment("51", 2000))
            .await
            .unwrap_err();
        match err {
            DomainError::Conflict(Conflict::ItemNoLongerAvailable { item_id }) => {
                assert_eq!(item_id, a.id_typed())
            }
            _ => panic!("Expected ItemNoLongerAvailable"),
        }

        assert_eq!(ours.lines().len(), 2);
        assert!(is_available(&store, &b).await);
        assert!(
            engine
                .find_by_reference(ReferenceNumber::new(51).unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn storage_failure_leaves_no_partial_state() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "A-3").await;
        let mut draft = draft_of(&engine, &[&a]).await;

        store.set_offline(true);
        let err = engine
            .commit(&mut draft, &test_customer(), &test_payment("77", 1000))
            .await
            .unwrap_err();
        match err {
            DomainError::Dependency { dependency, .. } => assert_eq!(dependency, Dependency::Store),
            _ => panic!("Expected Dependency error"),
        }
        store.set_offline(false);

        assert_eq!(draft.lines().len(), 1);
        assert!(is_available(&store, &a).await);
        assert_eq!(engine.movements(a.id_typed()).await.unwrap().len(), 1);

        // Retry after checking the reference is unused.
        let reference = ReferenceNumber::new(77).unwrap();
        assert!(engine.find_by_reference(reference).await.unwrap().is_none());
        engine
            .commit(&mut draft, &test_customer(), &test_payment("77", 1000))
            .await
            .unwrap();
        assert!(!is_available(&store, &a).await);
    }

    #[tokio::test]
    async fn invalid_reference_is_rejected_before_any_write() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "A-4").await;
        let mut draft = draft_of(&engine, &[&a]).await;

        for bad in ["", "abc", "0", "-5"] {
            let err = engine
                .commit(&mut draft, &test_customer(), &test_payment(bad, 1000))
                .await
                .unwrap_err();
            match err {
                DomainError::Validation { field, .. } => assert_eq!(field, "reference_number"),
                _ => panic!("Expected Validation error for {bad:?}"),
            }
        }
        assert!(is_available(&store, &a).await);
    }

    #[tokio::test]
    async fn reused_reference_is_a_conflict() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "A-5").await;
        let b = receive(&engine, "B-5").await;

        let mut first = draft_of(&engine, &[&a]).await;
        engine
            .commit(&mut first, &test_customer(), &test_payment("9", 1000))
            .await
            .unwrap();

        let mut second = draft_of(&engine, &[&b]).await;
        let err = engine
            .commit(&mut second, &test_customer(), &test_payment("9", 1000))
            .await
            .unwrap_err();
        match err {
            DomainError::Conflict(Conflict::DuplicateReference { reference }) => assert_eq!(reference, 9),
            _ => panic!("Expected DuplicateReference"),
        }
        assert!(is_available(&store, &b).await);
    }

    #[tokio::test]
    async fn return_restores_availability_once() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "A-6").await;
        let b = receive(&engine, "B-6").await;
        let mut draft = draft_of(&engine, &[&a, &b]).await;
        let tx = engine
            .commit(&mut draft, &test_customer(), &test_payment("300", 2000))
            .await
            .unwrap();

        let record = engine.reverse(tx.id, a.id_typed()).await.unwrap();
        assert_eq!(record.original_transaction_id, tx.id);
        assert_eq!(record.refund_amount(), Decimal::from(1000));
        assert!(is_available(&store, &a).await);
        assert!(!is_available(&store, &b).await);

        // Financial history is untouched; the line carries the return marker.
        let stored = engine.transaction(tx.id).await.unwrap();
        assert_eq!(stored.totals, tx.totals);
        assert_eq!(stored.line(a.id_typed()).unwrap().returned_by, Some(record.id));
        assert_eq!(stored.open_lines().count(), 1);
        assert_eq!(engine.returns_for(tx.id).await.unwrap(), vec![record]);

        match engine.reverse(tx.id, a.id_typed()).await.unwrap_err() {
            DomainError::Conflict(Conflict::AlreadyReturned { transaction_id, item_id }) => {
                assert_eq!(transaction_id, tx.id);
                assert_eq!(item_id, a.id_typed());
            }
            _ => panic!("Expected AlreadyReturned"),
        }
        assert_eq!(engine.returns_for(tx.id).await.unwrap().len(), 1);

        // The returned piece can be sold again.
        let mut again = draft_of(&engine, &[&a]).await;
        engine
            .commit(&mut again, &test_customer(), &test_payment("301", 1000))
            .await
            .unwrap();
        let types: Vec<String> = engine
            .movements(a.id_typed())
            .await
            .unwrap()
            .iter()
            .map(|m| m.event_type().to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "inventory.item.received",
                "inventory.item.sold",
                "inventory.item.returned",
                "inventory.item.sold"
            ]
        );
    }

    #[tokio::test]
    async fn return_of_unknown_line_or_transaction_is_not_found() {
        let (engine, _, _) = setup();
        let a = receive(&engine, "A-7").await;
        let mut draft = draft_of(&engine, &[&a]).await;
        let tx = engine
            .commit(&mut draft, &test_customer(), &test_payment("400", 1000))
            .await
            .unwrap();

        match engine.reverse(tx.id, ItemId::new()).await.unwrap_err() {
            DomainError::NotFound { entity, .. } => assert_eq!(entity, "sale line"),
            _ => panic!("Expected NotFound for line"),
        }
        match engine.reverse(TransactionId::new(), a.id_typed()).await.unwrap_err() {
            DomainError::NotFound { entity, .. } => assert_eq!(entity, "sale transaction"),
            _ => panic!("Expected NotFound for transaction"),
        }
    }

    #[tokio::test]
    async fn duplicate_barcode_is_rejected_on_receipt() {
        let (engine, _, _) = setup();
        receive(&engine, "DUP-1").await;

        match engine.receive_item(receive_cmd("dup-1")).await.unwrap_err() {
            DomainError::Conflict(Conflict::DuplicateBarcode { barcode }) => assert_eq!(barcode, "DUP-1"),
            _ => panic!("Expected DuplicateBarcode"),
        }
        assert!(engine.item_by_barcode(" dup-1 ").await.is_ok());
    }

    #[tokio::test]
    async fn index_quote_uses_a_fresh_rate_only() {
        let (engine, _, rates) = setup();
        let a = receive(&engine, "IDX-1").await;
        let details = a.details().unwrap().clone();
        let index = PricingMode::IndexDerived {
            wage_per_gram: Some(Decimal::from(100)),
            rate: None,
        };

        match engine.quote(&details, index.clone()).await.unwrap_err() {
            DomainError::Dependency { dependency, .. } => assert_eq!(dependency, Dependency::RateSource),
            _ => panic!("Expected RateUnavailable"),
        }

        rates.publish(MarketRate {
            rate_per_gram: Decimal::from(3000),
            currency: Currency::Irr,
            as_of: Utc::now() - Duration::hours(3),
        })
        .unwrap();
        assert!(engine.quote(&details, index.clone()).await.is_err());

        rates.publish(MarketRate {
            rate_per_gram: Decimal::from(3000),
            currency: Currency::Irr,
            as_of: Utc::now(),
        })
        .unwrap();
        // 10g * 18/24 * 3000 + 10g * 100
        let quote = engine.quote(&details, index).await.unwrap();
        assert_eq!(quote.amount, Decimal::from(23500));
        assert!(quote.is_index_derived());
    }

    #[tokio::test]
    async fn supplied_rate_is_held_to_the_same_max_age() {
        let (engine, _, _) = setup();
        let a = receive(&engine, "IDX-2").await;
        let details = a.details().unwrap().clone();
        let with_rate = |as_of: DateTime<Utc>| PricingMode::IndexDerived {
            wage_per_gram: None,
            rate: Some(MarketRate {
                rate_per_gram: Decimal::from(3000),
                currency: Currency::Irr,
                as_of,
            }),
        };

        let year_old = with_rate(Utc::now() - Duration::days(365));
        match engine.quote(&details, year_old).await.unwrap_err() {
            DomainError::Dependency { dependency, .. } => assert_eq!(dependency, Dependency::RateSource),
            _ => panic!("Expected RateUnavailable for a stale supplied rate"),
        }

        // 10g * 18/24 * 3000, priced without any rate published at the source.
        let quote = engine.quote(&details, with_rate(Utc::now())).await.unwrap();
        assert_eq!(quote.amount, Decimal::from(22500));
    }

    #[test]
    fn rate_unavailable_maps_to_rate_source_dependency() {
        let err = DomainError::from(PricingError::RateUnavailable {
            reason: "none".to_string(),
        });
        match err {
            DomainError::Dependency { dependency, .. } => assert_eq!(dependency, Dependency::RateSource),
            _ => panic!("Expected Dependency error"),
        }
    }

    fn terminal(
        engine: &Arc<TestEngine>,
        storage: &Arc<InMemorySessionStorage>,
    ) -> (TestTerminal, ResumeOutcome) {
        terminal_with(engine, storage, &Arc::new(InMemoryCustomerDirectory::new()))
    }

    fn terminal_with(
        engine: &Arc<TestEngine>,
        storage: &Arc<InMemorySessionStorage>,
        directory: &Arc<InMemoryCustomerDirectory>,
    ) -> (TestTerminal, ResumeOutcome) {
        CheckoutTerminal::open(
            engine.clone(),
            directory.clone(),
            storage.clone(),
            "till-1",
            &AppConfig::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn selected_customer_is_a_snapshot_of_the_directory_record() {
        let (engine, _, _) = setup();
        receive(&engine, "T-6").await;
        let storage = Arc::new(InMemorySessionStorage::new());
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        let contact = |phone: &str| ContactInfo {
            phone: Some(phone.to_string()),
            ..ContactInfo::default()
        };
        let customer = Customer::new(CustomerId::new(), "Mina Tehrani", contact("09125550000")).unwrap();
        let customer_id = customer.id_typed();
        directory.upsert(customer).unwrap();

        let (mut till, _) = terminal_with(&engine, &storage, &directory);
        till.scan("T-6", fixed(900)).await.unwrap();
        till.next().unwrap();

        let found = till.search_customers("tehrani").await.unwrap();
        assert_eq!(found.len(), 1);
        match till.select_customer(CustomerId::new()).await.unwrap_err() {
            DomainError::NotFound { entity, .. } => assert_eq!(entity, "customer"),
            _ => panic!("Expected NotFound for customer"),
        }
        let bound = till.select_customer(customer_id).await.unwrap();
        assert_eq!(bound.phone, "09125550000");

        // The directory record is edited after binding.
        directory
            .upsert(Customer::new(customer_id, "Mina T. Rahimi", contact("09129999999")).unwrap())
            .unwrap();

        till.next().unwrap();
        till.set_payment(test_payment("700", 900));
        let receipt = till.confirm().await.unwrap();
        assert_eq!(receipt.customer.customer_id, customer_id);
        assert_eq!(receipt.customer.name, "Mina Tehrani");
        assert_eq!(receipt.customer.phone, "09125550000");
    }

    #[tokio::test]
    async fn terminal_checkout_happy_path() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "T-1").await;
        let storage = Arc::new(InMemorySessionStorage::new());
        let (mut till, outcome) = terminal(&engine, &storage);
        assert_eq!(outcome, ResumeOutcome::Fresh);

        till.scan("t-1", fixed(1200)).await.unwrap();
        till.next().unwrap();
        till.bind_customer(test_customer()).unwrap();
        till.next().unwrap();
        till.set_payment(test_payment("555", 1200));

        let receipt = till.confirm().await.unwrap().clone();
        assert_eq!(receipt.totals.gross, Decimal::from(1200));
        assert!(matches!(till.step(), WizardStep::Success(_)));
        assert!(till.draft().is_empty());
        assert!(!is_available(&store, &a).await);

        // Session is gone: a new terminal starts fresh.
        let (restarted, outcome) = terminal(&engine, &storage);
        assert_eq!(outcome, ResumeOutcome::Fresh);
        assert!(restarted.draft().is_empty());
    }

    #[tokio::test]
    async fn terminal_resumes_step_customer_and_cart() {
        let (engine, _, _) = setup();
        receive(&engine, "T-2").await;
        let storage = Arc::new(InMemorySessionStorage::new());

        let (mut till, _) = terminal(&engine, &storage);
        till.scan("T-2", fixed(800)).await.unwrap();
        till.next().unwrap();
        till.bind_customer(test_customer()).unwrap();
        assert!(!till.tick(Utc::now()).unwrap());
        assert!(till.tick(Utc::now() + Duration::seconds(1)).unwrap());
        drop(till);

        let (resumed, outcome) = terminal(&engine, &storage);
        assert_eq!(outcome, ResumeOutcome::Restored);
        assert_eq!(*resumed.step(), WizardStep::CustomerInfo);
        assert_eq!(resumed.draft().lines().len(), 1);
        assert_eq!(resumed.draft().customer().unwrap().name, "Sara Ahmadi");
    }

    #[tokio::test]
    async fn terminal_keeps_draft_when_an_item_was_sold_elsewhere() {
        let (engine, _, _) = setup();
        let a = receive(&engine, "T-3").await;
        let b = receive(&engine, "T-4").await;
        let storage = Arc::new(InMemorySessionStorage::new());

        let (mut till, _) = terminal(&engine, &storage);
        till.scan("T-3", fixed(1000)).await.unwrap();
        till.scan("T-4", fixed(1000)).await.unwrap();
        till.next().unwrap();
        till.bind_customer(test_customer()).unwrap();
        till.next().unwrap();
        till.set_payment(test_payment("600", 2000));

        let mut elsewhere = draft_of(&engine, &[&a]).await;
        engine
            .commit(&mut elsewhere, &test_customer(), &test_payment("601", 1000))
            .await
            .unwrap();

        match till.confirm().await.unwrap_err() {
            DomainError::Conflict(Conflict::ItemNoLongerAvailable { item_id }) => {
                assert_eq!(item_id, a.id_typed())
            }
            _ => panic!("Expected ItemNoLongerAvailable"),
        }
        assert_eq!(*till.step(), WizardStep::Payment);
        assert_eq!(till.draft().lines().len(), 2);

        // Operator goes back, drops the sold piece and retries.
        till.back().unwrap();
        till.back().unwrap();
        till.remove(a.id_typed()).unwrap();
        till.next().unwrap();
        till.next().unwrap();
        let receipt = till.confirm().await.unwrap();
        assert_eq!(receipt.item_ids().collect::<Vec<_>>(), vec![b.id_typed()]);
    }

    #[tokio::test]
    async fn terminal_abandon_clears_everything() {
        let (engine, store, _) = setup();
        let a = receive(&engine, "T-5").await;
        let storage = Arc::new(InMemorySessionStorage::new());

        let (mut till, _) = terminal(&engine, &storage);
        till.scan("T-5", fixed(1000)).await.unwrap();
        till.abandon().unwrap();

        assert_eq!(*till.step(), WizardStep::Abandoned);
        assert!(till.draft().is_empty());
        assert!(is_available(&store, &a).await);
        assert!(till.next().is_err());

        let (restarted, outcome) = terminal(&engine, &storage);
        assert_eq!(outcome, ResumeOutcome::Fresh);
        assert!(restarted.draft().is_empty());
    }
}
