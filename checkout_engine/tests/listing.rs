use checkout_engine::{
    db_types::{LineItem, MinorUnits, NewOrder, OrderId, TransactionStatus},
    events::EventProducers,
    traits::TransactionQueryFilter,
    Claims,
    PaymentError,
    PaymentRequest,
    TransactionsApi,
};

use crate::support::{
    fakes::{FixedPricing, Scripted, ScriptedCharger},
    prepare_env::{setup, tear_down},
};

mod support;

fn basket(session: &str) -> NewOrder {
    NewOrder::new(session, "USD").with_line_item(LineItem::new("poster", MinorUnits::from(750), 1))
}

fn pay() -> PaymentRequest {
    PaymentRequest::new(750, "USD", "tok_visa")
}

fn assert_unauthorized<T: std::fmt::Debug>(result: Result<T, PaymentError>) {
    match result {
        Err(PaymentError::Unauthorized) => {},
        other => panic!("Expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn transaction_records_are_gated_by_ownership() {
    let charger = ScriptedCharger::new(vec![Scripted::decline("card_declined")]);
    let api = setup(FixedPricing::default(), charger, EventProducers::default()).await;
    let alice = Claims::new("alice");
    let bob = Claims::new("bob");
    let root = Claims::admin("root");
    let nobody = Claims::new("");

    let owned = api.create_order(basket("s-alice").with_user("alice")).await.unwrap();
    let anonymous = api.create_order(basket("s-anon")).await.unwrap();
    let declined = api.settle(&owned.id, pay(), Some(&alice)).await.unwrap();
    let paid = api.settle(&owned.id, pay(), Some(&alice)).await.unwrap();
    let anon_tx = api.settle(&anonymous.id, pay(), None).await.unwrap();

    let listing = TransactionsApi::new(api.db().clone());

    // By user
    let txs = listing.transactions_for_user(Some(&alice), "alice").await.unwrap();
    assert_eq!(txs.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec![declined.id.as_str(), paid.id.as_str()]);
    assert_eq!(listing.transactions_for_user(Some(&root), "alice").await.unwrap().len(), 2);
    assert_unauthorized(listing.transactions_for_user(Some(&bob), "alice").await);
    assert_unauthorized(listing.transactions_for_user(None, "alice").await);
    assert_unauthorized(listing.transactions_for_user(Some(&nobody), "").await);

    // By order
    assert_eq!(listing.transactions_for_order(Some(&alice), &owned.id).await.unwrap().len(), 2);
    assert_eq!(listing.transactions_for_order(Some(&root), &owned.id).await.unwrap().len(), 2);
    assert_unauthorized(listing.transactions_for_order(Some(&bob), &owned.id).await);
    assert_unauthorized(listing.transactions_for_order(None, &owned.id).await);
    let txs = listing.transactions_for_order(Some(&root), &anonymous.id).await.unwrap();
    assert_eq!(txs, vec![anon_tx.clone()]);
    assert_unauthorized(listing.transactions_for_order(Some(&alice), &anonymous.id).await);
    let missing = listing.transactions_for_order(Some(&alice), &OrderId::from("missing")).await;
    assert!(matches!(missing, Err(PaymentError::NotFound(_))));

    // By id
    assert_eq!(listing.transaction_by_id(Some(&root), &paid.id).await.unwrap(), paid);
    assert_unauthorized(listing.transaction_by_id(Some(&alice), &paid.id).await);
    let missing = listing.transaction_by_id(Some(&root), "no-such-tx").await;
    assert!(matches!(missing, Err(PaymentError::NotFound(_))));

    // Search
    let filter = TransactionQueryFilter::default().with_status(TransactionStatus::Succeeded);
    let txs = listing.search_transactions(Some(&root), filter.clone()).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|t| t.is_successful()));
    assert_unauthorized(listing.search_transactions(Some(&alice), filter).await);
    let failures = listing
        .search_transactions(Some(&root), TransactionQueryFilter::default().with_status(TransactionStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failures, vec![declined]);

    tear_down(api).await;
}

#[tokio::test]
async fn date_filters_bound_the_search() {
    let api = setup(FixedPricing::default(), ScriptedCharger::default(), EventProducers::default()).await;
    let root = Claims::admin("root");
    let order = api.create_order(basket("s-dates")).await.unwrap();
    api.settle(&order.id, pay(), None).await.unwrap();
    let listing = TransactionsApi::new(api.db().clone());

    let an_hour = chrono::Duration::hours(1);
    let now = chrono::Utc::now();
    let window = TransactionQueryFilter::default().since(now - an_hour).until(now + an_hour);
    assert_eq!(listing.search_transactions(Some(&root), window).await.unwrap().len(), 1);
    let future = TransactionQueryFilter::default().since(now + an_hour);
    assert!(listing.search_transactions(Some(&root), future).await.unwrap().is_empty());
    let past = TransactionQueryFilter::default().until(now - an_hour);
    assert!(listing.search_transactions(Some(&root), past).await.unwrap().is_empty());
    tear_down(api).await;
}
