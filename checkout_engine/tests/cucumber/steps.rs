use checkout_engine::{
    db_types::{Order, PaymentState, TransactionStatus},
    Claims,
    OrderManagement,
    PaymentError,
    PaymentRequest,
};
use cucumber::{then, when};

use crate::cucumber::CheckoutWorld;

fn error_name(e: &PaymentError) -> &'static str {
    match e {
        PaymentError::MalformedRequest(_) => "MalformedRequest",
        PaymentError::NotFound(_) => "NotFound",
        PaymentError::AlreadyPaid(_) => "AlreadyPaid",
        PaymentError::CurrencyMismatch { .. } => "CurrencyMismatch",
        PaymentError::Unauthorized => "Unauthorized",
        PaymentError::AmountMismatch(_) => "AmountMismatch",
        PaymentError::PricingUnavailable(_) => "PricingUnavailable",
        PaymentError::ChargeUnavailable { .. } => "ChargeUnavailable",
        PaymentError::SettlementInProgress(_) => "SettlementInProgress",
        PaymentError::NotPaid(_) => "NotPaid",
        PaymentError::AlreadyShipped(_) => "AlreadyShipped",
        PaymentError::DatabaseError(_) => "DatabaseError",
        PaymentError::Internal(_) => "Internal",
    }
}

async fn pay(world: &mut CheckoutWorld, caller: Option<Claims>, amount: u64, currency: String, label: &str) {
    let order_id = world.order_id(label);
    let request = PaymentRequest::new(amount, currency, "tok_visa".to_string());
    let result = world.api().settle(&order_id, request, caller.as_ref()).await;
    world.last_payment = Some(result);
}

async fn fetch_order(world: &CheckoutWorld, label: &str) -> Order {
    let id = world.order_id(label);
    world.api().db().fetch_order(&id).await.expect("Error fetching order").expect("Order does not exist")
}

#[when(expr = "I pay {int} {word} for order {string}")]
async fn anonymous_payment(world: &mut CheckoutWorld, amount: u64, currency: String, label: String) {
    pay(world, None, amount, currency, &label).await;
}

#[when(expr = "{string} pays {int} {word} for order {string}")]
async fn user_payment(world: &mut CheckoutWorld, user: String, amount: u64, currency: String, label: String) {
    pay(world, Some(Claims::new(user)), amount, currency, &label).await;
}

#[then(expr = "the payment succeeds with charge {string}")]
async fn payment_succeeds_with(world: &mut CheckoutWorld, charge_id: String) {
    let tx = world.last_payment().as_ref().expect("The payment failed");
    assert_eq!(tx.status, TransactionStatus::Succeeded);
    assert_eq!(tx.processor_id.as_deref(), Some(charge_id.as_str()));
}

#[then("the payment succeeds")]
async fn payment_succeeds(world: &mut CheckoutWorld) {
    let tx = world.last_payment().as_ref().expect("The payment failed");
    assert_eq!(tx.status, TransactionStatus::Succeeded);
}

#[then(expr = "the payment is declined with {string}")]
async fn payment_declined(world: &mut CheckoutWorld, code: String) {
    let tx = world.last_payment().as_ref().expect("A decline should not be an error");
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.failure_code.as_deref(), Some(code.as_str()));
    assert!(tx.failure_description.as_deref().is_some_and(|d| !d.is_empty()), "The decline has no description");
}

#[then(expr = "the payment fails with {word}")]
async fn payment_fails(world: &mut CheckoutWorld, error: String) {
    match world.last_payment() {
        Ok(tx) => panic!("Expected {error}, but the payment returned {tx:?}"),
        Err(e) => assert_eq!(error_name(e), error, "Unexpected error: {e}"),
    }
}

#[then(expr = "order {string} is {word}")]
async fn order_state(world: &mut CheckoutWorld, label: String, state: String) {
    let order = fetch_order(world, &label).await;
    let expected = state.parse::<PaymentState>().expect("Not a payment state");
    assert_eq!(order.payment_state, expected);
}

#[then(expr = "order {string} belongs to {string}")]
async fn order_owner(world: &mut CheckoutWorld, label: String, owner: String) {
    let order = fetch_order(world, &label).await;
    assert_eq!(order.user_id.as_deref(), Some(owner.as_str()));
}

#[then(expr = "order {string} has {int} transaction(s)")]
async fn transaction_count(world: &mut CheckoutWorld, label: String, count: usize) {
    let id = world.order_id(&label);
    let full = world.api().db().fetch_full_order(&id).await.expect("Error fetching order").expect("No such order");
    assert_eq!(full.transactions.len(), count);
    let successes = full.transactions.iter().filter(|t| t.status != TransactionStatus::Failed).count();
    assert!(successes <= 1, "Order {label} has {successes} successful transactions");
}

#[then(expr = "the processor was charged {int} time(s)")]
async fn charge_count(world: &mut CheckoutWorld, count: usize) {
    assert_eq!(world.charger().calls(), count);
}
