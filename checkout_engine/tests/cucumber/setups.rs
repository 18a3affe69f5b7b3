use checkout_engine::db_types::{LineItem, MinorUnits, NewOrder};
use cucumber::given;

use crate::{
    cucumber::{CheckoutSystem, CheckoutWorld},
    support::fakes::Scripted,
};

#[given("a fresh checkout")]
async fn fresh_checkout(world: &mut CheckoutWorld) {
    let system = CheckoutSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "an order {string} for {int} {word}")]
async fn an_order(world: &mut CheckoutWorld, label: String, amount: i64, currency: String) {
    let order = NewOrder::new(format!("session-{label}"), currency)
        .with_line_item(LineItem::new(format!("sku-{label}"), MinorUnits::from(amount), 1));
    let order = world.api().create_order(order).await.expect("Error creating order");
    world.orders.insert(label, order.id);
}

#[given(expr = "an order {string} for {int} {word} belonging to {string}")]
async fn an_owned_order(world: &mut CheckoutWorld, label: String, amount: i64, currency: String, owner: String) {
    let order = NewOrder::new(format!("session-{label}"), currency)
        .with_user(owner)
        .with_line_item(LineItem::new(format!("sku-{label}"), MinorUnits::from(amount), 1));
    let order = world.api().create_order(order).await.expect("Error creating order");
    world.orders.insert(label, order.id);
}

#[given(expr = "the processor approves the next charge as {string}")]
async fn approve_next(world: &mut CheckoutWorld, charge_id: String) {
    world.charger().push(Scripted::Approve(charge_id));
}

#[given(expr = "the processor declines the next charge with {string}")]
async fn decline_next(world: &mut CheckoutWorld, code: String) {
    world.charger().push(Scripted::decline(&code));
}

#[given("the processor is down")]
async fn processor_down(world: &mut CheckoutWorld) {
    world.charger().push(Scripted::Unavailable);
}
