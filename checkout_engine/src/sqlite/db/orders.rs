use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{
    FulfillmentState,
    MinorUnits,
    NewOrder,
    Order,
    OrderId,
    OrderState,
    PaymentState,
    Price,
};

/// Inserts a new order row. This is not atomic on its own; line items and addresses are stored separately. Embed the
/// call in a transaction and pass `&mut *tx` as the connection argument.
///
/// `total` must equal `subtotal + taxes + shipping - discount`; the table refuses anything else.
pub async fn insert_order(
    id: &OrderId,
    order: &NewOrder,
    price: &Price,
    total: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                user_id,
                session_id,
                email,
                currency,
                subtotal,
                taxes,
                shipping,
                discount,
                total,
                coupon,
                shipping_address_id,
                billing_address_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(&order.user_id)
    .bind(&order.session_id)
    .bind(&order.email)
    .bind(&order.currency)
    .bind(price.subtotal)
    .bind(price.taxes)
    .bind(order.shipping)
    .bind(price.discount)
    .bind(total)
    .bind(order.coupon.as_ref().map(Json))
    .bind(order.shipping_address.as_ref().map(|a| a.id.as_str()))
    .bind(order.billing_address.as_ref().map(|a| a.id.as_str()))
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Returns the order with the given id, unless it has been deleted.
pub async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Writes the details a shopper may edit (owner, email, coupon and addresses) back to the order. Prices and the
/// payment, fulfilment and order states are never written here.
///
/// The update is refused (and `None` returned) if it would hand an owned order to someone else.
pub async fn update_order(order: &Order, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let updated = sqlx::query_as(
        r#"
            UPDATE orders SET
                user_id = $1,
                email = $2,
                coupon = $3,
                shipping_address_id = $4,
                billing_address_id = $5,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $6
              AND deleted_at IS NULL
              AND (user_id IS NULL OR user_id = $1)
            RETURNING *;
        "#,
    )
    .bind(&order.user_id)
    .bind(&order.email)
    .bind(&order.coupon)
    .bind(&order.shipping_address_id)
    .bind(&order.billing_address_id)
    .bind(&order.id)
    .fetch_optional(conn)
    .await?;
    Ok(updated)
}

/// Takes the settlement lease on an order in a single conditional update.
///
/// The lease is granted only if the order exists, is unpaid, is not deleted, has no unexpired lease, and is either
/// anonymous or owned by `claimant`. An anonymous order is bound to `claimant` in the same statement.
pub async fn acquire_lease(
    id: &OrderId,
    lease_id: &str,
    claimant: Option<&str>,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                settlement_lease = $1,
                lease_expires_at = $2,
                user_id = COALESCE(user_id, $3),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
              AND deleted_at IS NULL
              AND payment_state != 'paid'
              AND (user_id IS NULL OR user_id = $3)
              AND (settlement_lease IS NULL OR lease_expires_at <= $5)
            RETURNING *;
        "#,
    )
    .bind(lease_id)
    .bind(expires_at.timestamp_millis())
    .bind(claimant)
    .bind(id)
    .bind(now.timestamp_millis())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Lease {lease_id} on order {id} granted: {}", order.is_some());
    Ok(order)
}

/// Whether an unexpired lease is held on the order.
pub async fn has_live_lease(id: &OrderId, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let held: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM orders WHERE id = $1 AND settlement_lease IS NOT NULL AND lease_expires_at > $2",
    )
    .bind(id)
    .bind(now.timestamp_millis())
    .fetch_optional(conn)
    .await?;
    Ok(held.is_some())
}

/// Marks the order paid with the given totals and drops any lease. Returns `None` if the order was already paid.
pub async fn mark_paid(
    id: &OrderId,
    subtotal: MinorUnits,
    taxes: MinorUnits,
    discount: MinorUnits,
    total: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_state = $1,
                state = $2,
                subtotal = $3,
                taxes = $4,
                discount = $5,
                total = $6,
                settlement_lease = NULL,
                lease_expires_at = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $7 AND payment_state != 'paid'
            RETURNING *;
        "#,
    )
    .bind(PaymentState::Paid)
    .bind(OrderState::Paid)
    .bind(subtotal)
    .bind(taxes)
    .bind(discount)
    .bind(total)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Releases the lease, but only if it is still the one we were given.
pub async fn release_lease(id: &OrderId, lease_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET settlement_lease = NULL, lease_expires_at = NULL
            WHERE id = $1 AND settlement_lease = $2
        "#,
    )
    .bind(id)
    .bind(lease_id)
    .execute(conn)
    .await?;
    let released = result.rows_affected() > 0;
    if !released {
        debug!("🗃️ Lease {lease_id} on order {id} had already been replaced");
    }
    Ok(released)
}

/// Moves a paid, unshipped order to `shipped`. Returns `None` if the order is not in that state.
pub async fn mark_shipped(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                fulfillment_state = $1,
                state = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND deleted_at IS NULL AND payment_state = 'paid' AND fulfillment_state = 'pending'
            RETURNING *;
        "#,
    )
    .bind(FulfillmentState::Shipped)
    .bind(OrderState::Shipped)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn soft_delete(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
