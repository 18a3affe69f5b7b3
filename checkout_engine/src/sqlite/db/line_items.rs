use sqlx::SqliteConnection;

use crate::db_types::{LineItem, OrderId};

/// Stores the line items for an order, preserving their order.
pub async fn insert_line_items(
    order_id: &OrderId,
    items: &[LineItem],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO line_items (order_id, position, sku, title, product_type, price, quantity, vat)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order_id)
        .bind(position as i64)
        .bind(&item.sku)
        .bind(&item.title)
        .bind(&item.product_type)
        .bind(item.price)
        .bind(item.quantity)
        .bind(item.vat)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn fetch_line_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT sku, title, product_type, price, quantity, vat
            FROM line_items
            WHERE order_id = $1
            ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}
