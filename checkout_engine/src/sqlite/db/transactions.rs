use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewTransaction, OrderId, Transaction},
    traits::TransactionQueryFilter,
};

/// Appends a transaction. The store rejects a second non-failed transaction for the same order with a unique
/// constraint violation.
pub async fn insert_transaction(tx: &NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, sqlx::Error> {
    let transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                id,
                order_id,
                user_id,
                processor_id,
                amount,
                currency,
                status,
                failure_code,
                failure_description
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.order_id)
    .bind(&tx.user_id)
    .bind(&tx.processor_id)
    .bind(tx.amount)
    .bind(&tx.currency)
    .bind(tx.status)
    .bind(&tx.failure_code)
    .bind(&tx.failure_description)
    .fetch_one(conn)
    .await?;
    Ok(transaction)
}

pub async fn fetch_transaction(id: &str, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_transactions_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    search_transactions(TransactionQueryFilter::default().with_order_id(order_id.clone()), conn).await
}

/// Fetches transactions according to criteria specified in the `TransactionQueryFilter`
///
/// Results are ordered by `created_at` in ascending order, then by insertion order.
pub async fn search_transactions(
    query: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at, rowid");
    trace!("🗃️ Executing query: {}", builder.sql());
    let transactions = builder.build_query_as::<Transaction>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_transactions: {} rows", transactions.len());
    Ok(transactions)
}
