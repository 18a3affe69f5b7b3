use sqlx::SqliteConnection;

use crate::db_types::Address;

pub async fn insert_address(address: &Address, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO addresses (id, name, company, address1, address2, city, country, state, zip)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&address.id)
    .bind(&address.name)
    .bind(&address.company)
    .bind(&address.address1)
    .bind(&address.address2)
    .bind(&address.city)
    .bind(&address.country)
    .bind(&address.state)
    .bind(&address.zip)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_address(id: &str, conn: &mut SqliteConnection) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, name, company, address1, address2, city, country, state, zip FROM addresses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}
