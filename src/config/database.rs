//! Database configuration module.
//!
//! This module handles database connections and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL. `SQLite` is the
//! default for development and tests; a `postgres://` URL works unchanged.

use crate::entities::{
    LogisticsBooking, LogisticsProfile, MechanicBooking, MechanicProfile, Notification, Order,
    OrderItem, OrderServiceLink, Product, ShippingAddress, SupplierProfile, User, Wallet,
    WalletTransaction, Withdrawal,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::debug;

/// Default development database, created next to the binary if missing.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/autoplux.sqlite?mode=rwc";

/// Establishes a connection to the configured database.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    debug!("Ensured table {}", entity.table_name());
    Ok(())
}

/// Creates all necessary database tables, parents before children.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, SupplierProfile).await?;
    create_table(db, &schema, MechanicProfile).await?;
    create_table(db, &schema, LogisticsProfile).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, ShippingAddress).await?;
    create_table(db, &schema, MechanicBooking).await?;
    create_table(db, &schema, LogisticsBooking).await?;
    create_table(db, &schema, OrderServiceLink).await?;
    create_table(db, &schema, Notification).await?;
    create_table(db, &schema, Wallet).await?;
    create_table(db, &schema, WalletTransaction).await?;
    create_table(db, &schema, Withdrawal).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _ = User::find().limit(1).all(&db).await?;
        let _ = Product::find().limit(1).all(&db).await?;
        let _ = Order::find().limit(1).all(&db).await?;
        let _ = OrderItem::find().limit(1).all(&db).await?;
        let _ = MechanicBooking::find().limit(1).all(&db).await?;
        let _ = LogisticsBooking::find().limit(1).all(&db).await?;
        let _ = WalletTransaction::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
