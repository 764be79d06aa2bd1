//! Product business logic - supplier catalogue and the stock counter.
//!
//! Products are listed by suppliers and bought through order placement. All price and
//! stock validation lives here, along with [`decrement_stock_atomic`], the only code path
//! that lowers stock.

use crate::{
    core::{access::Principal, ids::new_id},
    entities::{Product, Role, product},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{info, instrument};

/// Input for a new catalogue entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub stock: i32,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation(format!(
            "Invalid price {price}: must be a finite, non-negative amount"
        )));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<()> {
    if stock < 0 {
        return Err(Error::validation("Stock cannot be negative"));
    }
    Ok(())
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id<C: ConnectionTrait>(
    db: &C,
    product_id: &str,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a supplier's products, ordered alphabetically by name.
pub async fn get_products_for_supplier(
    db: &DatabaseConnection,
    supplier_id: &str,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::SupplierId.eq(supplier_id))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a product owned by the caller's supplier profile.
///
/// # Errors
/// Returns an error if:
/// - The caller is not a supplier with a profile
/// - The product name is empty or whitespace-only
/// - The price is negative or not finite, or the stock is negative
#[instrument(skip(db, input), fields(user = %principal.id))]
pub async fn create_product(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewProduct,
) -> Result<product::Model> {
    validate_name(&input.name)?;
    validate_price(input.price)?;
    validate_stock(input.stock)?;

    principal.require_role(Role::Supplier)?;
    let supplier = crate::core::access::require_supplier_profile(db, principal).await?;

    let now = chrono::Utc::now();
    let product = product::ActiveModel {
        id: Set(new_id()),
        supplier_id: Set(supplier.id),
        name: Set(input.name.trim().to_string()),
        price: Set(input.price),
        stock: Set(input.stock),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let created = product.insert(db).await?;
    info!(product = %created.id, "Product listed");
    Ok(created)
}

/// Updates name, price and/or stock of a product.
///
/// Only the owning supplier or an admin may update. Existing order items are
/// untouched by a price change.
#[instrument(skip(db, update), fields(user = %principal.id))]
pub async fn update_product(
    db: &DatabaseConnection,
    principal: &Principal,
    product_id: &str,
    update: ProductUpdate,
) -> Result<product::Model> {
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }
    if let Some(stock) = update.stock {
        validate_stock(stock)?;
    }

    let existing = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;

    if !principal.is_admin() {
        let supplier = crate::core::access::require_supplier_profile(db, principal).await?;
        if supplier.id != existing.supplier_id {
            return Err(Error::forbidden("You can only update your own products"));
        }
    }

    let mut product: product::ActiveModel = existing.into();
    if let Some(name) = update.name {
        product.name = Set(name.trim().to_string());
    }
    if let Some(price) = update.price {
        product.price = Set(price);
    }
    if let Some(stock) = update.stock {
        product.stock = Set(stock);
    }
    product.updated_at = Set(chrono::Utc::now());

    product.update(db).await.map_err(Into::into)
}

/// Lowers a product's stock by `quantity` in a single conditional statement:
/// `UPDATE products SET stock = stock - qty WHERE id = ? AND stock >= qty`.
///
/// Two concurrent callers can never both succeed past the floor, whatever the isolation
/// level. When the update matches no row the current stock is re-read and reported as
/// a `StockConflict`.
///
/// # Arguments
/// * `db` - Database connection or transaction
/// * `product_id` - Product to decrement
/// * `quantity` - Units to take, must be positive
pub async fn decrement_stock_atomic<C>(db: &C, product_id: &str, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let current = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;
    Err(Error::StockConflict {
        product_id: current.id,
        product_name: current.name,
        available: current.stock,
        requested: quantity,
    })
}
