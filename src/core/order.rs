//! Order placement and order queries.
//!
//! Placement runs in three phases:
//! 1. [`validate_request`] normalises the request and fails fast on malformed input.
//! 2. [`check_stock`] is a best-effort pre-check outside any transaction that reports
//!    every short item at once.
//! 3. [`commit_order`] does the real work in one transaction: prices are snapshotted from
//!    the product rows, stock is decremented with a floor-checked update, and the order,
//!    its items and its shipping address are inserted. Any failure rolls everything back.

use crate::{
    core::{
        access::{Principal, resolve_order_relation},
        events::DomainEvent,
        ids::{ORDER_PREFIX, new_id, new_tracking_id},
        product::decrement_stock_atomic,
    },
    entities::{
        Order, OrderItem, OrderStatus, PaymentStatus, Product, Role, ShippingAddress, order,
        order_item, product, shipping_address,
    },
    errors::{Error, Result, StockShortfall},
};
use sea_orm::{ConnectionTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};

/// Price differences below this are rounding noise, not tampering.
const PRICE_TOLERANCE: f64 = 0.005;

/// One requested line of an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i32,
    /// Price the client displayed; informational only
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: Option<String>,
}

/// `POST /orders` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    #[serde(default)]
    pub items: Vec<OrderLine>,
    /// Total the client displayed; the stored total is always recomputed
    pub total: Option<f64>,
    pub shipping_address: Option<ShippingAddressInput>,
    #[serde(default)]
    pub payment_method: String,
    /// Client-chosen tracking id; generated when absent
    pub tracking_id: Option<String>,
}

/// A request that passed validation, with quantities merged per product.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    /// Requested units per product id, in id order
    pub quantities: BTreeMap<String, i32>,
    /// Client-displayed unit prices, for mismatch logging
    pub client_prices: HashMap<String, f64>,
    pub client_total: Option<f64>,
    pub shipping_address: ShippingAddressInput,
    pub payment_method: String,
    pub tracking_id: String,
}

/// A committed order and the events it produced.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub events: Vec<DomainEvent>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("shippingAddress.{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_tracking_id(raw: &str) -> Result<String> {
    let id = raw.trim().to_ascii_uppercase();
    let well_formed = id.starts_with(ORDER_PREFIX)
        && (4..=32).contains(&id.len())
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !well_formed {
        return Err(Error::validation(format!(
            "Invalid trackingId '{raw}': expected '{ORDER_PREFIX}' followed by up to 29 letters, digits or dashes"
        )));
    }
    Ok(id)
}

/// Checks the shape of a placement request and normalises it.
///
/// # Errors
/// Returns `Validation` if the request has no items, a non-positive quantity, a missing or
/// incomplete shipping address, no payment method, or a malformed tracking id.
pub fn validate_request(request: PlaceOrder) -> Result<ValidatedOrder> {
    if request.items.is_empty() {
        return Err(Error::validation("An order needs at least one item"));
    }

    let mut quantities: BTreeMap<String, i32> = BTreeMap::new();
    let mut client_prices = HashMap::new();
    for line in &request.items {
        let product_id = line.product_id.trim();
        if product_id.is_empty() {
            return Err(Error::validation("Every item needs a productId"));
        }
        if line.quantity <= 0 {
            return Err(Error::validation(format!(
                "Quantity for product '{product_id}' must be positive"
            )));
        }
        let entry = quantities.entry(product_id.to_string()).or_insert(0);
        *entry = entry
            .checked_add(line.quantity)
            .ok_or_else(|| Error::validation("Quantity is too large"))?;
        if let Some(price) = line.price {
            client_prices.insert(product_id.to_string(), price);
        }
    }

    let address = request
        .shipping_address
        .ok_or_else(|| Error::validation("shippingAddress is required"))?;
    let shipping_address = ShippingAddressInput {
        full_name: required("fullName", &address.full_name)?,
        phone: required("phone", &address.phone)?,
        address: required("address", &address.address)?,
        city: required("city", &address.city)?,
        state: required("state", &address.state)?,
        postal_code: address
            .postal_code
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
    };

    let payment_method = request.payment_method.trim().to_ascii_uppercase();
    if payment_method.is_empty() {
        return Err(Error::validation("paymentMethod is required"));
    }

    let tracking_id = match request.tracking_id.as_deref() {
        Some(raw) if !raw.trim().is_empty() => normalize_tracking_id(raw)?,
        _ => new_tracking_id(ORDER_PREFIX),
    };

    Ok(ValidatedOrder {
        quantities,
        client_prices,
        client_total: request.total,
        shipping_address,
        payment_method,
        tracking_id,
    })
}

/// Best-effort stock pre-check, outside any transaction.
///
/// Collects every short item rather than stopping at the first. Passing this check does not
/// guarantee the commit succeeds; a concurrent order may still take the stock.
pub async fn check_stock<C: ConnectionTrait>(db: &C, order: &ValidatedOrder) -> Result<()> {
    let products: HashMap<String, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(order.quantities.keys().cloned()))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    let mut shortfalls = Vec::new();
    for (product_id, &requested) in &order.quantities {
        let product = products
            .get(product_id)
            .ok_or_else(|| Error::validation(format!("Product '{product_id}' does not exist")))?;
        if product.stock < requested {
            shortfalls.push(StockShortfall {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                available: product.stock,
                requested,
            });
        }
    }

    if shortfalls.is_empty() {
        Ok(())
    } else {
        warn!(items = shortfalls.len(), "Order rejected by stock pre-check");
        Err(Error::InsufficientStock { items: shortfalls })
    }
}

/// Writes the order in a single transaction.
///
/// Stock is taken with a floor-checked update per product; if another order got there first
/// the transaction is abandoned and `StockConflict` reports the stock that is left. A tracking
/// id that is already taken fails the insert on the unique index and becomes a `Conflict`.
#[instrument(skip(db, order), fields(tracking_id = %order.tracking_id))]
pub async fn commit_order(
    db: &DatabaseConnection,
    buyer_id: &str,
    order: &ValidatedOrder,
) -> Result<PlacedOrder> {
    let txn = db.begin().await?;

    // Take the stock and snapshot prices
    let mut snapshots = Vec::with_capacity(order.quantities.len());
    for (product_id, &quantity) in &order.quantities {
        decrement_stock_atomic(&txn, product_id, quantity).await?;
        let product = Product::find_by_id(product_id.clone())
            .one(&txn)
            .await?
            .ok_or_else(|| Error::validation(format!("Product '{product_id}' does not exist")))?;

        if let Some(&client_price) = order.client_prices.get(product_id)
            && (client_price - product.price).abs() > PRICE_TOLERANCE
        {
            warn!(
                product = %product_id,
                client_price,
                price = product.price,
                "Client price differs from catalogue price, using catalogue price"
            );
        }
        snapshots.push((product_id.clone(), quantity, product.price));
    }

    let total: f64 = snapshots
        .iter()
        .map(|(_, quantity, price)| price * f64::from(*quantity))
        .sum();
    if let Some(client_total) = order.client_total
        && (client_total - total).abs() > PRICE_TOLERANCE
    {
        warn!(client_total, total, "Client total differs from computed total");
    }

    let status = if order::is_bank_transfer(&order.payment_method) {
        OrderStatus::Pending
    } else {
        OrderStatus::Confirmed
    };

    let now = chrono::Utc::now();
    let created = order::ActiveModel {
        id: Set(new_id()),
        tracking_id: Set(order.tracking_id.clone()),
        user_id: Set(buyer_id.to_string()),
        total: Set(total),
        status: Set(status),
        payment_method: Set(order.payment_method.clone()),
        payment_status: Set(PaymentStatus::Pending),
        paid_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        Error::conflict_on_duplicate(
            e,
            format!("Tracking id '{}' is already in use", order.tracking_id),
        )
    })?;

    let mut items = Vec::with_capacity(snapshots.len());
    for (product_id, quantity, price) in snapshots {
        let item = order_item::ActiveModel {
            id: Set(new_id()),
            order_id: Set(created.id.clone()),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price: Set(price),
        }
        .insert(&txn)
        .await?;
        items.push(item);
    }

    let address = &order.shipping_address;
    shipping_address::ActiveModel {
        id: Set(new_id()),
        order_id: Set(created.id.clone()),
        full_name: Set(address.full_name.clone()),
        phone: Set(address.phone.clone()),
        address: Set(address.address.clone()),
        city: Set(address.city.clone()),
        state: Set(address.state.clone()),
        postal_code: Set(address.postal_code.clone()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        order = %created.id,
        total = created.total,
        status = %created.status,
        items = items.len(),
        "Order placed"
    );

    let events = vec![DomainEvent::OrderPlaced {
        order_id: created.id.clone(),
        tracking_id: created.tracking_id.clone(),
        buyer_id: created.user_id.clone(),
        total: created.total,
    }];
    Ok(PlacedOrder {
        order: created,
        items,
        events,
    })
}

/// Places an order for the caller: validate, pre-check stock, commit.
#[instrument(skip(db, request), fields(user = %principal.id))]
pub async fn place_order(
    db: &DatabaseConnection,
    principal: &Principal,
    request: PlaceOrder,
) -> Result<PlacedOrder> {
    let order = validate_request(request)?;
    check_stock(db, &order).await?;
    commit_order(db, &principal.id, &order).await
}

/// An order with its items and shipping address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub shipping_address: Option<shipping_address::Model>,
}

/// Loads an order visible to its buyer, one of its suppliers, or an admin.
pub async fn get_order_details(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: &str,
) -> Result<OrderDetails> {
    let order = Order::find_by_id(order_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;

    if resolve_order_relation(db, principal, &order).await?.is_none() {
        return Err(Error::forbidden("You do not have access to this order"));
    }

    let items = order.find_related(OrderItem).all(db).await?;
    let shipping_address = order.find_related(ShippingAddress).one(db).await?;
    Ok(OrderDetails {
        order,
        items,
        shipping_address,
    })
}

/// Orders visible to the caller, newest first.
///
/// Buyers see their own orders, suppliers see orders containing any of their products and
/// admins see everything.
pub async fn list_orders(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<Vec<order::Model>> {
    let query = match principal.role {
        Role::Admin => Order::find(),
        Role::Supplier => {
            let supplier = crate::core::access::require_supplier_profile(db, principal).await?;
            let order_ids: Vec<String> = OrderItem::find()
                .select_only()
                .column(order_item::Column::OrderId)
                .distinct()
                .inner_join(Product)
                .filter(product::Column::SupplierId.eq(supplier.id))
                .into_tuple()
                .all(db)
                .await?;
            Order::find().filter(order::Column::Id.is_in(order_ids))
        }
        _ => Order::find().filter(order::Column::UserId.eq(principal.id.as_str())),
    };

    query
        .order_by_desc(order::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}
