//! Order status state machine.
//!
//! Who may move an order where depends on how the caller relates to it:
//!
//! | Actor    | PENDING →            | CONFIRMED →        | SHIPPED →  |
//! |----------|----------------------|--------------------|------------|
//! | Supplier | CONFIRMED, CANCELLED | SHIPPED, CANCELLED |            |
//! | Buyer    | CANCELLED            |                    | DELIVERED  |
//! | Admin    | any other status     | any other status   | any other  |
//!
//! DELIVERED and CANCELLED are terminal for everyone. Shipping additionally requires a
//! settled payment unless the order is cash on delivery.

use crate::{
    core::{
        access::{OrderRelation, Principal, order_supplier_user_ids, resolve_order_relation},
        events::DomainEvent,
        wallet::credit_order_delivery,
    },
    entities::{Order, OrderStatus, PaymentStatus, order},
    errors::{Error, Result},
};
use sea_orm::{ActiveEnum, prelude::*, sea_query::Expr};
use tracing::{error, info, instrument, warn};

/// Parses a status sent by a client (`"shipped"`, `" SHIPPED "`) into a status enum.
///
/// Unknown values are a `Validation` error listing nothing but the offending value; callers
/// that know the allowed set report it through [`Error::InvalidTransition`] instead.
pub fn parse_status<S>(raw: &str) -> Result<S>
where
    S: ActiveEnum<Value = String>,
{
    let value = raw.trim().to_ascii_uppercase();
    S::try_from_value(&value)
        .map_err(|_| Error::validation(format!("Unknown status '{}'", raw.trim())))
}

/// Statuses the given actor may move an order to from `current`.
#[must_use]
pub fn allowed_transitions(relation: OrderRelation, current: OrderStatus) -> Vec<OrderStatus> {
    if current.is_terminal() {
        return Vec::new();
    }
    match (relation, current) {
        (OrderRelation::Supplier, OrderStatus::Pending) => {
            vec![OrderStatus::Confirmed, OrderStatus::Cancelled]
        }
        (OrderRelation::Supplier, OrderStatus::Confirmed) => {
            vec![OrderStatus::Shipped, OrderStatus::Cancelled]
        }
        (OrderRelation::Buyer, OrderStatus::Pending) => vec![OrderStatus::Cancelled],
        (OrderRelation::Buyer, OrderStatus::Shipped) => vec![OrderStatus::Delivered],
        (OrderRelation::Admin, _) => OrderStatus::ALL
            .into_iter()
            .filter(|status| *status != current)
            .collect(),
        _ => Vec::new(),
    }
}

/// Fails with `InvalidTransition` (carrying the allowed list) unless the move is permitted.
pub fn check_transition(
    relation: OrderRelation,
    current: OrderStatus,
    requested: OrderStatus,
) -> Result<()> {
    let allowed = allowed_transitions(relation, current);
    if allowed.contains(&requested) {
        return Ok(());
    }
    Err(Error::InvalidTransition {
        current: current.to_string(),
        requested: requested.to_string(),
        allowed: allowed.iter().map(ToString::to_string).collect(),
    })
}

/// Outcome of a successful status change.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order: order::Model,
    pub previous: OrderStatus,
    pub message: String,
    pub events: Vec<DomainEvent>,
}

fn status_message(status: OrderStatus) -> String {
    match status {
        OrderStatus::Confirmed => "Order confirmed".to_string(),
        OrderStatus::Shipped => "Order marked as shipped".to_string(),
        OrderStatus::Delivered => "Order marked as delivered".to_string(),
        OrderStatus::Cancelled => "Order cancelled".to_string(),
        OrderStatus::Pending => "Order moved back to pending".to_string(),
    }
}

/// Moves an order to `requested` on behalf of `principal`.
///
/// The update is conditional on the status read at the start, so two racing callers cannot
/// both apply a transition and fire duplicate notifications. Shipping requires a settled
/// payment, except for cash-on-delivery orders, which are settled when they are delivered
/// (see DESIGN.md, decision 8): delivering one marks it paid in the same statement.
/// Reaching DELIVERED credits supplier wallets; a failed credit is logged and does not undo
/// the delivery.
///
/// # Errors
/// - `NotFound` if the order does not exist
/// - `Forbidden` if the caller has no relationship to the order
/// - `InvalidTransition` if the move is not in the caller's table
/// - `PaymentNotConfirmed` when shipping an unpaid order
/// - `Conflict` if the order changed status concurrently
#[instrument(skip(db), fields(user = %principal.id))]
pub async fn update_order_status(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: &str,
    requested: OrderStatus,
) -> Result<StatusUpdate> {
    let current = Order::find_by_id(order_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;

    let relation = resolve_order_relation(db, principal, &current)
        .await?
        .ok_or_else(|| Error::forbidden("You do not have access to this order"))?;

    if let Err(err) = check_transition(relation, current.status, requested) {
        warn!(order = %order_id, ?relation, from = %current.status, to = %requested, "Rejected status transition");
        return Err(err);
    }

    if requested == OrderStatus::Shipped
        && !current.payment_status.is_settled()
        && !current.is_cash_on_delivery()
    {
        warn!(order = %order_id, payment_status = %current.payment_status, "Refusing to ship unpaid order");
        return Err(Error::PaymentNotConfirmed);
    }

    // Nothing after the commit point may fail the request
    let supplier_user_ids = order_supplier_user_ids(db, order_id).await?;

    let now = chrono::Utc::now();
    let settles_on_delivery = requested == OrderStatus::Delivered
        && current.is_cash_on_delivery()
        && !current.payment_status.is_settled();
    let mut update = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(requested))
        .col_expr(order::Column::UpdatedAt, Expr::value(now));
    if settles_on_delivery {
        update = update
            .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Paid))
            .col_expr(order::Column::PaidAt, Expr::value(Some(now)));
    }
    let result = update
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(current.status))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        warn!(order = %order_id, "Order status changed concurrently");
        return Err(Error::conflict(
            "Order status changed while the update was processed",
        ));
    }

    let mut updated = current.clone();
    updated.status = requested;
    updated.updated_at = now;
    if settles_on_delivery {
        updated.payment_status = PaymentStatus::Paid;
        updated.paid_at = Some(now);
    }

    info!(order = %order_id, from = %current.status, to = %requested, "Order status changed");

    if requested == OrderStatus::Delivered {
        match credit_order_delivery(db, &updated).await {
            Ok(credits) => info!(order = %order_id, credits = credits.len(), "Supplier wallets credited"),
            Err(e) => error!(order = %order_id, error = %e, "Failed to credit supplier wallets"),
        }
    }

    let events = vec![DomainEvent::OrderStatusChanged {
        order_id: updated.id.clone(),
        tracking_id: updated.tracking_id.clone(),
        buyer_id: updated.user_id.clone(),
        supplier_user_ids,
        from: current.status,
        to: requested,
    }];

    Ok(StatusUpdate {
        order: updated,
        previous: current.status,
        message: status_message(requested),
        events,
    })
}
