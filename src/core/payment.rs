//! Payment confirmation for orders paid outside the platform (bank transfer, gateway
//! callbacks reconciled by an admin).

use crate::{
    core::{
        access::{Principal, order_supplier_user_ids},
        events::DomainEvent,
    },
    entities::{Order, OrderStatus, PaymentStatus, order},
    errors::{Error, Result},
};
use sea_orm::{prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// A confirmed payment and the events it produced.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub order: order::Model,
    pub events: Vec<DomainEvent>,
}

/// Marks an order as paid. A `PENDING` order advances to `CONFIRMED` in the same update.
///
/// # Errors
/// - `Forbidden` unless the caller is an admin
/// - `NotFound` if the order does not exist
/// - `Validation` if the order is cancelled
/// - `Conflict` if the payment is already settled or the order changed concurrently
#[instrument(skip(db), fields(user = %principal.id))]
pub async fn confirm_payment(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: &str,
) -> Result<PaymentConfirmation> {
    if !principal.is_admin() {
        return Err(Error::forbidden("Only admins can confirm payments"));
    }

    let current = Order::find_by_id(order_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;

    if current.status == OrderStatus::Cancelled {
        return Err(Error::validation("Cannot confirm payment for a cancelled order"));
    }
    if current.payment_status.is_settled() {
        return Err(Error::conflict("Payment is already confirmed"));
    }

    let supplier_user_ids = order_supplier_user_ids(db, order_id).await?;

    let now = chrono::Utc::now();
    let mut update = Order::update_many()
        .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Paid))
        .col_expr(order::Column::PaidAt, Expr::value(Some(now)))
        .col_expr(order::Column::UpdatedAt, Expr::value(now));
    if current.status == OrderStatus::Pending {
        update = update.col_expr(order::Column::Status, Expr::value(OrderStatus::Confirmed));
    }
    let result = update
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(current.status))
        .filter(order::Column::PaymentStatus.eq(current.payment_status))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::conflict(
            "Order changed while the payment was being confirmed",
        ));
    }

    let mut updated = current;
    updated.payment_status = PaymentStatus::Paid;
    updated.paid_at = Some(now);
    updated.updated_at = now;
    if updated.status == OrderStatus::Pending {
        updated.status = OrderStatus::Confirmed;
    }
    info!(order = %order_id, status = %updated.status, "Payment confirmed");

    let events = vec![DomainEvent::PaymentConfirmed {
        order_id: updated.id.clone(),
        tracking_id: updated.tracking_id.clone(),
        buyer_id: updated.user_id.clone(),
        supplier_user_ids,
    }];
    Ok(PaymentConfirmation {
        order: updated,
        events,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::status::update_order_status, entities::Role, test_utils::*};

    #[tokio::test]
    async fn test_confirm_bank_transfer_advances_pending_order() -> Result<()> {
        let market = setup_marketplace().await?;
        let order = place_bank_transfer_order(&market, 1).await?;
        let admin = Principal::new("admin", Role::Admin);

        let confirmed = confirm_payment(&market.db, &admin, &order.id).await?;
        assert_eq!(confirmed.order.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.order.payment_status, PaymentStatus::Paid);
        assert!(confirmed.order.paid_at.is_some());
        assert_eq!(confirmed.events.len(), 1);

        let again = confirm_payment(&market.db, &admin, &order.id).await;
        assert!(matches!(again, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_confirmed_order_matches_stored_row() -> Result<()> {
        let market = setup_marketplace().await?;
        let order = place_bank_transfer_order(&market, 1).await?;
        let admin = Principal::new("admin", Role::Admin);

        let confirmed = confirm_payment(&market.db, &admin, &order.id).await?;
        let stored = Order::find_by_id(order.id.clone()).one(&market.db).await?.unwrap();
        assert_eq!(confirmed.order.status, stored.status);
        assert_eq!(confirmed.order.payment_status, stored.payment_status);
        assert_eq!(confirmed.order.paid_at.is_some(), stored.paid_at.is_some());
        assert_eq!(confirmed.order.tracking_id, stored.tracking_id);

        match &confirmed.events[..] {
            [DomainEvent::PaymentConfirmed { supplier_user_ids, .. }] => {
                assert_eq!(supplier_user_ids, &vec![market.supplier_user.id.clone()]);
            }
            other => panic!("expected one payment event, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_payment_rules() -> Result<()> {
        let market = setup_marketplace().await?;
        let order = place_bank_transfer_order(&market, 1).await?;

        let result = confirm_payment(&market.db, &market.buyer_principal(), &order.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        update_order_status(
            &market.db,
            &market.buyer_principal(),
            &order.id,
            OrderStatus::Cancelled,
        )
        .await?;
        let admin = Principal::new("admin", Role::Admin);
        let result = confirm_payment(&market.db, &admin, &order.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = confirm_payment(&market.db, &admin, "missing").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }
}
