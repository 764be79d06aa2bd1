//! Notification business logic.
//!
//! Turns [`DomainEvent`]s into notification rows and provides the inbox operations
//! (list, mark read, delete). Delivery is best-effort: [`Notifier::emit`] logs and
//! swallows every failure, so a notification problem never surfaces to the caller
//! of the operation that produced the event.

use crate::{
    core::{events::DomainEvent, ids::new_id},
    entities::{Notification, OrderStatus, notification},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, error};

/// A notification ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: &'static str,
    pub link: Option<String>,
}

impl NewNotification {
    fn new(
        user_id: &str,
        kind: &'static str,
        link: &str,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.into(),
            message: message.into(),
            kind,
            link: Some(link.to_string()),
        }
    }
}

fn order_status_copy(status: OrderStatus, tracking_id: &str) -> ((String, String), (String, String)) {
    let buyer = match status {
        OrderStatus::Pending => (
            "Order pending".to_string(),
            format!("Your order {tracking_id} is awaiting confirmation."),
        ),
        OrderStatus::Confirmed => (
            "Order confirmed".to_string(),
            format!("Your order {tracking_id} has been confirmed by the supplier."),
        ),
        OrderStatus::Shipped => (
            "Order shipped".to_string(),
            format!("Your order {tracking_id} is on its way."),
        ),
        OrderStatus::Delivered => (
            "Order delivered".to_string(),
            format!("Your order {tracking_id} has been delivered. Thank you for shopping with Edmich Autoplux."),
        ),
        OrderStatus::Cancelled => (
            "Order cancelled".to_string(),
            format!("Your order {tracking_id} has been cancelled."),
        ),
    };
    let supplier = match status {
        OrderStatus::Pending => (
            "Order back to pending".to_string(),
            format!("Order {tracking_id} has been moved back to pending."),
        ),
        OrderStatus::Confirmed => (
            "Order confirmed".to_string(),
            format!("Order {tracking_id} is confirmed. Prepare the items for shipping."),
        ),
        OrderStatus::Shipped => (
            "Order shipped".to_string(),
            format!("Order {tracking_id} has been marked as shipped."),
        ),
        OrderStatus::Delivered => (
            "Order delivered".to_string(),
            format!("Order {tracking_id} was delivered. Your wallet has been credited with your share."),
        ),
        OrderStatus::Cancelled => (
            "Order cancelled".to_string(),
            format!("Order {tracking_id} has been cancelled. Reserved stock is no longer committed to this buyer."),
        ),
    };
    (buyer, supplier)
}

/// Builds the notification rows for an event.
///
/// Order status changes produce one buyer-facing row plus one row per distinct supplier.
#[must_use]
pub fn notifications_for(event: &DomainEvent) -> Vec<NewNotification> {
    match event {
        DomainEvent::OrderPlaced {
            tracking_id,
            buyer_id,
            total,
            ..
        } => vec![NewNotification::new(
            buyer_id,
            "ORDER",
            tracking_id,
            "Order placed",
            format!("Your order {tracking_id} totalling {total:.2} has been placed."),
        )],
        DomainEvent::OrderStatusChanged {
            tracking_id,
            buyer_id,
            supplier_user_ids,
            to,
            ..
        } => {
            let ((buyer_title, buyer_message), (supplier_title, supplier_message)) =
                order_status_copy(*to, tracking_id);
            let mut rows = vec![NewNotification::new(
                buyer_id,
                "ORDER",
                tracking_id,
                buyer_title,
                buyer_message,
            )];
            rows.extend(supplier_user_ids.iter().map(|supplier| {
                NewNotification::new(
                    supplier,
                    "ORDER",
                    tracking_id,
                    supplier_title.clone(),
                    supplier_message.clone(),
                )
            }));
            rows
        }
        DomainEvent::PaymentConfirmed {
            tracking_id,
            buyer_id,
            supplier_user_ids,
            ..
        } => {
            let mut rows = vec![NewNotification::new(
                buyer_id,
                "PAYMENT",
                tracking_id,
                "Payment confirmed",
                format!("We have received your payment for order {tracking_id}."),
            )];
            rows.extend(supplier_user_ids.iter().map(|supplier| {
                NewNotification::new(
                    supplier,
                    "PAYMENT",
                    tracking_id,
                    "Payment confirmed",
                    format!("Payment for order {tracking_id} is confirmed. It can now be shipped."),
                )
            }));
            rows
        }
        DomainEvent::BookingCreated {
            kind,
            tracking_id,
            customer_id,
            provider_user_id,
            ..
        } => vec![
            NewNotification::new(
                customer_id,
                "BOOKING",
                tracking_id,
                "Booking received",
                format!("Your {kind} booking {tracking_id} has been received."),
            ),
            NewNotification::new(
                provider_user_id,
                "BOOKING",
                tracking_id,
                "New booking request",
                format!("You have a new {kind} booking request ({tracking_id})."),
            ),
        ],
        DomainEvent::BookingStatusChanged {
            kind,
            tracking_id,
            customer_id,
            provider_user_id,
            status,
            ..
        } => {
            let readable = status.replace('_', " ").to_lowercase();
            vec![
                NewNotification::new(
                    customer_id,
                    "BOOKING",
                    tracking_id,
                    format!("Booking {readable}"),
                    format!("Your {kind} booking {tracking_id} is now {readable}."),
                ),
                NewNotification::new(
                    provider_user_id,
                    "BOOKING",
                    tracking_id,
                    format!("Booking {readable}"),
                    format!("Booking {tracking_id} is now {readable}."),
                ),
            ]
        }
    }
}

/// Writes notification rows. Returns how many were written.
pub async fn create_notifications<C: ConnectionTrait>(
    db: &C,
    notifications: Vec<NewNotification>,
) -> Result<usize> {
    if notifications.is_empty() {
        return Ok(0);
    }

    let count = notifications.len();
    let now = chrono::Utc::now();
    let models = notifications.into_iter().map(|n| notification::ActiveModel {
        id: Set(new_id()),
        user_id: Set(n.user_id),
        title: Set(n.title),
        message: Set(n.message),
        kind: Set(n.kind.to_string()),
        link: Set(n.link),
        read: Set(false),
        created_at: Set(now),
    });

    Notification::insert_many(models).exec(db).await?;
    Ok(count)
}

/// Writes the notifications for a single event.
pub async fn deliver<C: ConnectionTrait>(db: &C, event: &DomainEvent) -> Result<usize> {
    let written = create_notifications(db, notifications_for(event)).await?;
    debug!(event = event.name(), written, "Delivered notifications");
    Ok(written)
}

/// How [`Notifier::emit`] delivers events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Deliver on a spawned task; the request does not wait.
    Background,
    /// Deliver before `emit` returns.
    Inline,
}

/// Post-commit event sink shared by the HTTP handlers.
#[derive(Debug, Clone)]
pub struct Notifier {
    db: DatabaseConnection,
    mode: DeliveryMode,
}

impl Notifier {
    #[must_use]
    pub const fn new(db: DatabaseConnection, mode: DeliveryMode) -> Self {
        Self { db, mode }
    }

    pub async fn emit(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }

        match self.mode {
            DeliveryMode::Inline => deliver_all(&self.db, &events).await,
            DeliveryMode::Background => {
                let db = self.db.clone();
                tokio::spawn(async move {
                    deliver_all(&db, &events).await;
                });
            }
        }
    }
}

async fn deliver_all(db: &DatabaseConnection, events: &[DomainEvent]) {
    for event in events {
        if let Err(e) = deliver(db, event).await {
            error!(event = event.name(), error = %e, "Failed to deliver notifications");
        }
    }
}

/// Lists a user's notifications, newest first.
pub async fn list_notifications(
    db: &DatabaseConnection,
    user_id: &str,
    unread_only: bool,
) -> Result<Vec<notification::Model>> {
    let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
    if unread_only {
        query = query.filter(notification::Column::Read.eq(false));
    }
    query
        .order_by_desc(notification::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_owned(
    db: &DatabaseConnection,
    user_id: &str,
    notification_id: &str,
) -> Result<notification::Model> {
    let found = Notification::find_by_id(notification_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Notification", notification_id))?;

    // Another user's notification is reported as missing
    if found.user_id != user_id {
        return Err(Error::not_found("Notification", notification_id));
    }
    Ok(found)
}

pub async fn mark_read(
    db: &DatabaseConnection,
    user_id: &str,
    notification_id: &str,
) -> Result<notification::Model> {
    let mut active: notification::ActiveModel =
        find_owned(db, user_id, notification_id).await?.into();
    active.read = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Marks every unread notification of a user as read. Returns the number changed.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: &str) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::Read, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::Read.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_notification(
    db: &DatabaseConnection,
    user_id: &str,
    notification_id: &str,
) -> Result<()> {
    let found = find_owned(db, user_id, notification_id).await?;
    found.delete(db).await?;
    Ok(())
}
