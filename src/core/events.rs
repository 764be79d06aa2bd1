//! Domain events.
//!
//! A state-changing operation returns the events it caused. They are emitted only after
//! the database transaction has committed, and their delivery can never fail the
//! operation that produced them.

use crate::core::booking::BookingKind;
use crate::entities::OrderStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    OrderPlaced {
        order_id: String,
        tracking_id: String,
        buyer_id: String,
        total: f64,
    },
    OrderStatusChanged {
        order_id: String,
        tracking_id: String,
        buyer_id: String,
        supplier_user_ids: Vec<String>,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentConfirmed {
        order_id: String,
        tracking_id: String,
        buyer_id: String,
        supplier_user_ids: Vec<String>,
    },
    BookingCreated {
        kind: BookingKind,
        booking_id: String,
        tracking_id: String,
        customer_id: String,
        provider_user_id: String,
    },
    BookingStatusChanged {
        kind: BookingKind,
        booking_id: String,
        tracking_id: String,
        customer_id: String,
        provider_user_id: String,
        status: String,
    },
}

impl DomainEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::BookingCreated { .. } => "booking_created",
            Self::BookingStatusChanged { .. } => "booking_status_changed",
        }
    }
}
