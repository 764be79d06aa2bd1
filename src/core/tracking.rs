//! Tracking-id resolution and timeline synthesis.
//!
//! A tracking id's prefix decides which table it is looked up in. The timeline is not
//! stored anywhere: it is rebuilt on every call from the entity's current status and fixed
//! offsets from its creation time, so intermediate timestamps are projections rather than
//! recorded history.

use crate::{
    entities::{
        LogisticsBooking, LogisticsBookingStatus, MechanicBooking, MechanicBookingStatus,
        MechanicProfile, Order, OrderStatus, ShippingAddress, logistics_booking,
        mechanic_booking, order, shipping_address,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, prelude::*};
use serde::Serialize;
use tracing::debug;

const PLATFORM: &str = "Edmich Autoplux";
const IN_TRANSIT: &str = "In transit";
const WAREHOUSE: &str = "Supplier warehouse";

/// Entity class a tracking id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingKind {
    Order,
    Logistics,
    Mechanic,
}

/// Canonical prefix table. Lookups are case-insensitive.
const PREFIXES: [(&str, TrackingKind); 4] = [
    ("MECH", TrackingKind::Mechanic),
    ("EDM", TrackingKind::Order),
    ("LOG", TrackingKind::Logistics),
    ("TRK", TrackingKind::Logistics),
];

/// Normalises a tracking id and decides which entity it names.
///
/// # Errors
/// `Validation` for an empty id, `NotFound` for an id with no known prefix.
pub fn classify(raw: &str) -> Result<(TrackingKind, String)> {
    let id = raw.trim().to_ascii_uppercase();
    if id.is_empty() {
        return Err(Error::validation("A tracking id is required"));
    }
    PREFIXES
        .iter()
        .find(|(prefix, _)| id.starts_with(prefix))
        .map(|(_, kind)| (*kind, id.clone()))
        .ok_or_else(|| Error::not_found("Tracking id", raw.trim()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStep {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub completed: bool,
}

impl TimelineStep {
    fn new(status: &str, timestamp: DateTime<Utc>, location: &str, completed: bool) -> Self {
        Self {
            status: status.to_string(),
            timestamp,
            location: location.to_string(),
            completed,
        }
    }
}

/// Response of `GET /track`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub tracking_id: String,
    pub kind: TrackingKind,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub timeline: Vec<TimelineStep>,
}

/// Position of a non-cancelled order status along the happy path.
const fn order_rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending | OrderStatus::Cancelled => 0,
        OrderStatus::Confirmed => 1,
        OrderStatus::Shipped => 2,
        OrderStatus::Delivered => 3,
    }
}

/// Order timeline: placed, confirmed (+1 day), shipped (+2 days), delivered (+5 days).
///
/// A cancelled order shows only when it was placed and when it was cancelled.
#[must_use]
pub fn order_timeline(
    order: &order::Model,
    address: Option<&shipping_address::Model>,
) -> Vec<TimelineStep> {
    let created = order.created_at;
    let placed = TimelineStep::new("Order Placed", created, PLATFORM, true);

    if order.status == OrderStatus::Cancelled {
        return vec![
            placed,
            TimelineStep::new("Cancelled", order.updated_at, PLATFORM, true),
        ];
    }

    let rank = order_rank(order.status);
    let city = address.map_or(PLATFORM, |a| a.city.as_str());
    vec![
        placed,
        TimelineStep::new("Order Confirmed", created + Duration::days(1), WAREHOUSE, rank >= 1),
        TimelineStep::new("Shipped", created + Duration::days(2), IN_TRANSIT, rank >= 2),
        TimelineStep::new("Delivered", created + Duration::days(5), city, rank >= 3),
    ]
}

const fn logistics_rank(status: LogisticsBookingStatus) -> u8 {
    match status {
        LogisticsBookingStatus::Pending | LogisticsBookingStatus::Cancelled => 0,
        LogisticsBookingStatus::Confirmed => 1,
        LogisticsBookingStatus::InTransit => 2,
        LogisticsBookingStatus::Delivered => 3,
    }
}

/// Logistics timeline: received, confirmed (+2 hours), in transit (+1 day), delivered (+2 days).
#[must_use]
pub fn logistics_timeline(booking: &logistics_booking::Model) -> Vec<TimelineStep> {
    let created = booking.created_at;
    let received = TimelineStep::new("Booking Received", created, &booking.pickup_address, true);

    if booking.status == LogisticsBookingStatus::Cancelled {
        return vec![
            received,
            TimelineStep::new("Cancelled", booking.updated_at, &booking.pickup_address, true),
        ];
    }

    let rank = logistics_rank(booking.status);
    vec![
        received,
        TimelineStep::new(
            "Confirmed",
            created + Duration::hours(2),
            &booking.pickup_address,
            rank >= 1,
        ),
        TimelineStep::new("In Transit", created + Duration::days(1), IN_TRANSIT, rank >= 2),
        TimelineStep::new(
            "Delivered",
            created + Duration::days(2),
            &booking.delivery_address,
            rank >= 3,
        ),
    ]
}

const fn mechanic_rank(status: MechanicBookingStatus) -> u8 {
    match status {
        MechanicBookingStatus::Pending | MechanicBookingStatus::Cancelled => 0,
        MechanicBookingStatus::Confirmed => 1,
        MechanicBookingStatus::InProgress => 2,
        MechanicBookingStatus::Completed => 3,
    }
}

/// When the service starts: the scheduled date, or a day after booking.
fn service_start(booking: &mechanic_booking::Model) -> DateTime<Utc> {
    booking
        .scheduled_date
        .unwrap_or_else(|| booking.created_at + Duration::days(1))
}

/// Mechanic timeline: received, confirmed (+1 hour), in progress (scheduled date or
/// +1 day), completed (3 hours after the service starts).
#[must_use]
pub fn mechanic_timeline(booking: &mechanic_booking::Model, workshop: &str) -> Vec<TimelineStep> {
    let created = booking.created_at;
    let received = TimelineStep::new("Booking Received", created, PLATFORM, true);

    if booking.status == MechanicBookingStatus::Cancelled {
        return vec![
            received,
            TimelineStep::new("Cancelled", booking.updated_at, PLATFORM, true),
        ];
    }

    let rank = mechanic_rank(booking.status);
    let start = service_start(booking);
    vec![
        received,
        TimelineStep::new("Confirmed", created + Duration::hours(1), workshop, rank >= 1),
        TimelineStep::new("Service In Progress", start, &booking.location, rank >= 2),
        TimelineStep::new(
            "Completed",
            start + Duration::hours(3),
            &booking.location,
            rank >= 3,
        ),
    ]
}

async fn track_order<C: ConnectionTrait>(db: &C, tracking_id: &str) -> Result<TrackingInfo> {
    let order = Order::find()
        .filter(order::Column::TrackingId.eq(tracking_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", tracking_id))?;
    let address = order.find_related(ShippingAddress).one(db).await?;

    let destination = address
        .as_ref()
        .map_or_else(|| PLATFORM.to_string(), |a| format!("{}, {}", a.city, a.state));
    Ok(TrackingInfo {
        timeline: order_timeline(&order, address.as_ref()),
        tracking_id: order.tracking_id,
        kind: TrackingKind::Order,
        status: order.status.to_string(),
        created_at: order.created_at,
        estimated_delivery: order.created_at + Duration::days(5),
        origin: WAREHOUSE.to_string(),
        destination,
    })
}

async fn track_logistics<C: ConnectionTrait>(db: &C, tracking_id: &str) -> Result<TrackingInfo> {
    let booking = LogisticsBooking::find()
        .filter(logistics_booking::Column::TrackingId.eq(tracking_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Logistics booking", tracking_id))?;

    Ok(TrackingInfo {
        timeline: logistics_timeline(&booking),
        kind: TrackingKind::Logistics,
        status: booking.status.to_string(),
        created_at: booking.created_at,
        estimated_delivery: booking.created_at + Duration::days(2),
        origin: booking.pickup_address,
        destination: booking.delivery_address,
        tracking_id: booking.tracking_id,
    })
}

async fn track_mechanic<C: ConnectionTrait>(db: &C, tracking_id: &str) -> Result<TrackingInfo> {
    let booking = MechanicBooking::find()
        .filter(mechanic_booking::Column::TrackingId.eq(tracking_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Mechanic booking", tracking_id))?;
    let workshop = MechanicProfile::find_by_id(booking.mechanic_id.clone())
        .one(db)
        .await?
        .map_or_else(|| booking.location.clone(), |m| m.location);

    Ok(TrackingInfo {
        timeline: mechanic_timeline(&booking, &workshop),
        kind: TrackingKind::Mechanic,
        status: booking.status.to_string(),
        created_at: booking.created_at,
        estimated_delivery: service_start(&booking) + Duration::hours(3),
        origin: workshop,
        destination: booking.location,
        tracking_id: booking.tracking_id,
    })
}

/// Resolves a tracking id to its entity and synthesises the timeline.
///
/// An id is only ever looked up in the table its prefix names.
pub async fn track<C: ConnectionTrait>(db: &C, raw: &str) -> Result<TrackingInfo> {
    let (kind, tracking_id) = classify(raw)?;
    debug!(%tracking_id, ?kind, "Resolving tracking id");
    match kind {
        TrackingKind::Order => track_order(db, &tracking_id).await,
        TrackingKind::Logistics => track_logistics(db, &tracking_id).await,
        TrackingKind::Mechanic => track_mechanic(db, &tracking_id).await,
    }
}
