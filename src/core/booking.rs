//! Mechanic and logistics bookings.
//!
//! Both booking kinds share one lifecycle shape, expressed as [`BookingStage`]:
//! pending, confirmed, an active stage (`IN_PROGRESS` / `IN_TRANSIT`), a done stage
//! (`COMPLETED` / `DELIVERED`) and cancelled. Transition rules are written once against
//! the stage and mapped back to each kind's status enum.

use crate::{
    core::{
        access::{BookingRelation, Principal},
        events::DomainEvent,
        ids::{LOGISTICS_PREFIX, MECHANIC_PREFIX, new_id, new_tracking_id},
    },
    entities::{
        LogisticsBooking, LogisticsBookingStatus, LogisticsProfile, MechanicBooking,
        MechanicBookingStatus, MechanicProfile, Order, OrderServiceLink, logistics_booking,
        mechanic_booking, order_service_link,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;
use std::{fmt, str::FromStr};
use tracing::{info, instrument, warn};

/// Which booking table a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingKind {
    Mechanic,
    Logistics,
}

impl fmt::Display for BookingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mechanic => f.write_str("mechanic"),
            Self::Logistics => f.write_str("logistics"),
        }
    }
}

impl FromStr for BookingKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mechanic" => Ok(Self::Mechanic),
            "logistics" => Ok(Self::Logistics),
            other => Err(Error::validation(format!(
                "Unknown booking kind '{other}', expected 'mechanic' or 'logistics'"
            ))),
        }
    }
}

/// Lifecycle stage shared by both booking kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Pending,
    Confirmed,
    Active,
    Done,
    Cancelled,
}

impl BookingStage {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Active,
        Self::Done,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// A kind-specific booking status that maps one-to-one onto [`BookingStage`].
pub trait StagedStatus: Copy + PartialEq + fmt::Display {
    fn stage(self) -> BookingStage;
    fn from_stage(stage: BookingStage) -> Self;
}

impl StagedStatus for MechanicBookingStatus {
    fn stage(self) -> BookingStage {
        match self {
            Self::Pending => BookingStage::Pending,
            Self::Confirmed => BookingStage::Confirmed,
            Self::InProgress => BookingStage::Active,
            Self::Completed => BookingStage::Done,
            Self::Cancelled => BookingStage::Cancelled,
        }
    }

    fn from_stage(stage: BookingStage) -> Self {
        match stage {
            BookingStage::Pending => Self::Pending,
            BookingStage::Confirmed => Self::Confirmed,
            BookingStage::Active => Self::InProgress,
            BookingStage::Done => Self::Completed,
            BookingStage::Cancelled => Self::Cancelled,
        }
    }
}

impl StagedStatus for LogisticsBookingStatus {
    fn stage(self) -> BookingStage {
        match self {
            Self::Pending => BookingStage::Pending,
            Self::Confirmed => BookingStage::Confirmed,
            Self::InTransit => BookingStage::Active,
            Self::Delivered => BookingStage::Done,
            Self::Cancelled => BookingStage::Cancelled,
        }
    }

    fn from_stage(stage: BookingStage) -> Self {
        match stage {
            BookingStage::Pending => Self::Pending,
            BookingStage::Confirmed => Self::Confirmed,
            BookingStage::Active => Self::InTransit,
            BookingStage::Done => Self::Delivered,
            BookingStage::Cancelled => Self::Cancelled,
        }
    }
}

/// Next stages the given actor may move a booking to.
#[must_use]
pub fn allowed_booking_transitions(
    relation: BookingRelation,
    current: BookingStage,
) -> Vec<BookingStage> {
    if current.is_terminal() {
        return Vec::new();
    }
    match (relation, current) {
        (BookingRelation::Provider, BookingStage::Pending) => {
            vec![BookingStage::Confirmed, BookingStage::Cancelled]
        }
        (BookingRelation::Provider, BookingStage::Confirmed) => {
            vec![BookingStage::Active, BookingStage::Cancelled]
        }
        (BookingRelation::Provider, BookingStage::Active) => vec![BookingStage::Done],
        (BookingRelation::Customer, BookingStage::Pending | BookingStage::Confirmed) => {
            vec![BookingStage::Cancelled]
        }
        (BookingRelation::Admin, _) => BookingStage::ALL
            .into_iter()
            .filter(|stage| *stage != current)
            .collect(),
        _ => Vec::new(),
    }
}

fn check_booking_transition<S: StagedStatus>(
    relation: BookingRelation,
    current: S,
    requested: S,
) -> Result<()> {
    let allowed = allowed_booking_transitions(relation, current.stage());
    if allowed.contains(&requested.stage()) {
        return Ok(());
    }
    Err(Error::InvalidTransition {
        current: current.to_string(),
        requested: requested.to_string(),
        allowed: allowed
            .into_iter()
            .map(|stage| S::from_stage(stage).to_string())
            .collect(),
    })
}

fn booking_relation(
    principal: &Principal,
    customer_id: &str,
    provider_user_id: &str,
) -> Option<BookingRelation> {
    if principal.is_admin() {
        Some(BookingRelation::Admin)
    } else if principal.id == provider_user_id {
        Some(BookingRelation::Provider)
    } else if principal.id == customer_id {
        Some(BookingRelation::Customer)
    } else {
        None
    }
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: Option<f64>) -> Result<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => {
            Err(Error::validation("Booking price must be a non-negative amount"))
        }
        _ => Ok(()),
    }
}

/// Result of a booking mutation: the stored row and the events to emit.
#[derive(Debug, Clone)]
pub struct BookingOutcome<M> {
    pub booking: M,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMechanicBooking {
    /// Mechanic profile the job is booked with
    pub mechanic_id: String,
    pub service_type: String,
    pub vehicle: String,
    pub description: Option<String>,
    pub location: String,
    pub scheduled_date: Option<DateTimeUtc>,
    pub price: Option<f64>,
}

async fn mechanic_provider_user_id<C: ConnectionTrait>(db: &C, mechanic_id: &str) -> Result<String> {
    MechanicProfile::find_by_id(mechanic_id.to_string())
        .one(db)
        .await?
        .map(|profile| profile.user_id)
        .ok_or_else(|| Error::not_found("Mechanic", mechanic_id))
}

/// Books a mechanic. The booking starts `PENDING` with a fresh `MECH…` tracking id.
#[instrument(skip(db, input), fields(user = %principal.id))]
pub async fn create_mechanic_booking(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewMechanicBooking,
) -> Result<BookingOutcome<mechanic_booking::Model>> {
    let service_type = require_text("serviceType", &input.service_type)?;
    let vehicle = require_text("vehicle", &input.vehicle)?;
    let location = require_text("location", &input.location)?;
    validate_price(input.price)?;

    let provider_user_id = mechanic_provider_user_id(db, &input.mechanic_id).await?;

    let now = chrono::Utc::now();
    let booking = mechanic_booking::ActiveModel {
        id: Set(new_id()),
        tracking_id: Set(new_tracking_id(MECHANIC_PREFIX)),
        user_id: Set(principal.id.clone()),
        mechanic_id: Set(input.mechanic_id),
        service_type: Set(service_type),
        vehicle: Set(vehicle),
        description: Set(input.description.filter(|d| !d.trim().is_empty())),
        location: Set(location),
        scheduled_date: Set(input.scheduled_date),
        status: Set(MechanicBookingStatus::Pending),
        price: Set(input.price),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(booking = %booking.id, tracking_id = %booking.tracking_id, "Mechanic booking created");

    let events = vec![DomainEvent::BookingCreated {
        kind: BookingKind::Mechanic,
        booking_id: booking.id.clone(),
        tracking_id: booking.tracking_id.clone(),
        customer_id: booking.user_id.clone(),
        provider_user_id,
    }];
    Ok(BookingOutcome { booking, events })
}

async fn load_mechanic_booking<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    booking_id: &str,
) -> Result<(mechanic_booking::Model, BookingRelation, String)> {
    let booking = MechanicBooking::find_by_id(booking_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Mechanic booking", booking_id))?;
    let provider_user_id = mechanic_provider_user_id(db, &booking.mechanic_id).await?;
    let relation = booking_relation(principal, &booking.user_id, &provider_user_id)
        .ok_or_else(|| Error::forbidden("You do not have access to this booking"))?;
    Ok((booking, relation, provider_user_id))
}

/// Fetches a mechanic booking visible to its customer, its mechanic or an admin.
pub async fn get_mechanic_booking(
    db: &DatabaseConnection,
    principal: &Principal,
    booking_id: &str,
) -> Result<mechanic_booking::Model> {
    load_mechanic_booking(db, principal, booking_id)
        .await
        .map(|(booking, _, _)| booking)
}

/// Moves a mechanic booking to `requested`, subject to the caller's transition table.
#[instrument(skip(db), fields(user = %principal.id))]
pub async fn update_mechanic_booking_status(
    db: &DatabaseConnection,
    principal: &Principal,
    booking_id: &str,
    requested: MechanicBookingStatus,
) -> Result<BookingOutcome<mechanic_booking::Model>> {
    let (booking, relation, provider_user_id) =
        load_mechanic_booking(db, principal, booking_id).await?;
    check_booking_transition(relation, booking.status, requested)?;

    let result = MechanicBooking::update_many()
        .col_expr(mechanic_booking::Column::Status, Expr::value(requested))
        .col_expr(
            mechanic_booking::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(mechanic_booking::Column::Id.eq(booking_id))
        .filter(mechanic_booking::Column::Status.eq(booking.status))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        warn!(booking = %booking_id, "Mechanic booking changed concurrently");
        return Err(Error::conflict(
            "Booking status changed while the update was processed",
        ));
    }

    let updated = MechanicBooking::find_by_id(booking_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Mechanic booking", booking_id))?;

    info!(booking = %booking_id, from = %booking.status, to = %requested, "Mechanic booking status changed");

    let events = vec![DomainEvent::BookingStatusChanged {
        kind: BookingKind::Mechanic,
        booking_id: updated.id.clone(),
        tracking_id: updated.tracking_id.clone(),
        customer_id: updated.user_id.clone(),
        provider_user_id,
        status: requested.to_string(),
    }];
    Ok(BookingOutcome {
        booking: updated,
        events,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogisticsBooking {
    /// Logistics profile that will carry the package
    pub logistics_id: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub package_description: String,
    pub weight_kg: Option<f64>,
    pub price: Option<f64>,
}

async fn logistics_provider_user_id<C: ConnectionTrait>(
    db: &C,
    logistics_id: &str,
) -> Result<String> {
    LogisticsProfile::find_by_id(logistics_id.to_string())
        .one(db)
        .await?
        .map(|profile| profile.user_id)
        .ok_or_else(|| Error::not_found("Logistics provider", logistics_id))
}

/// Books a delivery. The booking starts `PENDING` with a fresh `LOG…` tracking id.
#[instrument(skip(db, input), fields(user = %principal.id))]
pub async fn create_logistics_booking(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewLogisticsBooking,
) -> Result<BookingOutcome<logistics_booking::Model>> {
    let pickup_address = require_text("pickupAddress", &input.pickup_address)?;
    let delivery_address = require_text("deliveryAddress", &input.delivery_address)?;
    let package_description = require_text("packageDescription", &input.package_description)?;
    if let Some(weight) = input.weight_kg
        && (!weight.is_finite() || weight <= 0.0)
    {
        return Err(Error::validation("weightKg must be a positive number"));
    }
    validate_price(input.price)?;

    let provider_user_id = logistics_provider_user_id(db, &input.logistics_id).await?;

    let now = chrono::Utc::now();
    let booking = logistics_booking::ActiveModel {
        id: Set(new_id()),
        tracking_id: Set(new_tracking_id(LOGISTICS_PREFIX)),
        user_id: Set(principal.id.clone()),
        logistics_id: Set(input.logistics_id),
        pickup_address: Set(pickup_address),
        delivery_address: Set(delivery_address),
        package_description: Set(package_description),
        weight_kg: Set(input.weight_kg),
        status: Set(LogisticsBookingStatus::Pending),
        price: Set(input.price),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(booking = %booking.id, tracking_id = %booking.tracking_id, "Logistics booking created");

    let events = vec![DomainEvent::BookingCreated {
        kind: BookingKind::Logistics,
        booking_id: booking.id.clone(),
        tracking_id: booking.tracking_id.clone(),
        customer_id: booking.user_id.clone(),
        provider_user_id,
    }];
    Ok(BookingOutcome { booking, events })
}

async fn load_logistics_booking<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    booking_id: &str,
) -> Result<(logistics_booking::Model, BookingRelation, String)> {
    let booking = LogisticsBooking::find_by_id(booking_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Logistics booking", booking_id))?;
    let provider_user_id = logistics_provider_user_id(db, &booking.logistics_id).await?;
    let relation = booking_relation(principal, &booking.user_id, &provider_user_id)
        .ok_or_else(|| Error::forbidden("You do not have access to this booking"))?;
    Ok((booking, relation, provider_user_id))
}

/// Fetches a logistics booking visible to its customer, its carrier or an admin.
pub async fn get_logistics_booking(
    db: &DatabaseConnection,
    principal: &Principal,
    booking_id: &str,
) -> Result<logistics_booking::Model> {
    load_logistics_booking(db, principal, booking_id)
        .await
        .map(|(booking, _, _)| booking)
}

/// Moves a logistics booking to `requested`, subject to the caller's transition table.
#[instrument(skip(db), fields(user = %principal.id))]
pub async fn update_logistics_booking_status(
    db: &DatabaseConnection,
    principal: &Principal,
    booking_id: &str,
    requested: LogisticsBookingStatus,
) -> Result<BookingOutcome<logistics_booking::Model>> {
    let (booking, relation, provider_user_id) =
        load_logistics_booking(db, principal, booking_id).await?;
    check_booking_transition(relation, booking.status, requested)?;

    let result = LogisticsBooking::update_many()
        .col_expr(logistics_booking::Column::Status, Expr::value(requested))
        .col_expr(
            logistics_booking::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(logistics_booking::Column::Id.eq(booking_id))
        .filter(logistics_booking::Column::Status.eq(booking.status))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        warn!(booking = %booking_id, "Logistics booking changed concurrently");
        return Err(Error::conflict(
            "Booking status changed while the update was processed",
        ));
    }

    let updated = LogisticsBooking::find_by_id(booking_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Logistics booking", booking_id))?;

    info!(booking = %booking_id, from = %booking.status, to = %requested, "Logistics booking status changed");

    let events = vec![DomainEvent::BookingStatusChanged {
        kind: BookingKind::Logistics,
        booking_id: updated.id.clone(),
        tracking_id: updated.tracking_id.clone(),
        customer_id: updated.user_id.clone(),
        provider_user_id,
        status: requested.to_string(),
    }];
    Ok(BookingOutcome {
        booking: updated,
        events,
    })
}

/// A booking to attach to an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRef {
    pub kind: String,
    pub booking_id: String,
}

/// Links a booking the caller owns to an order the caller bought.
///
/// An order carries at most one mechanic link and one logistics link; a second link of the
/// same kind is rejected with `Conflict`.
#[instrument(skip(db), fields(user = %principal.id))]
pub async fn link_booking_to_order(
    db: &DatabaseConnection,
    principal: &Principal,
    order_id: &str,
    booking: BookingRef,
) -> Result<order_service_link::Model> {
    let kind: BookingKind = booking.kind.parse()?;

    let order = Order::find_by_id(order_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    if order.user_id != principal.id && !principal.is_admin() {
        return Err(Error::forbidden("You can only link services to your own orders"));
    }

    let booking_owner = match kind {
        BookingKind::Mechanic => MechanicBooking::find_by_id(booking.booking_id.clone())
            .one(db)
            .await?
            .map(|b| b.user_id),
        BookingKind::Logistics => LogisticsBooking::find_by_id(booking.booking_id.clone())
            .one(db)
            .await?
            .map(|b| b.user_id),
    }
    .ok_or_else(|| Error::not_found("Booking", booking.booking_id.clone()))?;
    if booking_owner != order.user_id {
        return Err(Error::forbidden(
            "The booking must belong to the buyer of the order",
        ));
    }

    let link_column = match kind {
        BookingKind::Mechanic => order_service_link::Column::MechanicBookingId,
        BookingKind::Logistics => order_service_link::Column::LogisticsBookingId,
    };
    let existing = OrderServiceLink::find()
        .filter(order_service_link::Column::OrderId.eq(order_id))
        .filter(link_column.is_not_null())
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict(format!(
            "Order already has a {kind} booking linked"
        )));
    }

    let (mechanic_booking_id, logistics_booking_id) = match kind {
        BookingKind::Mechanic => (Some(booking.booking_id), None),
        BookingKind::Logistics => (None, Some(booking.booking_id)),
    };
    let link = order_service_link::ActiveModel {
        id: Set(new_id()),
        order_id: Set(order.id),
        mechanic_booking_id: Set(mechanic_booking_id),
        logistics_booking_id: Set(logistics_booking_id),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await?;

    info!(order = %order_id, %kind, "Booking linked to order");
    Ok(link)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{entities::Role, test_utils::*};

    fn mechanic_request(mechanic_id: &str) -> NewMechanicBooking {
        NewMechanicBooking {
            mechanic_id: mechanic_id.to_string(),
            service_type: "Brake service".to_string(),
            vehicle: "Toyota Corolla 2015".to_string(),
            description: None,
            location: "Ikeja, Lagos".to_string(),
            scheduled_date: None,
            price: Some(15000.0),
        }
    }

    fn logistics_request(logistics_id: &str) -> NewLogisticsBooking {
        NewLogisticsBooking {
            logistics_id: logistics_id.to_string(),
            pickup_address: "12 Allen Avenue, Ikeja".to_string(),
            delivery_address: "4 Marina Road, Lagos Island".to_string(),
            package_description: "Gearbox".to_string(),
            weight_kg: Some(40.0),
            price: None,
        }
    }

    #[test]
    fn test_booking_kind_parsing() {
        assert_eq!("Mechanic".parse::<BookingKind>().unwrap(), BookingKind::Mechanic);
        assert_eq!(" logistics ".parse::<BookingKind>().unwrap(), BookingKind::Logistics);
        assert!(matches!(
            "plumber".parse::<BookingKind>(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_transition_tables() {
        assert_eq!(
            allowed_booking_transitions(BookingRelation::Provider, BookingStage::Pending),
            vec![BookingStage::Confirmed, BookingStage::Cancelled]
        );
        assert_eq!(
            allowed_booking_transitions(BookingRelation::Customer, BookingStage::Active),
            Vec::<BookingStage>::new()
        );
        assert_eq!(
            allowed_booking_transitions(BookingRelation::Admin, BookingStage::Confirmed).len(),
            4
        );
        for relation in [
            BookingRelation::Provider,
            BookingRelation::Customer,
            BookingRelation::Admin,
        ] {
            assert!(allowed_booking_transitions(relation, BookingStage::Done).is_empty());
            assert!(allowed_booking_transitions(relation, BookingStage::Cancelled).is_empty());
        }
    }

    #[test]
    fn test_invalid_transition_names_kind_statuses() {
        let err = check_booking_transition(
            BookingRelation::Provider,
            LogisticsBookingStatus::Pending,
            LogisticsBookingStatus::Delivered,
        )
        .unwrap_err();
        match err {
            Error::InvalidTransition { allowed, .. } => {
                assert_eq!(allowed, vec!["CONFIRMED", "CANCELLED"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mechanic_booking_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_user(&db, "Ada", Role::Buyer).await?;
        let (mechanic_user, profile) = create_test_mechanic(&db, "Fix Masters").await?;
        let customer = Principal::new(customer.id, Role::Buyer);
        let mechanic = Principal::new(mechanic_user.id, Role::Mechanic);

        let created = create_mechanic_booking(&db, &customer, mechanic_request(&profile.id)).await?;
        assert!(created.booking.tracking_id.starts_with("MECH"));
        assert_eq!(created.booking.status, MechanicBookingStatus::Pending);
        assert_eq!(created.events.len(), 1);

        let id = created.booking.id;
        let confirmed =
            update_mechanic_booking_status(&db, &mechanic, &id, MechanicBookingStatus::Confirmed)
                .await?;
        assert_eq!(confirmed.booking.status, MechanicBookingStatus::Confirmed);

        // Customers cannot start the job
        let result =
            update_mechanic_booking_status(&db, &customer, &id, MechanicBookingStatus::InProgress)
                .await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        update_mechanic_booking_status(&db, &mechanic, &id, MechanicBookingStatus::InProgress)
            .await?;
        update_mechanic_booking_status(&db, &mechanic, &id, MechanicBookingStatus::Completed)
            .await?;

        // Completed is terminal, even for admins
        let admin = Principal::new("admin", Role::Admin);
        let result =
            update_mechanic_booking_status(&db, &admin, &id, MechanicBookingStatus::Pending).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_booking_visibility() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_user(&db, "Ada", Role::Buyer).await?;
        let (_, profile) = create_test_logistics(&db, "Swift Haulage").await?;
        let customer = Principal::new(customer.id, Role::Buyer);

        let created =
            create_logistics_booking(&db, &customer, logistics_request(&profile.id)).await?;
        assert!(created.booking.tracking_id.starts_with("LOG"));

        let fetched = get_logistics_booking(&db, &customer, &created.booking.id).await?;
        assert_eq!(fetched.id, created.booking.id);

        let stranger = Principal::new("stranger", Role::Buyer);
        let result = get_logistics_booking(&db, &stranger, &created.booking.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let result = get_logistics_booking(&db, &customer, "missing").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_customer_can_cancel_pending_logistics_booking() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_user(&db, "Ada", Role::Buyer).await?;
        let (_, profile) = create_test_logistics(&db, "Swift Haulage").await?;
        let customer = Principal::new(customer.id, Role::Buyer);

        let created =
            create_logistics_booking(&db, &customer, logistics_request(&profile.id)).await?;
        let cancelled = update_logistics_booking_status(
            &db,
            &customer,
            &created.booking.id,
            LogisticsBookingStatus::Cancelled,
        )
        .await?;
        assert_eq!(cancelled.booking.status, LogisticsBookingStatus::Cancelled);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_booking_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = Principal::new("c", Role::Buyer);

        let result = create_mechanic_booking(&db, &customer, mechanic_request("no-such-mechanic")).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let mut request = logistics_request("any");
        request.weight_kg = Some(-2.0);
        let result = create_logistics_booking(&db, &customer, request).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_link_booking_to_order() -> Result<()> {
        let market = setup_marketplace().await?;
        let order = place_test_order(&market, &market.product.id, 1).await?;
        let buyer = market.buyer_principal();
        let (_, mechanic) = create_test_mechanic(&market.db, "Fix Masters").await?;

        let first = create_mechanic_booking(&market.db, &buyer, mechanic_request(&mechanic.id)).await?;
        let second =
            create_mechanic_booking(&market.db, &buyer, mechanic_request(&mechanic.id)).await?;

        let link = link_booking_to_order(
            &market.db,
            &buyer,
            &order.id,
            BookingRef {
                kind: "mechanic".to_string(),
                booking_id: first.booking.id.clone(),
            },
        )
        .await?;
        assert_eq!(link.mechanic_booking_id.as_deref(), Some(first.booking.id.as_str()));

        let result = link_booking_to_order(
            &market.db,
            &buyer,
            &order.id,
            BookingRef {
                kind: "mechanic".to_string(),
                booking_id: second.booking.id,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        // Suppliers cannot link services to someone else's order
        let result = link_booking_to_order(
            &market.db,
            &market.supplier_principal(),
            &order.id,
            BookingRef {
                kind: "mechanic".to_string(),
                booking_id: first.booking.id,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }
}
