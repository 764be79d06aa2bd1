//! Core business logic - framework-agnostic marketplace operations.
//!
//! Everything here works against a `SeaORM` connection and returns [`crate::errors::Result`].
//! Operations that change state hand back [`events::DomainEvent`]s instead of writing
//! notifications themselves; the caller emits them after the commit point.

/// Caller identity and its relationship to orders and bookings
pub mod access;
/// Mechanic and logistics bookings, their status machines and order links
pub mod booking;
/// Domain events produced by state changes
pub mod events;
/// Identifier and tracking-id generation
pub mod ids;
/// Notification copy, delivery and inbox operations
pub mod notification;
/// Order placement and queries
pub mod order;
/// Payment confirmation
pub mod payment;
/// Supplier catalogue and stock counters
pub mod product;
/// Order status state machine
pub mod status;
/// Tracking-id resolution and timeline synthesis
pub mod tracking;
/// Users and provider profiles
pub mod user;
/// Supplier wallets, delivery credits and withdrawals
pub mod wallet;
