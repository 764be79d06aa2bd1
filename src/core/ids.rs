//! Identifier generation.

use uuid::Uuid;

/// Tracking prefix for orders.
pub const ORDER_PREFIX: &str = "EDM";
/// Tracking prefix for logistics bookings.
pub const LOGISTICS_PREFIX: &str = "LOG";
/// Tracking prefix for mechanic bookings.
pub const MECHANIC_PREFIX: &str = "MECH";

/// New primary key.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// New human-readable tracking id: prefix followed by ten upper-case hex characters.
#[must_use]
pub fn new_tracking_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}{}", &suffix[..10])
}
