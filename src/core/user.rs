//! Users and provider profiles.
//!
//! Sign-up and sessions live outside this service; these operations register the
//! marketplace-side records a principal needs before acting in a role.

use crate::{
    core::{access::Principal, ids::new_id},
    entities::{
        LogisticsProfile, MechanicProfile, Role, SupplierProfile, User, logistics_profile,
        mechanic_profile, supplier_profile, user,
    },
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use serde::Deserialize;
use tracing::info;

const PROFILE_EXISTS: &str = "A profile already exists for this user";

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Creates a user record.
///
/// # Errors
/// `Validation` for an empty name or malformed email, `Conflict` if the email is taken.
pub async fn create_user(
    db: &DatabaseConnection,
    name: &str,
    email: &str,
    role: Role,
) -> Result<user::Model> {
    let name = required("name", name)?;
    let email = required("email", email)?.to_ascii_lowercase();
    if !email.contains('@') {
        return Err(Error::validation(format!("Invalid email '{email}'")));
    }

    let taken = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::conflict(format!("Email '{email}' is already registered")));
    }

    let created = user::ActiveModel {
        id: Set(new_id()),
        name: Set(name),
        email: Set(email.clone()),
        role: Set(role),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| Error::conflict_on_duplicate(e, format!("Email '{email}' is already registered")))?;
    info!(user = %created.id, role = %created.role, "User created");
    Ok(created)
}

/// Profile registration body shared by the three provider roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub business_name: String,
    /// Workshop location; mechanics only
    pub location: Option<String>,
}

async fn ensure_single_profile<E, C>(db: &DatabaseConnection, column: C, user_id: &str) -> Result<()>
where
    E: EntityTrait,
    C: ColumnTrait,
{
    if E::find().filter(column.eq(user_id)).one(db).await?.is_some() {
        return Err(Error::conflict(PROFILE_EXISTS));
    }
    Ok(())
}

/// Registers the caller's supplier profile.
pub async fn create_supplier_profile(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewProfile,
) -> Result<supplier_profile::Model> {
    if principal.role != Role::Supplier {
        return Err(Error::forbidden("Only suppliers can register a supplier profile"));
    }
    let business_name = required("businessName", &input.business_name)?;
    ensure_single_profile::<SupplierProfile, _>(db, supplier_profile::Column::UserId, &principal.id)
        .await?;

    supplier_profile::ActiveModel {
        id: Set(new_id()),
        user_id: Set(principal.id.clone()),
        business_name: Set(business_name),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| Error::conflict_on_duplicate(e, PROFILE_EXISTS))
}

/// Registers the caller's mechanic profile.
pub async fn create_mechanic_profile(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewProfile,
) -> Result<mechanic_profile::Model> {
    if principal.role != Role::Mechanic {
        return Err(Error::forbidden("Only mechanics can register a mechanic profile"));
    }
    let business_name = required("businessName", &input.business_name)?;
    let location = required("location", input.location.as_deref().unwrap_or_default())?;
    ensure_single_profile::<MechanicProfile, _>(db, mechanic_profile::Column::UserId, &principal.id)
        .await?;

    mechanic_profile::ActiveModel {
        id: Set(new_id()),
        user_id: Set(principal.id.clone()),
        business_name: Set(business_name),
        location: Set(location),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| Error::conflict_on_duplicate(e, PROFILE_EXISTS))
}

/// Registers the caller's logistics profile.
pub async fn create_logistics_profile(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewProfile,
) -> Result<logistics_profile::Model> {
    if principal.role != Role::Logistics {
        return Err(Error::forbidden(
            "Only logistics providers can register a logistics profile",
        ));
    }
    let company_name = required("businessName", &input.business_name)?;
    ensure_single_profile::<LogisticsProfile, _>(
        db,
        logistics_profile::Column::UserId,
        &principal.id,
    )
    .await?;

    logistics_profile::ActiveModel {
        id: Set(new_id()),
        user_id: Set(principal.id.clone()),
        company_name: Set(company_name),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| Error::conflict_on_duplicate(e, PROFILE_EXISTS))
}
