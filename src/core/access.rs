//! Caller identity and the caller's relationship to a resource.
//!
//! Handlers never compare role strings. They resolve a closed relationship tag
//! ([`OrderRelation`], [`BookingRelation`]) and feed it to the transition tables.

use crate::{
    entities::{
        OrderItem, Product, Role, SupplierProfile, order, order_item, supplier_profile,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, prelude::*};
use std::collections::BTreeSet;

/// Authenticated caller, as produced by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the caller has `role` (admins always pass).
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role || self.is_admin() {
            Ok(())
        } else {
            Err(Error::forbidden(format!("This action requires the {role} role")))
        }
    }
}

/// How the caller relates to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRelation {
    Buyer,
    Supplier,
    Admin,
}

/// How the caller relates to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRelation {
    Customer,
    Provider,
    Admin,
}

pub async fn supplier_profile_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<Option<supplier_profile::Model>> {
    SupplierProfile::find()
        .filter(supplier_profile::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Supplier profile of the caller, or `Forbidden` if they have none.
pub async fn require_supplier_profile<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
) -> Result<supplier_profile::Model> {
    supplier_profile_for_user(db, &principal.id)
        .await?
        .ok_or_else(|| Error::forbidden("A supplier profile is required for this action"))
}

/// Distinct supplier profile ids across every item of an order.
pub async fn order_supplier_ids<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
) -> Result<BTreeSet<String>> {
    let rows = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .find_also_related(Product)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(_, product)| product.map(|p| p.supplier_id))
        .collect())
}

/// User ids behind every supplier of an order, for supplier-facing notifications.
pub async fn order_supplier_user_ids<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
) -> Result<Vec<String>> {
    let supplier_ids = order_supplier_ids(db, order_id).await?;
    if supplier_ids.is_empty() {
        return Ok(Vec::new());
    }

    let profiles = SupplierProfile::find()
        .filter(supplier_profile::Column::Id.is_in(supplier_ids))
        .all(db)
        .await?;
    Ok(profiles.into_iter().map(|p| p.user_id).collect())
}

/// Resolves the caller's relationship to an order.
///
/// A supplier relates to an order when they supply *any* of its items, not only the first.
/// Returns `None` when the caller has no business with the order.
pub async fn resolve_order_relation<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    order: &order::Model,
) -> Result<Option<OrderRelation>> {
    if principal.is_admin() {
        return Ok(Some(OrderRelation::Admin));
    }

    if principal.role == Role::Supplier
        && let Some(profile) = supplier_profile_for_user(db, &principal.id).await?
        && order_supplier_ids(db, &order.id).await?.contains(&profile.id)
    {
        return Ok(Some(OrderRelation::Supplier));
    }

    if order.user_id == principal.id {
        return Ok(Some(OrderRelation::Buyer));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_require_role() {
        let supplier = Principal::new("u1", Role::Supplier);
        assert!(supplier.require_role(Role::Supplier).is_ok());
        assert!(matches!(
            supplier.require_role(Role::Mechanic),
            Err(Error::Forbidden { .. })
        ));
        assert!(Principal::new("a", Role::Admin).require_role(Role::Supplier).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_order_relation() -> Result<()> {
        let market = setup_marketplace().await?;
        let order = place_test_order(&market, &market.product.id, 1).await?;

        let buyer = market.buyer_principal();
        let supplier = market.supplier_principal();
        let stranger = Principal::new("someone-else", Role::Buyer);
        let admin = Principal::new("admin", Role::Admin);

        assert_eq!(
            resolve_order_relation(&market.db, &buyer, &order).await?,
            Some(OrderRelation::Buyer)
        );
        assert_eq!(
            resolve_order_relation(&market.db, &supplier, &order).await?,
            Some(OrderRelation::Supplier)
        );
        assert_eq!(resolve_order_relation(&market.db, &stranger, &order).await?, None);
        assert_eq!(
            resolve_order_relation(&market.db, &admin, &order).await?,
            Some(OrderRelation::Admin)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_second_supplier_of_multi_supplier_order_is_recognised() -> Result<()> {
        let market = setup_marketplace().await?;
        let (other_user, _other_profile, other_product) =
            create_test_supplier_with_product(&market.db, "Second Parts", 4000.0, 10).await?;

        let order = place_test_order_lines(
            &market,
            vec![(market.product.id.clone(), 1), (other_product.id.clone(), 1)],
        )
        .await?;

        let second = Principal::new(other_user.id, Role::Supplier);
        assert_eq!(
            resolve_order_relation(&market.db, &second, &order).await?,
            Some(OrderRelation::Supplier)
        );
        assert_eq!(order_supplier_user_ids(&market.db, &order.id).await?.len(), 2);
        Ok(())
    }
}
