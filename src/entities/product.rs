//! Product entity - Represents a part listed by a supplier.
//!
//! `stock` is the only contended counter in the system. It is never written with a
//! read-modify-write; every decrement is a conditional `UPDATE ... WHERE stock >= qty`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Supplier profile that lists this product
    pub supplier_id: String,
    pub name: String,
    /// Current unit price; order items keep their own snapshot
    pub price: f64,
    /// Units available, never negative
    pub stock: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one supplier
    #[sea_orm(
        belongs_to = "super::supplier_profile::Entity",
        from = "Column::SupplierId",
        to = "super::supplier_profile::Column::Id"
    )]
    Supplier,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::supplier_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
