//! Shared test utilities for the marketplace.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test users, profiles, products and orders with sensible defaults.

use crate::{
    core::{
        access::Principal,
        ids::new_id,
        order::{OrderLine, PlaceOrder, ShippingAddressInput, place_order},
        product::{NewProduct, create_product},
        user::{
            NewProfile, create_logistics_profile, create_mechanic_profile,
            create_supplier_profile, create_user,
        },
    },
    entities::{Role, logistics_profile, mechanic_profile, order, product, supplier_profile, user},
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Routes `tracing` output through the test harness so it shows up on failure only.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a user with a unique email derived from `name`.
pub async fn create_test_user(db: &DatabaseConnection, name: &str, role: Role) -> Result<user::Model> {
    let slug: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    let email = format!("{slug}.{}@example.com", &new_id()[..8]);
    create_user(db, name, &email, role).await
}

/// Creates a supplier user, their profile and one product.
///
/// # Arguments
/// * `db` - Database connection
/// * `business_name` - Supplier business name
/// * `price` - Unit price of the product
/// * `stock` - Units in stock
pub async fn create_test_supplier_with_product(
    db: &DatabaseConnection,
    business_name: &str,
    price: f64,
    stock: i32,
) -> Result<(user::Model, supplier_profile::Model, product::Model)> {
    let owner = create_test_user(db, business_name, Role::Supplier).await?;
    let principal = Principal::new(owner.id.clone(), Role::Supplier);
    let profile = create_supplier_profile(
        db,
        &principal,
        NewProfile {
            business_name: business_name.to_string(),
            location: None,
        },
    )
    .await?;
    let product = create_product(
        db,
        &principal,
        NewProduct {
            name: format!("{business_name} brake disc"),
            price,
            stock,
        },
    )
    .await?;
    Ok((owner, profile, product))
}

/// Creates a mechanic user and their profile.
pub async fn create_test_mechanic(
    db: &DatabaseConnection,
    business_name: &str,
) -> Result<(user::Model, mechanic_profile::Model)> {
    let owner = create_test_user(db, business_name, Role::Mechanic).await?;
    let profile = create_mechanic_profile(
        db,
        &Principal::new(owner.id.clone(), Role::Mechanic),
        NewProfile {
            business_name: business_name.to_string(),
            location: Some("Surulere, Lagos".to_string()),
        },
    )
    .await?;
    Ok((owner, profile))
}

/// Creates a logistics user and their profile.
pub async fn create_test_logistics(
    db: &DatabaseConnection,
    company_name: &str,
) -> Result<(user::Model, logistics_profile::Model)> {
    let owner = create_test_user(db, company_name, Role::Logistics).await?;
    let profile = create_logistics_profile(
        db,
        &Principal::new(owner.id.clone(), Role::Logistics),
        NewProfile {
            business_name: company_name.to_string(),
            location: None,
        },
    )
    .await?;
    Ok((owner, profile))
}

/// A buyer, a supplier and one product, the starting point of most order tests.
pub struct Marketplace {
    pub db: DatabaseConnection,
    pub buyer: user::Model,
    pub supplier_user: user::Model,
    pub supplier: supplier_profile::Model,
    /// Priced 1000.0 with 5 units in stock
    pub product: product::Model,
}

impl Marketplace {
    pub fn buyer_principal(&self) -> Principal {
        Principal::new(self.buyer.id.clone(), Role::Buyer)
    }

    pub fn supplier_principal(&self) -> Principal {
        Principal::new(self.supplier_user.id.clone(), Role::Supplier)
    }
}

/// Sets up a complete test environment with a buyer, supplier and product.
pub async fn setup_marketplace() -> Result<Marketplace> {
    let db = setup_test_db().await?;
    let buyer = create_test_user(&db, "Ada Buyer", Role::Buyer).await?;
    let (supplier_user, supplier, product) =
        create_test_supplier_with_product(&db, "Prime Parts", 1000.0, 5).await?;
    Ok(Marketplace {
        db,
        buyer,
        supplier_user,
        supplier,
        product,
    })
}

/// Shipping address in Lagos.
pub fn sample_address() -> ShippingAddressInput {
    ShippingAddressInput {
        full_name: "Ada Obi".to_string(),
        phone: "+2348012345678".to_string(),
        address: "12 Allen Avenue".to_string(),
        city: "Lagos".to_string(),
        state: "Lagos".to_string(),
        postal_code: Some("100271".to_string()),
    }
}

/// Placement request for a single product line.
pub fn order_request(product_id: &str, quantity: i32, payment_method: &str) -> PlaceOrder {
    PlaceOrder {
        items: vec![OrderLine {
            product_id: product_id.to_string(),
            quantity,
            price: None,
        }],
        total: None,
        shipping_address: Some(sample_address()),
        payment_method: payment_method.to_string(),
        tracking_id: None,
    }
}

/// Places a card-paid order for the market's buyer. Card orders start `CONFIRMED`.
pub async fn place_test_order(
    market: &Marketplace,
    product_id: &str,
    quantity: i32,
) -> Result<order::Model> {
    let placed = place_order(
        &market.db,
        &market.buyer_principal(),
        order_request(product_id, quantity, "CARD"),
    )
    .await?;
    Ok(placed.order)
}

/// Places a bank-transfer order for the market's product. It starts `PENDING`.
pub async fn place_bank_transfer_order(market: &Marketplace, quantity: i32) -> Result<order::Model> {
    let placed = place_order(
        &market.db,
        &market.buyer_principal(),
        order_request(&market.product.id, quantity, "BANK TRANSFER"),
    )
    .await?;
    Ok(placed.order)
}

/// Places a card-paid order with several lines.
pub async fn place_test_order_lines(
    market: &Marketplace,
    lines: Vec<(String, i32)>,
) -> Result<order::Model> {
    let mut request = order_request("", 1, "CARD");
    request.items = lines
        .into_iter()
        .map(|(product_id, quantity)| OrderLine {
            product_id,
            quantity,
            price: None,
        })
        .collect();
    let placed = place_order(&market.db, &market.buyer_principal(), request).await?;
    Ok(placed.order)
}
