//! Supplier catalogue endpoints.

use crate::{
    api::{ApiJson, AppState},
    core::{
        access::Principal,
        product::{self, NewProduct, ProductUpdate},
    },
    entities::product as product_entity,
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// `POST /products`
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(input): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<product_entity::Model>)> {
    let created = product::create_product(&state.db, &principal, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /products/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<product_entity::Model>> {
    product::get_product_by_id(&state.db, &product_id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Product", product_id))
}

/// `GET /suppliers/{id}/products`
pub async fn list_for_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
) -> Result<Json<Vec<product_entity::Model>>> {
    let products = product::get_products_for_supplier(&state.db, &supplier_id).await?;
    Ok(Json(products))
}

/// `PATCH /products/{id}`
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<String>,
    ApiJson(changes): ApiJson<ProductUpdate>,
) -> Result<Json<product_entity::Model>> {
    let updated = product::update_product(&state.db, &principal, &product_id, changes).await?;
    Ok(Json(updated))
}
