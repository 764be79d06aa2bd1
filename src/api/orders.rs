//! Order endpoints.

use crate::{
    api::{ApiJson, AppState},
    core::{self, access::Principal, order::PlaceOrder, status::parse_status},
    entities::{OrderStatus, order},
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order_id: String,
    pub tracking_id: String,
    pub status: OrderStatus,
    pub total: f64,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderUpdateResponse {
    pub order: order::Model,
    pub message: String,
}

/// `POST /orders`
pub async fn place_order(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<PlaceOrder>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>)> {
    let placed = core::order::place_order(&state.db, &principal, request).await?;
    state.notifier.emit(placed.events).await;

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            order_id: placed.order.id,
            tracking_id: placed.order.tracking_id,
            status: placed.order.status,
            total: placed.order.total,
        }),
    ))
}

/// `GET /orders`
pub async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<order::Model>>> {
    let orders = core::order::list_orders(&state.db, &principal).await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<String>,
) -> Result<Json<core::order::OrderDetails>> {
    let details = core::order::get_order_details(&state.db, &principal, &order_id).await?;
    Ok(Json(details))
}

/// `PATCH /orders/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<String>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> Result<Json<OrderUpdateResponse>> {
    let requested: OrderStatus = parse_status(&request.status)?;
    let update =
        core::status::update_order_status(&state.db, &principal, &order_id, requested).await?;
    state.notifier.emit(update.events).await;

    Ok(Json(OrderUpdateResponse {
        order: update.order,
        message: update.message,
    }))
}

/// `POST /orders/{id}/payment/confirm`
pub async fn confirm_payment(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<String>,
) -> Result<Json<OrderUpdateResponse>> {
    let confirmation = core::payment::confirm_payment(&state.db, &principal, &order_id).await?;
    state.notifier.emit(confirmation.events).await;

    Ok(Json(OrderUpdateResponse {
        order: confirmation.order,
        message: "Payment confirmed".to_string(),
    }))
}
