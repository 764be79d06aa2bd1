//! Mechanic and logistics booking endpoints.

use crate::{
    api::{ApiJson, AppState, orders::StatusRequest},
    core::{
        access::Principal,
        booking::{self, BookingKind, BookingRef, NewLogisticsBooking, NewMechanicBooking},
        status::parse_status,
    },
    entities::{LogisticsBookingStatus, MechanicBookingStatus, order_service_link},
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// `POST /bookings/mechanic`
pub async fn create_mechanic(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<NewMechanicBooking>,
) -> Result<Response> {
    let outcome = booking::create_mechanic_booking(&state.db, &principal, request).await?;
    state.notifier.emit(outcome.events).await;
    Ok((StatusCode::CREATED, Json(outcome.booking)).into_response())
}

/// `POST /bookings/logistics`
pub async fn create_logistics(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<NewLogisticsBooking>,
) -> Result<Response> {
    let outcome = booking::create_logistics_booking(&state.db, &principal, request).await?;
    state.notifier.emit(outcome.events).await;
    Ok((StatusCode::CREATED, Json(outcome.booking)).into_response())
}

/// `GET /bookings/{kind}/{id}`
pub async fn get_booking(
    State(state): State<AppState>,
    principal: Principal,
    Path((kind, booking_id)): Path<(String, String)>,
) -> Result<Response> {
    let response = match kind.parse::<BookingKind>()? {
        BookingKind::Mechanic => {
            Json(booking::get_mechanic_booking(&state.db, &principal, &booking_id).await?)
                .into_response()
        }
        BookingKind::Logistics => {
            Json(booking::get_logistics_booking(&state.db, &principal, &booking_id).await?)
                .into_response()
        }
    };
    Ok(response)
}

/// `PATCH /bookings/{kind}/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    principal: Principal,
    Path((kind, booking_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> Result<Response> {
    let response = match kind.parse::<BookingKind>()? {
        BookingKind::Mechanic => {
            let requested: MechanicBookingStatus = parse_status(&request.status)?;
            let outcome =
                booking::update_mechanic_booking_status(&state.db, &principal, &booking_id, requested)
                    .await?;
            state.notifier.emit(outcome.events).await;
            Json(outcome.booking).into_response()
        }
        BookingKind::Logistics => {
            let requested: LogisticsBookingStatus = parse_status(&request.status)?;
            let outcome = booking::update_logistics_booking_status(
                &state.db,
                &principal,
                &booking_id,
                requested,
            )
            .await?;
            state.notifier.emit(outcome.events).await;
            Json(outcome.booking).into_response()
        }
    };
    Ok(response)
}

/// `POST /orders/{id}/services`
pub async fn link_to_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<String>,
    ApiJson(request): ApiJson<BookingRef>,
) -> Result<(StatusCode, Json<order_service_link::Model>)> {
    let link = booking::link_booking_to_order(&state.db, &principal, &order_id, request).await?;
    Ok((StatusCode::CREATED, Json(link)))
}
