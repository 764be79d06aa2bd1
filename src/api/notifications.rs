//! Notification inbox endpoints.

use crate::{
    api::AppState,
    core::{access::Principal, notification},
    entities::notification as notification_entity,
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// `GET /notifications[?unread=true]`
pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<notification_entity::Model>>> {
    let inbox = notification::list_notifications(&state.db, &principal.id, query.unread).await?;
    Ok(Json(inbox))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    principal: Principal,
    Path(notification_id): Path<String>,
) -> Result<Json<notification_entity::Model>> {
    let read = notification::mark_read(&state.db, &principal.id, &notification_id).await?;
    Ok(Json(read))
}

/// `POST /notifications/read-all`
pub async fn mark_all_read(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<MarkedRead>> {
    let updated = notification::mark_all_read(&state.db, &principal.id).await?;
    Ok(Json(MarkedRead { updated }))
}

/// `DELETE /notifications/{id}`
pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(notification_id): Path<String>,
) -> Result<StatusCode> {
    notification::delete_notification(&state.db, &principal.id, &notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::{api::test_support::TestApp, test_utils::*};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_inbox_over_http() {
        let market = setup_marketplace().await.unwrap();
        let app = TestApp::new(market.db.clone());
        let buyer = app.token(&market.buyer_principal()).unwrap();
        let supplier = app.token(&market.supplier_principal()).unwrap();
        let order = place_bank_transfer_order(&market, 1).await.unwrap();

        // Cancelling notifies buyer and supplier
        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/orders/{}/status", order.id),
                Some(&buyer),
                Some(serde_json::json!({ "status": "CANCELLED" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, inbox) = app
            .send(Method::GET, "/notifications?unread=true", Some(&supplier), None)
            .await;
        let inbox = inbox.as_array().unwrap().clone();
        assert_eq!(inbox.len(), 1);
        let id = inbox[0]["id"].as_str().unwrap();

        // Buyers cannot read the supplier's notification
        let (status, _) = app
            .send(Method::POST, &format!("/notifications/{id}/read"), Some(&buyer), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .send(Method::POST, &format!("/notifications/{id}/read"), Some(&supplier), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read"], true);

        let (status, body) = app
            .send(Method::POST, "/notifications/read-all", Some(&buyer), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 1);

        let (status, _) = app
            .send(Method::DELETE, &format!("/notifications/{id}"), Some(&supplier), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
