//! Provider profile registration.

use crate::{
    api::{ApiJson, AppState},
    core::{
        access::Principal,
        user::{self, NewProfile},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// `POST /profiles/{role}` where `role` is `supplier`, `mechanic` or `logistics`.
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Path(role): Path<String>,
    ApiJson(input): ApiJson<NewProfile>,
) -> Result<Response> {
    let body = match role.as_str() {
        "supplier" => Json(user::create_supplier_profile(&state.db, &principal, input).await?)
            .into_response(),
        "mechanic" => Json(user::create_mechanic_profile(&state.db, &principal, input).await?)
            .into_response(),
        "logistics" => Json(user::create_logistics_profile(&state.db, &principal, input).await?)
            .into_response(),
        other => return Err(Error::validation(format!("Unknown profile type '{other}'"))),
    };
    Ok((StatusCode::CREATED, body).into_response())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::{
        api::test_support::TestApp, core::access::Principal, entities::Role, test_utils::*,
    };
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_mechanic_profile() {
        let db = setup_test_db().await.unwrap();
        let user = create_test_user(&db, "Tunde", Role::Mechanic).await.unwrap();
        let app = TestApp::new(db);
        let token = app.token(&Principal::new(user.id, Role::Mechanic)).unwrap();

        let (status, _) = app
            .send(
                Method::POST,
                "/profiles/mechanic",
                Some(&token),
                Some(json!({ "businessName": "Tunde Autos" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = json!({ "businessName": "Tunde Autos", "location": "Yaba, Lagos" });
        let (status, created) = app
            .send(Method::POST, "/profiles/mechanic", Some(&token), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["location"], "Yaba, Lagos");

        let (status, _) = app
            .send(Method::POST, "/profiles/mechanic", Some(&token), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(Method::POST, "/profiles/supplier", Some(&token), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(Method::POST, "/profiles/plumber", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
