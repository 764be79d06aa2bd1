//! Unified error type for the marketplace service.
//!
//! Every core operation returns [`Result`]. The HTTP layer turns an [`Error`] into a
//! `{ "error", "message", "details"? }` body with the matching status code.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// One line of an itemized stock shortfall.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    /// Product that cannot cover the request
    pub product_id: String,
    /// Product name for display
    pub product_name: String,
    /// Units currently in stock
    pub available: i32,
    /// Units the order asked for
    pub requested: i32,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient stock for {} item(s)", items.len())]
    InsufficientStock { items: Vec<StockShortfall> },

    #[error("Stock for '{product_name}' changed while the order was placed; only {available} left")]
    StockConflict {
        product_id: String,
        product_name: String,
        available: i32,
        requested: i32,
    },

    #[error("Cannot change status from {current} to {requested}")]
    InvalidTransition {
        current: String,
        requested: String,
        allowed: Vec<String>,
    },

    #[error("Payment not confirmed; order cannot be shipped")]
    PaymentNotConfirmed,

    #[error("{message}")]
    Conflict { message: String },

    #[error("Insufficient funds: balance {balance:.2}, requested {requested:.2}")]
    InsufficientFunds { balance: f64, requested: f64 },

    #[error("Too many requests, try again later")]
    RateLimited,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// `Conflict` when `err` is a unique-index violation, otherwise the database error itself.
    pub fn conflict_on_duplicate(err: sea_orm::DbErr, message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Self::conflict(message),
            _ => Self::Database(err),
        }
    }

    /// Machine-readable error kind used in response bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden { .. } | Self::PaymentNotConfirmed => "Forbidden",
            Self::Validation { .. } | Self::InvalidTransition { .. } => "ValidationError",
            Self::NotFound { .. } => "NotFound",
            Self::InsufficientStock { .. } => "InsufficientStock",
            Self::StockConflict { .. } => "StockConflict",
            Self::Conflict { .. } | Self::InsufficientFunds { .. } => "Conflict",
            Self::RateLimited => "RateLimited",
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => "InternalError",
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } | Self::PaymentNotConfirmed => StatusCode::FORBIDDEN,
            Self::Validation { .. }
            | Self::InsufficientStock { .. }
            | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::StockConflict { .. } | Self::Conflict { .. } | Self::InsufficientFunds { .. } => {
                StatusCode::CONFLICT
            }
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::InsufficientStock { items } => Some(json!({ "items": items })),
            Self::StockConflict {
                product_id,
                product_name,
                available,
                requested,
            } => Some(json!({
                "productId": product_id,
                "productName": product_name,
                "available": available,
                "requested": requested,
            })),
            Self::InvalidTransition {
                current,
                requested,
                allowed,
            } => Some(json!({
                "currentStatus": current,
                "requestedStatus": requested,
                "allowedStatuses": allowed,
            })),
            Self::InsufficientFunds { balance, requested } => Some(json!({
                "balance": balance,
                "requested": requested,
            })),
            _ => None,
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Internal error while handling request");
            "Something went wrong, please try again later".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::PaymentNotConfirmed.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::InsufficientStock { items: vec![] }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::StockConflict {
                product_id: "p1".to_string(),
                product_name: "Brake pad".to_string(),
                available: 2,
                requested: 3,
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_on_duplicate_keeps_other_errors() {
        let err = Error::conflict_on_duplicate(sea_orm::DbErr::Custom("boom".to_string()), "dup");
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_transition_details() {
        let err = Error::InvalidTransition {
            current: "PENDING".to_string(),
            requested: "SHIPPED".to_string(),
            allowed: vec!["CONFIRMED".to_string(), "CANCELLED".to_string()],
        };
        let details = err.details().unwrap();
        assert_eq!(details["allowedStatuses"], json!(["CONFIRMED", "CANCELLED"]));
        assert_eq!(err.kind(), "ValidationError");
    }
}
