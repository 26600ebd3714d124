//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::{ErrorKind, FulfillmentError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// The caller could not be identified.
    Unauthorized(String),
    /// Fulfillment error.
    Fulfillment(FulfillmentError),
}

impl ApiError {
    /// Returns the HTTP status, stable code and client-facing message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Fulfillment(err) => fulfillment_error_parts(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "internal server error");
        }

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_parts(err: &FulfillmentError) -> (StatusCode, &'static str, String) {
    let status = match err {
        FulfillmentError::Validation(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::ProductNotFound(_) | FulfillmentError::OrderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        FulfillmentError::Forbidden(_) => StatusCode::FORBIDDEN,
        FulfillmentError::InsufficientStock { .. } | FulfillmentError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        FulfillmentError::Cancelled | FulfillmentError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FulfillmentError::Payment(_)
        | FulfillmentError::Store(_)
        | FulfillmentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match err.kind() {
        ErrorKind::Internal => "Internal server error".to_string(),
        ErrorKind::Validation | ErrorKind::Business => err.to_string(),
    };

    (status, err.code(), message)
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, ProductId};
    use domain::OrderStatus;
    use store::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                FulfillmentError::Validation("Order has no items".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                FulfillmentError::ProductNotFound(ProductId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                FulfillmentError::OrderNotFound(OrderId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                FulfillmentError::Forbidden(OrderId::new()),
                StatusCode::FORBIDDEN,
            ),
            (
                FulfillmentError::InsufficientStock {
                    product_id: ProductId::new(),
                    requested: 2,
                    available: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                FulfillmentError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Cancelled,
                },
                StatusCode::CONFLICT,
            ),
            (FulfillmentError::Cancelled, StatusCode::GATEWAY_TIMEOUT),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).parts().0, status);
        }
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let err = ApiError::from(FulfillmentError::Store(StoreError::Unavailable(
            "connection refused on 10.0.0.7".into(),
        )));
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn test_business_errors_are_verbatim() {
        let err = ApiError::from(FulfillmentError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        });
        let (_, code, message) = err.parts();
        assert_eq!(code, "INVALID_STATUS_TRANSITION");
        assert_eq!(
            message,
            "Invalid status transition: cannot transition from pending to shipped"
        );
    }
}
