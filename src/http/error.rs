use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::domain::aggregates::{OrderError, ProductError, UserError};
use crate::payments::PaymentError;
use crate::store::StoreError;
use crate::EcommerceError;

impl EcommerceError {
    pub fn status(&self) -> StatusCode {
        use EcommerceError::*;
        match self {
            ProductNotFound | OrderNotFound | CouponNotFound | UserNotFound => StatusCode::NOT_FOUND,
            User(UserError::AddressNotFound) => StatusCode::NOT_FOUND,
            EmptyCart | CartNotPurchasable | Validation(_) | Sku(_) | Cart(_) | Coupon(_) | User(_) | Target(_) | Money(_) => {
                StatusCode::BAD_REQUEST
            }
            Product(ProductError::InsufficientStock { .. } | ProductError::NotAvailable) => StatusCode::CONFLICT,
            Product(_) => StatusCode::BAD_REQUEST,
            Order(e) => match e {
                OrderError::NoItems | OrderError::UnknownStatus(_) | OrderError::WrongPaymentMethod
                | OrderError::UnknownGatewayOrder | OrderError::Money(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::CONFLICT,
            },
            Auth(e) => match e {
                AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
                AuthError::Hashing(_) | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            },
            Payment(PaymentError::InvalidSignature) => StatusCode::BAD_REQUEST,
            Payment(_) => StatusCode::BAD_GATEWAY,
            Storage(StoreError::Conflict { .. } | StoreError::Duplicate { .. }) => StatusCode::CONFLICT,
            Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            match status {
                StatusCode::BAD_GATEWAY => "Payment gateway unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            if status == StatusCode::CONFLICT { warn!(error = %self, "request rejected"); }
            self.to_string()
        };
        let error = status.canonical_reason().unwrap_or("Error");
        (status, Json(json!({ "success": false, "error": error, "message": message }))).into_response()
    }
}
