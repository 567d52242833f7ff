pub mod bookings;
pub mod health;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::allocation::AllocationError;
use crate::services::booking::BookingError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(bookings::routes())
}

pub(crate) fn error_body(status: StatusCode, kind: &str, message: String) -> Response {
    (status, Json(json!({ "error": kind, "message": message }))).into_response()
}

// Клиентская ошибка, конфликт формы зала и гонка отдаются разными кодами,
// чтобы клиент понимал, стоит ли повторять запрос
impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            BookingError::Allocation(AllocationError::InvalidRequest { .. }) => {
                error_body(StatusCode::BAD_REQUEST, "InvalidRequest", message)
            }
            BookingError::Allocation(AllocationError::InsufficientContiguousCapacity { .. }) => {
                error_body(StatusCode::CONFLICT, "InsufficientContiguousCapacity", message)
            }
            BookingError::Allocation(AllocationError::StaleSnapshot)
            | BookingError::StaleSnapshot { .. } => {
                let mut response = error_body(StatusCode::CONFLICT, "StaleSnapshot", message);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                response
            }
            BookingError::Store(e) => {
                tracing::error!("seat store error: {:?}", e);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "StoreError",
                    "Seat store is unavailable".to_string(),
                )
            }
        }
    }
}
