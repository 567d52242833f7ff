use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::error_body;
use crate::services::booking::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings/view", get(view_seats))
        .route("/bookings/summary", get(seat_summary))
        .route("/bookings/reserve", post(reserve_seats))
        .route("/bookings/reset", post(reset_seats))
}

/* ---------- SEATS ---------- */

// GET /api/bookings/view
async fn view_seats(State(state): State<Arc<AppState>>) -> Result<Response, BookingError> {
    // поколение читаем до запроса к хранилищу: если бронь успеет его сменить,
    // наш снимок ляжет под старый ключ
    let cached = match &state.cache {
        Some(cache) => cache.generation().await.map(|generation| (cache, generation)),
        None => None,
    };

    if let Some((cache, generation)) = cached {
        if let Some(seats) = cache.get_seats(generation).await {
            return Ok(([("X-Cache", "HIT")], Json(seats)).into_response());
        }
    }

    let seats = state.booking.view().await?;
    if let Some((cache, generation)) = cached {
        cache.save_seats(generation, &seats).await;
    }

    Ok(([("X-Cache", "MISS")], Json(seats)).into_response())
}

// GET /api/bookings/summary
async fn seat_summary(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, BookingError> {
    let summary = state.booking.summary().await?;
    Ok(Json(summary))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings/reserve
#[derive(Debug, Deserialize, Validate)]
struct ReserveRequest {
    #[serde(alias = "numSeats")]
    #[validate(range(min = 1, message = "count must be a positive integer"))]
    count: i64,
}

async fn reserve_seats(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReserveRequest>, JsonRejection>,
) -> Result<Response, BookingError> {
    // дробное, строковое или отсутствующее количество тоже InvalidRequest
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return Ok(error_body(StatusCode::BAD_REQUEST, "InvalidRequest", rejection.body_text()));
        }
    };

    if let Err(e) = req.validate() {
        return Ok(error_body(StatusCode::BAD_REQUEST, "InvalidRequest", e.to_string()));
    }

    let booking = state.booking.reserve(req.count).await?;

    if let Some(cache) = &state.cache {
        cache.invalidate_seats().await;
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Booked {} seat(s)", booking.seat_ids.len()),
            "booking_id": booking.id,
            "seatIds": booking.seat_ids,
            "created_at": booking.created_at,
        })),
    )
        .into_response())
}

// POST /api/bookings/reset
async fn reset_seats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, BookingError> {
    tracing::warn!("RESET requested");

    let report = state.booking.reset().await?;

    if let Some(cache) = &state.cache {
        cache.invalidate_seats().await;
    }

    Ok(Json(json!({
        "message": "All seats have been reset",
        "details": report,
    })))
}
