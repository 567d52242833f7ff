use chrono::NaiveDateTime;
use serde::Serialize;

/// Квитанция успешного compare-and-commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: i64,
    #[serde(rename = "seatIds")]
    pub seat_ids: Vec<i64>,
    pub created_at: NaiveDateTime,
}
