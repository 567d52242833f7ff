use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    #[serde(rename = "seat_id")]
    pub id: i64,
    pub booked: bool,
    pub booking_id: Option<i64>,
}

impl Seat {
    pub fn free(id: i64) -> Self {
        Self { id, booked: false, booking_id: None }
    }
}

// Счетчики для табло "занято / свободно"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartSummary {
    pub total: usize,
    pub booked: usize,
    pub available: usize,
}

impl ChartSummary {
    pub fn of(seats: &[Seat]) -> Self {
        let booked = seats.iter().filter(|s| s.booked).count();
        Self {
            total: seats.len(),
            booked,
            available: seats.len() - booked,
        }
    }
}
