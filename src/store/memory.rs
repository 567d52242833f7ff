use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

use super::{CommitOutcome, ResetReport, SeatStore, StoreError};
use crate::models::{Booking, Seat, SeatingChart};

#[derive(Debug)]
struct Inner {
    chart: SeatingChart,
    next_booking_id: i64,
    bookings: u64,
}

/// Хранилище мест в памяти процесса. Проверка и бронирование идут под одной
/// блокировкой, которая никогда не держится через `.await`.
#[derive(Debug)]
pub struct MemorySeatStore {
    inner: Mutex<Inner>,
}

impl MemorySeatStore {
    pub fn new(total_seats: usize, seats_per_row: usize) -> Self {
        Self::from_chart(SeatingChart::new(total_seats, seats_per_row))
    }

    pub fn from_chart(chart: SeatingChart) -> Self {
        Self {
            inner: Mutex::new(Inner {
                chart,
                next_booking_id: 1,
                bookings: 0,
            }),
        }
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn snapshot(&self) -> Result<Vec<Seat>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.chart.snapshot())
    }

    async fn compare_and_commit(&self, seat_ids: &[i64]) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        let booking_id = inner.next_booking_id;
        if seat_ids.is_empty() || !inner.chart.book_all(seat_ids, booking_id) {
            debug!("Memory commit rejected for seats {:?}", seat_ids);
            return Ok(CommitOutcome::Conflict);
        }

        inner.next_booking_id += 1;
        inner.bookings += 1;

        Ok(CommitOutcome::Committed(Booking {
            id: booking_id,
            seat_ids: seat_ids.to_vec(),
            created_at: chrono::Utc::now().naive_utc(),
        }))
    }

    async fn reset(&self) -> Result<ResetReport, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        let seats_released = inner.chart.reset() as u64;
        // номера броней не переиспользуются, как и у последовательности в Postgres
        let bookings_deleted = std::mem::take(&mut inner.bookings);

        Ok(ResetReport {
            seats_released,
            bookings_deleted,
        })
    }
}
