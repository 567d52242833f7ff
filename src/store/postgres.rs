use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::{CommitOutcome, ResetReport, SeatStore, StoreError};
use crate::database::Database;
use crate::models::{Booking, Seat};

/// Хранилище мест поверх таблиц `seats` и `bookings`.
#[derive(Clone)]
pub struct PgSeatStore {
    db: Database,
}

impl PgSeatStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Досоздаёт недостающие места `1..=total_seats`. Существующие места
    /// сохраняют состояние брони.
    pub async fn ensure_chart(&self, total_seats: usize) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO seats (id)
             SELECT generate_series(1, $1::BIGINT)
             ON CONFLICT (id) DO NOTHING"
        )
        .bind(total_seats as i64)
        .execute(&self.db.pool)
        .await?
        .rows_affected();

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats")
            .fetch_one(&self.db.pool)
            .await?;

        if existing as usize != total_seats {
            warn!(
                "Seat table holds {} seats, configured chart has {}",
                existing, total_seats
            );
        }
        info!("Seating chart ready: {} seats ({} created)", existing, inserted);
        Ok(())
    }

    async fn try_commit(&self, seat_ids: &[i64]) -> Result<CommitOutcome, sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;

        // 1) Заводим бронь, чтобы было на что ссылаться
        let (booking_id, created_at): (i64, NaiveDateTime) = sqlx::query_as(
            "INSERT INTO bookings (seat_count) VALUES ($1) RETURNING id, created_at"
        )
        .bind(seat_ids.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        // 2) Занимаем места только если все они ещё свободны.
        //    Конкурентный UPDATE тех же строк ждёт нашего коммита и затем
        //    перепроверяет booked = FALSE.
        let updated = sqlx::query(
            "UPDATE seats
             SET booked = TRUE, booking_id = $2
             WHERE id = ANY($1) AND booked = FALSE"
        )
        .bind(seat_ids)
        .bind(booking_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated != seat_ids.len() as u64 {
            tx.rollback().await?;
            warn!(
                "Commit conflict: {} of {} seats still free",
                updated,
                seat_ids.len()
            );
            return Ok(CommitOutcome::Conflict);
        }

        tx.commit().await?;

        Ok(CommitOutcome::Committed(Booking {
            id: booking_id,
            seat_ids: seat_ids.to_vec(),
            created_at,
        }))
    }
}

/// SQLSTATE, при которых транзакция брони проиграла гонку конкуренту:
/// `40P01` (взаимная блокировка) и `40001` (ошибка сериализации).
/// Ничего не записано, поэтому это такой же конфликт, как занятое место.
fn is_commit_race(code: &str) -> bool {
    matches!(code, "40P01" | "40001")
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn snapshot(&self) -> Result<Vec<Seat>, StoreError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, booked, booking_id FROM seats ORDER BY id"
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn compare_and_commit(&self, seat_ids: &[i64]) -> Result<CommitOutcome, StoreError> {
        if seat_ids.is_empty() {
            return Ok(CommitOutcome::Conflict);
        }

        match self.try_commit(seat_ids).await {
            Err(sqlx::Error::Database(e)) if e.code().is_some_and(|code| is_commit_race(&code)) => {
                warn!("Commit lost a race in Postgres ({}): {}", e.code().unwrap_or_default(), e.message());
                Ok(CommitOutcome::Conflict)
            }
            other => Ok(other?),
        }
    }

    async fn reset(&self) -> Result<ResetReport, StoreError> {
        warn!("RESET: releasing every seat");

        let mut tx = self.db.pool.begin().await?;

        let seats_released = sqlx::query(
            "UPDATE seats SET booked = FALSE, booking_id = NULL WHERE booked = TRUE OR booking_id IS NOT NULL"
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let bookings_deleted = sqlx::query("DELETE FROM bookings")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        info!(
            "RESET: {} seats released, {} bookings deleted",
            seats_released, bookings_deleted
        );

        Ok(ResetReport {
            seats_released,
            bookings_deleted,
        })
    }
}
