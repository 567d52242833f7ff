//! booking.rs
//!
//! Сервисный слой бронирования: связывает движок размещения с хранилищем.
//!
//! Выбор движка считается предварительным. Места занимаются только через
//! compare-and-commit хранилища; при конфликте берётся свежий снимок и
//! размещение повторяется, не более `max_commit_attempts` раз.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::allocation::{AllocationEngine, AllocationError};
use crate::models::{Booking, ChartSummary, Seat};
use crate::store::{CommitOutcome, ResetReport, SeatStore, StoreError};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Каждая попытка проиграла гонку конкурентному коммиту.
    #[error("seats changed during booking, gave up after {attempts} attempts")]
    StaleSnapshot { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Временные ошибки, с которыми клиент может повторить тот же запрос.
    pub fn is_retriable(&self) -> bool {
        match self {
            BookingError::Allocation(e) => e.is_retriable(),
            BookingError::StaleSnapshot { .. } => true,
            BookingError::Store(_) => false,
        }
    }
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn SeatStore>,
    engine: AllocationEngine,
    max_attempts: u32,
}

impl BookingService {
    pub fn new(store: Arc<dyn SeatStore>, engine: AllocationEngine, max_attempts: u32) -> Self {
        Self {
            store,
            engine,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn view(&self) -> Result<Vec<Seat>, BookingError> {
        Ok(self.store.snapshot().await?)
    }

    pub async fn summary(&self) -> Result<ChartSummary, BookingError> {
        let seats = self.store.snapshot().await?;
        Ok(ChartSummary::of(&seats))
    }

    /// Бронирует `count` соседних мест в одном ряду.
    pub async fn reserve(&self, count: i64) -> Result<Booking, BookingError> {
        let span = info_span!("reserve", request_id = %Uuid::new_v4(), count);
        self.reserve_inner(count).instrument(span).await
    }

    async fn reserve_inner(&self, count: i64) -> Result<Booking, BookingError> {
        let mut snapshot = self.store.snapshot().await?;

        for attempt in 1..=self.max_attempts {
            // ошибки размещения не повторяем: свежий снимок их не исправит
            let selection = self.engine.allocate(&snapshot, count)?;

            match self.store.compare_and_commit(&selection.seat_ids).await? {
                CommitOutcome::Committed(booking) => {
                    info!(
                        booking_id = booking.id,
                        row = selection.row,
                        attempt,
                        "Booked seats {:?}",
                        booking.seat_ids
                    );
                    return Ok(booking);
                }
                CommitOutcome::Conflict => {
                    if attempt == self.max_attempts {
                        warn!(attempt, "Seats {:?} taken concurrently, giving up", selection.seat_ids);
                        break;
                    }

                    let fresh = self.store.snapshot().await?;
                    match selection.verify(&fresh) {
                        Err(e) => warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            "Seats {:?}: {}, retrying on a fresh snapshot",
                            selection.seat_ids,
                            e
                        ),
                        // хранилище откатило коммит, хотя места снова свободны
                        Ok(()) => warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            "Commit of seats {:?} rejected while they look free, retrying",
                            selection.seat_ids
                        ),
                    }
                    snapshot = fresh;
                }
            }
        }

        Err(BookingError::StaleSnapshot {
            attempts: self.max_attempts,
        })
    }

    pub async fn reset(&self) -> Result<ResetReport, BookingError> {
        let report = self.store.reset().await?;
        info!(
            seats_released = report.seats_released,
            bookings_deleted = report.bookings_deleted,
            "Seating chart reset"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatingChart;
    use crate::store::MemorySeatStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service(total: usize) -> BookingService {
        BookingService::new(
            Arc::new(MemorySeatStore::new(total, 7)),
            AllocationEngine::new(7),
            3,
        )
    }

    /// Хранилище, у которого первые `conflicts` коммитов проигрывают гонку:
    /// до ответа конкурент успевает занять те же места.
    struct RacingStore {
        inner: MemorySeatStore,
        conflicts: AtomicU32,
        snapshots: AtomicU32,
    }

    impl RacingStore {
        fn new(inner: MemorySeatStore, conflicts: u32) -> Self {
            Self {
                inner,
                conflicts: AtomicU32::new(conflicts),
                snapshots: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SeatStore for RacingStore {
        async fn snapshot(&self) -> Result<Vec<Seat>, StoreError> {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
            self.inner.snapshot().await
        }

        async fn compare_and_commit(&self, seat_ids: &[i64]) -> Result<CommitOutcome, StoreError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                self.inner.compare_and_commit(seat_ids).await?;
            }
            self.inner.compare_and_commit(seat_ids).await
        }

        async fn reset(&self) -> Result<ResetReport, StoreError> {
            self.inner.reset().await
        }
    }

    #[tokio::test]
    async fn reserves_leftmost_block_in_lowest_row() {
        let service = service(14);

        let first = service.reserve(3).await.unwrap();
        assert_eq!(first.seat_ids, vec![1, 2, 3]);

        let second = service.reserve(4).await.unwrap();
        assert_eq!(second.seat_ids, vec![4, 5, 6, 7]);

        // ряд 0 заполнен, следующий запрос уходит во второй ряд
        let third = service.reserve(1).await.unwrap();
        assert_eq!(third.seat_ids, vec![8]);

        let summary = service.summary().await.unwrap();
        assert_eq!(summary.booked, 8);
        assert_eq!(summary.available, 6);
    }

    #[tokio::test]
    async fn invalid_count_is_not_retried() {
        let service = service(14);
        let err = service.reserve(0).await.unwrap_err();

        assert!(matches!(
            err,
            BookingError::Allocation(AllocationError::InvalidRequest { count: 0 })
        ));
        assert!(!err.is_retriable());
        assert_eq!(service.summary().await.unwrap().booked, 0);
    }

    #[tokio::test]
    async fn retries_after_conflict_on_fresh_snapshot() {
        let store = Arc::new(RacingStore::new(MemorySeatStore::new(14, 7), 1));
        let service = BookingService::new(store.clone(), AllocationEngine::new(7), 3);

        // первый выбор 1..3 уходит конкуренту, повтор получает 4..6
        let booking = service.reserve(3).await.unwrap();
        assert_eq!(booking.seat_ids, vec![4, 5, 6]);
        assert_eq!(store.snapshots.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_with_stale_snapshot_after_max_attempts() {
        let store = Arc::new(RacingStore::new(MemorySeatStore::new(80, 7), 10));
        let service = BookingService::new(store.clone(), AllocationEngine::new(7), 2);

        let err = service.reserve(2).await.unwrap_err();
        assert!(matches!(err, BookingError::StaleSnapshot { attempts: 2 }));
        assert!(err.is_retriable());

        // после последней попытки свежий снимок уже не читается
        assert_eq!(store.snapshots.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn conflict_then_retry_reports_insufficient_capacity() {
        let mut chart = SeatingChart::new(14, 7);
        chart.book_all(&(1..=7).collect::<Vec<_>>(), 99);
        let store = RacingStore::new(MemorySeatStore::from_chart(chart), 1);
        let service = BookingService::new(Arc::new(store), AllocationEngine::new(7), 3);

        let err = service.reserve(7).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::Allocation(AllocationError::InsufficientContiguousCapacity { count: 7 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_full_row_requests_book_exactly_once() {
        let mut chart = SeatingChart::new(14, 7);
        chart.book_all(&(1..=7).collect::<Vec<_>>(), 99);
        let service = BookingService::new(
            Arc::new(MemorySeatStore::from_chart(chart)),
            AllocationEngine::new(7),
            3,
        );

        let (a, b) = tokio::join!(
            tokio::spawn({
                let service = service.clone();
                async move { service.reserve(7).await }
            }),
            tokio::spawn({
                let service = service.clone();
                async move { service.reserve(7).await }
            }),
        );
        let results = [a.unwrap(), b.unwrap()];

        let booked: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].seat_ids, (8..=14).collect::<Vec<_>>());

        let failed = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(
            failed,
            BookingError::Allocation(AllocationError::InsufficientContiguousCapacity { count: 7 })
        ));
    }

    #[tokio::test]
    async fn reset_frees_everything() {
        let service = service(80);
        service.reserve(5).await.unwrap();
        service.reserve(7).await.unwrap();

        let report = service.reset().await.unwrap();
        assert_eq!(report.seats_released, 12);
        assert_eq!(report.bookings_deleted, 2);

        let seats = service.view().await.unwrap();
        assert_eq!(seats.len(), 80);
        assert!(seats.iter().all(|s| !s.booked));
        assert_eq!(service.reserve(7).await.unwrap().seat_ids, (1..=7).collect::<Vec<_>>());
    }
}
