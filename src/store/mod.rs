//! Хранилище мест, источник истины о брони.
//!
//! У хранилища три операции: чтение снимка, атомарный compare-and-commit
//! точного набора мест и полный сброс. Движок размещения к хранилищу
//! напрямую не обращается.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Booking, Seat};

pub use memory::MemorySeatStore;
pub use postgres::PgSeatStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("seat store lock poisoned")]
    Poisoned,
}

/// Итог попытки compare-and-commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Все запрошенные места были свободны и теперь заняты.
    Committed(Booking),
    /// Хотя бы одного места нет, оно уже занято или указано дважды; ничего не изменилось.
    Conflict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub seats_released: u64,
    pub bookings_deleted: u64,
}

#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Текущие места по порядку id.
    async fn snapshot(&self) -> Result<Vec<Seat>, StoreError>;

    /// Занимает ровно `seat_ids`, если все они ещё свободны и не повторяются.
    /// Иначе хранилище не меняется и возвращается [`CommitOutcome::Conflict`].
    async fn compare_and_commit(&self, seat_ids: &[i64]) -> Result<CommitOutcome, StoreError>;

    /// Освобождает все места и удаляет все брони.
    async fn reset(&self) -> Result<ResetReport, StoreError>;
}
