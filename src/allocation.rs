//! allocation.rs
//!
//! Выбор блока смежных мест для одного запроса бронирования.
//!
//! Движок работает только с неизменяемым снимком зала и ничего не пишет:
//! результат считается предварительным, пока хранилище не подтвердит его
//! через compare-and-commit.
//!
//! Правила выбора:
//! 1.  Зал делится на ряды по `seats_per_row` мест в порядке id; последний
//!     ряд может быть короче и проверяется по тем же правилам.
//! 2.  В каждом ряду ищется первая (самая левая) серия свободных мест длиной
//!     `count`, целиком помещающаяся в границы ряда.
//! 3.  Побеждает самый ранний ряд, затем самый ранний столбец. Запрос никогда
//!     не разбивается между рядами.

use serde::Serialize;
use thiserror::Error;

use crate::models::Seat;

/// Ошибки, которые может вернуть движок размещения.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// Запрошенное количество не является положительным целым.
    #[error("invalid seat count {count}: must be a positive integer")]
    InvalidRequest { count: i64 },

    /// Ни в одном ряду нет `count` свободных мест подряд в границах ряда.
    #[error("no row has {count} contiguous free seats")]
    InsufficientContiguousCapacity { count: i64 },

    /// Выбранное место заняли уже после того, как был снят снимок.
    #[error("seat snapshot is stale")]
    StaleSnapshot,
}

impl AllocationError {
    /// Может ли повтор на свежем снимке пройти без изменения запроса клиентом.
    pub fn is_retriable(&self) -> bool {
        matches!(self, AllocationError::StaleSnapshot)
    }
}

/// Места, выбранные для одного запроса: один ряд, соседние столбцы, по порядку id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatSelection {
    pub row: usize,
    pub start_column: usize,
    pub seat_ids: Vec<i64>,
}

impl SeatSelection {
    pub fn len(&self) -> usize {
        self.seat_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seat_ids.is_empty()
    }

    /// Перепроверяет выбор по другому (возможно, более свежему) снимку.
    pub fn is_available_in(&self, seats: &[Seat]) -> bool {
        self.seat_ids.iter().all(|id| {
            seats
                .iter()
                .find(|seat| seat.id == *id)
                .is_some_and(|seat| !seat.booked)
        })
    }

    /// То же, что [`SeatSelection::is_available_in`], но устаревший снимок
    /// возвращается как [`AllocationError::StaleSnapshot`].
    pub fn verify(&self, seats: &[Seat]) -> Result<(), AllocationError> {
        if self.is_available_in(seats) {
            Ok(())
        } else {
            Err(AllocationError::StaleSnapshot)
        }
    }
}

/// Движок без состояния для зала с фиксированной шириной ряда.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationEngine {
    seats_per_row: usize,
}

impl AllocationEngine {
    /// Движок для рядов по `seats_per_row` мест (не меньше одного).
    pub fn new(seats_per_row: usize) -> Self {
        Self {
            seats_per_row: seats_per_row.max(1),
        }
    }

    pub fn seats_per_row(&self) -> usize {
        self.seats_per_row
    }

    /// Ряд места (с нуля) по его id (с единицы).
    pub fn row_of(&self, seat_id: i64) -> usize {
        Self::offset(seat_id) / self.seats_per_row
    }

    /// Столбец места (с нуля) по его id (с единицы).
    pub fn column_of(&self, seat_id: i64) -> usize {
        Self::offset(seat_id) % self.seats_per_row
    }

    // id меньше 1 прижимаются к первому месту
    fn offset(seat_id: i64) -> usize {
        seat_id.saturating_sub(1).max(0) as usize
    }

    /// Выбирает `count` соседних свободных мест в одном ряду.
    ///
    /// `seats` должны идти по порядку id: ряды определяются позицией в срезе.
    /// Побеждает самая левая подходящая серия в самом раннем ряду.
    pub fn allocate(&self, seats: &[Seat], count: i64) -> Result<SeatSelection, AllocationError> {
        if count <= 0 {
            return Err(AllocationError::InvalidRequest { count });
        }
        let wanted = usize::try_from(count)
            .map_err(|_| AllocationError::InsufficientContiguousCapacity { count })?;

        if wanted > self.seats_per_row {
            return Err(AllocationError::InsufficientContiguousCapacity { count });
        }

        for (row_index, row) in seats.chunks(self.seats_per_row).enumerate() {
            if let Some(start) = self.first_fit(row, wanted) {
                return Ok(SeatSelection {
                    row: row_index,
                    start_column: start,
                    seat_ids: row[start..start + wanted].iter().map(|s| s.id).collect(),
                });
            }
        }

        Err(AllocationError::InsufficientContiguousCapacity { count })
    }

    /// Начальный столбец первой серии из `wanted` свободных мест, которая
    /// помещается в границы ряда.
    fn first_fit(&self, row: &[Seat], wanted: usize) -> Option<usize> {
        let mut run_len = 0;
        let mut run_start = 0;

        for (column, seat) in row.iter().enumerate() {
            if seat.booked {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = column;
            }
            run_len += 1;

            if run_len == wanted && run_start + wanted <= self.seats_per_row {
                return Some(run_start);
            }
        }

        None
    }
}
