use crate::models::{ChartSummary, Seat};

/// Зал как арена мест с адресацией по id, начиная с 1.
///
/// Меняют его только хранилища; движок размещения работает с копиями,
/// которые отдаёт [`SeatingChart::snapshot`].
#[derive(Debug, Clone)]
pub struct SeatingChart {
    seats: Vec<Seat>,
    seats_per_row: usize,
}

impl SeatingChart {
    pub fn new(total_seats: usize, seats_per_row: usize) -> Self {
        let seats = (1..=total_seats as i64).map(Seat::free).collect();
        Self { seats, seats_per_row }
    }

    pub fn seats_per_row(&self) -> usize {
        self.seats_per_row
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Seat> {
        self.seats.clone()
    }

    pub fn seat(&self, id: i64) -> Option<&Seat> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.seats.get(index)
    }

    pub fn summary(&self) -> ChartSummary {
        ChartSummary::of(&self.seats)
    }

    /// Бронирует все места из `seat_ids` за `booking_id` или не трогает ни
    /// одного, если какое-то место неизвестно, уже занято или указано дважды.
    pub fn book_all(&mut self, seat_ids: &[i64], booking_id: i64) -> bool {
        let mut unique = seat_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != seat_ids.len() {
            return false;
        }

        let all_free = seat_ids
            .iter()
            .all(|id| matches!(self.seat(*id), Some(seat) if !seat.booked));
        if !all_free {
            return false;
        }

        for id in seat_ids {
            // индексы уже проверены выше
            let seat = &mut self.seats[(*id - 1) as usize];
            seat.booked = true;
            seat.booking_id = Some(booking_id);
        }
        true
    }

    /// Снимает все брони; возвращает число освобождённых мест.
    pub fn reset(&mut self) -> usize {
        let mut released = 0;
        for seat in &mut self.seats {
            if seat.booked {
                released += 1;
            }
            seat.booked = false;
            seat.booking_id = None;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chart_is_fully_free_and_one_based() {
        let chart = SeatingChart::new(80, 7);
        let seats = chart.snapshot();

        assert_eq!(seats.len(), 80);
        assert_eq!(seats.first().map(|s| s.id), Some(1));
        assert_eq!(seats.last().map(|s| s.id), Some(80));
        assert!(seats.iter().all(|s| !s.booked && s.booking_id.is_none()));
        assert_eq!(chart.seats_per_row(), 7);
    }

    #[test]
    fn book_all_is_all_or_nothing() {
        let mut chart = SeatingChart::new(14, 7);
        assert!(chart.book_all(&[3, 4], 1));

        // 4 is taken, so 5 must stay free
        assert!(!chart.book_all(&[4, 5], 2));
        assert!(!chart.seat(5).unwrap().booked);

        // unknown seat ids reject the whole set
        assert!(!chart.book_all(&[6, 15], 3));
        assert!(!chart.book_all(&[0], 3));
        assert!(!chart.seat(6).unwrap().booked);

        assert_eq!(chart.seat(3).unwrap().booking_id, Some(1));
    }

    #[test]
    fn book_all_rejects_repeated_seat_ids() {
        let mut chart = SeatingChart::new(7, 7);

        assert!(!chart.book_all(&[3, 3], 1));
        assert!(!chart.book_all(&[5, 6, 5], 1));
        assert_eq!(chart.summary().booked, 0);
    }

    #[test]
    fn reset_keeps_shape_and_frees_everything() {
        let mut chart = SeatingChart::new(10, 7);
        chart.book_all(&[1, 2, 3], 1);
        chart.book_all(&[8, 9], 2);

        assert_eq!(chart.reset(), 5);
        assert_eq!(chart.len(), 10);
        assert_eq!(chart.seats_per_row(), 7);
        assert_eq!(chart.summary().available, 10);

        // повторный сброс ничего не меняет
        assert_eq!(chart.reset(), 0);
    }

    #[test]
    fn summary_counts_booked_and_available() {
        let mut chart = SeatingChart::new(80, 7);
        chart.book_all(&[1, 2, 3, 4], 1);

        let summary = chart.summary();
        assert_eq!(summary.total, 80);
        assert_eq!(summary.booked, 4);
        assert_eq!(summary.available, 76);
    }
}
