pub mod seat;
pub mod booking;
pub mod chart;

pub use seat::{ChartSummary, Seat};
pub use booking::Booking;
pub use chart::SeatingChart;
