pub mod booking;
pub mod scan;

pub use booking::{Booking, BookingStatus, ScanTotals, SeatLine, SeatTypeId};
pub use scan::{ScanOutcome, ScanRequest, ScanResult, ScanStatus, SeatScanDetail};
