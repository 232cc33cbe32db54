use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::reconcile::compute_remaining;

/// Идентификатор типа места, уникальный в пределах бронирования.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatTypeId(pub i64);

impl fmt::Display for SeatTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Строка бронирования по одному типу мест. Создаётся только через `SeatLine::new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatLine {
    pub seat_type_id: SeatTypeId,
    pub seat_name: String,
    /// Куплено билетов, не меняется за время жизни бронирования.
    pub quantity: u32,
    /// Уже погашено. Только растёт, источник истины - сервер.
    pub scanned_quantity: u32,
    /// Остаток, если сервер прислал его явно. Имеет приоритет над локальным расчётом.
    pub remaining_quantity: Option<u32>,
}

impl SeatLine {
    /// Собирает строку, соблюдая `scanned_quantity <= quantity`.
    pub fn new(
        seat_type_id: SeatTypeId,
        seat_name: impl Into<String>,
        quantity: u32,
        scanned_quantity: u32,
        remaining_quantity: Option<u32>,
    ) -> Self {
        if scanned_quantity > quantity {
            tracing::warn!(
                seat_type_id = %seat_type_id,
                quantity,
                scanned_quantity,
                "scanned quantity exceeds purchased quantity, clamping"
            );
        }
        Self {
            seat_type_id,
            seat_name: seat_name.into(),
            quantity,
            scanned_quantity: scanned_quantity.min(quantity),
            remaining_quantity,
        }
    }

    pub fn remaining(&self) -> u32 {
        compute_remaining(self)
    }
}

/// Бронирование, загруженное для сеанса сканирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub booking_id: i64,
    pub booking_code: String,
    pub event_name: Option<String>,
    pub customer_name: Option<String>,
    pub seats: Vec<SeatLine>,
}

/// Что сообщается вызывающему после загрузки бронирования.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    /// Есть что сканировать.
    Redeemable,
    /// Всё погашено, доступен только просмотр.
    FullyScanned,
    /// В бронировании нет ни одной строки.
    NoSeats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanTotals {
    pub quantity: u32,
    pub scanned: u32,
    pub remaining: u32,
}

impl Booking {
    pub fn line(&self, seat_type_id: SeatTypeId) -> Option<&SeatLine> {
        self.seats.iter().find(|line| line.seat_type_id == seat_type_id)
    }

    // Для пустого бронирования истинно: погашать нечего
    pub fn is_fully_scanned(&self) -> bool {
        self.seats.iter().all(|line| line.remaining() == 0)
    }

    pub fn status(&self) -> BookingStatus {
        if self.seats.is_empty() {
            BookingStatus::NoSeats
        } else if self.is_fully_scanned() {
            BookingStatus::FullyScanned
        } else {
            BookingStatus::Redeemable
        }
    }

    pub fn totals(&self) -> ScanTotals {
        // Счётчики приходят с сервера, сумма не должна переполняться
        self.seats.iter().fold(ScanTotals::default(), |acc, line| ScanTotals {
            quantity: acc.quantity.saturating_add(line.quantity),
            scanned: acc.scanned.saturating_add(line.scanned_quantity),
            remaining: acc.remaining.saturating_add(line.remaining()),
        })
    }
}
