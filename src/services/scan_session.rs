//! scan_session.rs
//!
//! Сессия сканирования одного бронирования: поиск по коду, выбор количества,
//! отправка гашения и отображение результата сервера.
//!
//! Состояния (`ScanPhase`) живут только в памяти:
//! `Idle` -> `BookingLoaded` -> (`SingleSeatSelection` | `BulkSelection`) -> `ResultDisplayed`.
//! Все переходы инициирует оператор, таймеров и автоматических повторов нет.
//!
//! После каждой успешной отправки бронирование перечитывается целиком. Локальная
//! арифметика служит только фильтром перед отправкой, итоговые счётчики всегда
//! берутся у сервера (в том числе изменения от других операторов).

use std::collections::BTreeMap;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    authority_client::ScanAuthority,
    error::{Rejection, ScanError},
    models::{Booking, BookingStatus, ScanOutcome, ScanRequest, ScanTotals, SeatScanDetail, SeatTypeId},
    services::reconcile::{
        build_full_scan, clamp_bulk_quantity, clamp_single_quantity, validate_scan_request,
    },
    session::OperatorSession,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    BookingLoaded,
    SingleSeatSelection {
        seat_type_id: SeatTypeId,
        quantity: u32,
    },
    BulkSelection {
        staged: BTreeMap<SeatTypeId, u32>,
    },
    ResultDisplayed {
        outcome: ScanOutcome,
    },
}

impl ScanPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "Idle",
            ScanPhase::BookingLoaded => "BookingLoaded",
            ScanPhase::SingleSeatSelection { .. } => "SingleSeatSelection",
            ScanPhase::BulkSelection { .. } => "BulkSelection",
            ScanPhase::ResultDisplayed { .. } => "ResultDisplayed",
        }
    }

    fn accepts_submission(&self) -> bool {
        matches!(
            self,
            ScanPhase::BookingLoaded
                | ScanPhase::SingleSeatSelection { .. }
                | ScanPhase::BulkSelection { .. }
        )
    }
}

#[derive(Debug, Validate)]
struct BookingLookup {
    #[validate(length(min = 1))]
    code: String,
}

pub struct ScanSession<A> {
    authority: A,
    operator: OperatorSession,
    device_info: String,
    booking: Option<Booking>,
    phase: ScanPhase,
}

impl<A: ScanAuthority> ScanSession<A> {
    pub fn new(authority: A, operator: OperatorSession, device_info: impl Into<String>) -> Self {
        Self {
            authority,
            operator,
            device_info: device_info.into(),
            booking: None,
            phase: ScanPhase::Idle,
        }
    }

    pub fn phase(&self) -> &ScanPhase {
        &self.phase
    }

    pub fn booking(&self) -> Option<&Booking> {
        self.booking.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&ScanOutcome> {
        match &self.phase {
            ScanPhase::ResultDisplayed { outcome } => Some(outcome),
            _ => None,
        }
    }

    // === Загрузка бронирования ===

    /// Загружает бронирование по коду, полностью заменяя прежнее состояние.
    ///
    /// Полностью погашенное бронирование всё равно загружается: вызывающий
    /// получает `BookingStatus::FullyScanned` и может только просматривать его.
    pub async fn load_booking(&mut self, code: &str) -> Result<BookingStatus, ScanError> {
        let lookup = BookingLookup {
            code: code.trim().to_string(),
        };
        lookup.validate().map_err(|_| ScanError::EmptyBookingCode)?;

        // Новый поиск отбрасывает прежнее бронирование, даже если он не удастся
        self.reset();

        let booking = self
            .authority
            .get_booking_for_scan(&lookup.code, &self.operator)
            .await?;
        Ok(self.install(booking))
    }

    /// Перечитывает текущее бронирование. При ошибке остаётся последний удачный снимок.
    pub async fn reload(&mut self) -> Result<BookingStatus, ScanError> {
        let code = self
            .booking
            .as_ref()
            .map(|b| b.booking_code.clone())
            .ok_or(ScanError::NoBooking)?;

        let booking = self.authority.get_booking_for_scan(&code, &self.operator).await?;
        Ok(self.install(booking))
    }

    fn install(&mut self, booking: Booking) -> BookingStatus {
        let status = booking.status();
        info!(
            booking_id = booking.booking_id,
            booking_code = %booking.booking_code,
            lines = booking.seats.len(),
            ?status,
            "Booking loaded"
        );
        self.booking = Some(booking);
        self.phase = ScanPhase::BookingLoaded;
        status
    }

    pub fn reset(&mut self) {
        self.booking = None;
        self.phase = ScanPhase::Idle;
    }

    // === Запросы к снимку ===

    pub fn is_fully_scanned(&self) -> bool {
        self.booking.as_ref().is_some_and(Booking::is_fully_scanned)
    }

    pub fn totals(&self) -> Option<ScanTotals> {
        self.booking.as_ref().map(Booking::totals)
    }

    pub fn remaining(&self, seat_type_id: SeatTypeId) -> Result<u32, ScanError> {
        self.loaded_booking()?
            .line(seat_type_id)
            .map(|line| line.remaining())
            .ok_or_else(|| Rejection::UnknownSeatType { seat_type_id }.into())
    }

    fn loaded_booking(&self) -> Result<&Booking, ScanError> {
        self.booking.as_ref().ok_or(ScanError::NoBooking)
    }

    fn ensure_selectable(&self, operation: &'static str) -> Result<&Booking, ScanError> {
        let booking = self.loaded_booking()?;
        if !self.phase.accepts_submission() {
            return Err(ScanError::InvalidPhase {
                operation,
                phase: self.phase.name(),
            });
        }
        if booking.seats.is_empty() {
            return Err(ScanError::NoSeats);
        }
        Ok(booking)
    }

    /// Запрос должен относиться к загруженному бронированию и текущему оператору.
    fn check_request_identity(
        &self,
        booking: &Booking,
        request: &ScanRequest,
    ) -> Result<(), ScanError> {
        if request.booking_id != booking.booking_id {
            return Err(Rejection::BookingMismatch {
                expected: booking.booking_id,
                actual: request.booking_id,
            }
            .into());
        }
        let operator = self.operator.current_user_id().ok_or(ScanError::NoOperator)?;
        if request.scanned_by != operator {
            return Err(Rejection::OperatorMismatch {
                expected: operator.to_string(),
                actual: request.scanned_by.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn build_request(&self, details: Vec<SeatScanDetail>) -> Result<ScanRequest, ScanError> {
        let booking = self.loaded_booking()?;
        let scanned_by = self
            .operator
            .current_user_id()
            .ok_or(ScanError::NoOperator)?;

        Ok(ScanRequest {
            booking_id: booking.booking_id,
            scanned_by: scanned_by.to_string(),
            device_info: self.device_info.clone(),
            seat_scan_details: details,
        })
    }

    // === Полное гашение ===

    /// Запрос на весь остаток по всем строкам. Для пустого или полностью
    /// погашенного бронирования - `NothingToScan` без обращения к серверу.
    pub fn full_scan(&self) -> Result<ScanRequest, ScanError> {
        let booking = self.loaded_booking()?;
        let details = build_full_scan(&booking.seats);
        if details.is_empty() {
            return Err(ScanError::NothingToScan);
        }
        self.build_request(details)
    }

    pub async fn submit_full_scan(&mut self) -> Result<ScanOutcome, ScanError> {
        let request = self.full_scan()?;
        self.submit_scan(request).await
    }

    // === Частичное гашение одного типа мест ===

    pub fn select_seat(&mut self, seat_type_id: SeatTypeId) -> Result<u32, ScanError> {
        let booking = self.ensure_selectable("select_seat")?;
        let line = booking
            .line(seat_type_id)
            .ok_or(Rejection::UnknownSeatType { seat_type_id })?;

        let quantity = clamp_single_quantity(line, 1);
        if quantity == 0 {
            return Err(ScanError::NothingToScan);
        }

        self.phase = ScanPhase::SingleSeatSelection {
            seat_type_id,
            quantity,
        };
        Ok(quantity)
    }

    /// Меняет количество выбранного типа мест, приводя его к `[1, remaining]`.
    pub fn set_single_quantity(&mut self, quantity: i64) -> Result<u32, ScanError> {
        let ScanPhase::SingleSeatSelection { seat_type_id, .. } = self.phase else {
            return Err(ScanError::InvalidPhase {
                operation: "set_single_quantity",
                phase: self.phase.name(),
            });
        };
        let line = self
            .loaded_booking()?
            .line(seat_type_id)
            .ok_or(Rejection::UnknownSeatType { seat_type_id })?;

        let clamped = clamp_single_quantity(line, quantity);
        self.phase = ScanPhase::SingleSeatSelection {
            seat_type_id,
            quantity: clamped,
        };
        Ok(clamped)
    }

    pub async fn submit_single(&mut self) -> Result<ScanOutcome, ScanError> {
        let ScanPhase::SingleSeatSelection {
            seat_type_id,
            quantity,
        } = self.phase
        else {
            return Err(ScanError::InvalidPhase {
                operation: "submit_single",
                phase: self.phase.name(),
            });
        };

        let request = self.build_request(vec![SeatScanDetail {
            seat_type_id,
            quantity_to_scan: quantity,
        }])?;
        self.submit_scan(request).await
    }

    // === Пакетное частичное гашение ===

    /// Переходит к выбору количества по всем строкам сразу, все начинаются с нуля.
    pub fn begin_bulk_selection(&mut self) -> Result<(), ScanError> {
        let booking = self.ensure_selectable("begin_bulk_selection")?;
        let staged = booking
            .seats
            .iter()
            .map(|line| (line.seat_type_id, clamp_bulk_quantity(line, 0)))
            .collect();

        self.phase = ScanPhase::BulkSelection { staged };
        Ok(())
    }

    /// Ставит количество в `[0, remaining]`, молча исправляя выход за границы.
    pub fn set_bulk_quantity(
        &mut self,
        seat_type_id: SeatTypeId,
        quantity: i64,
    ) -> Result<u32, ScanError> {
        let phase = self.phase.name();
        let ScanPhase::BulkSelection { staged } = &mut self.phase else {
            return Err(ScanError::InvalidPhase {
                operation: "set_bulk_quantity",
                phase,
            });
        };
        let line = self
            .booking
            .as_ref()
            .ok_or(ScanError::NoBooking)?
            .line(seat_type_id)
            .ok_or(Rejection::UnknownSeatType { seat_type_id })?;

        let clamped = clamp_bulk_quantity(line, quantity);
        staged.insert(seat_type_id, clamped);
        Ok(clamped)
    }

    pub fn staged_bulk(&self) -> Option<&BTreeMap<SeatTypeId, u32>> {
        match &self.phase {
            ScanPhase::BulkSelection { staged } => Some(staged),
            _ => None,
        }
    }

    pub async fn submit_bulk(&mut self) -> Result<ScanOutcome, ScanError> {
        let details: Vec<SeatScanDetail> = match &self.phase {
            ScanPhase::BulkSelection { staged } => staged
                .iter()
                .filter(|(_, quantity)| **quantity > 0)
                .map(|(seat_type_id, quantity)| SeatScanDetail {
                    seat_type_id: *seat_type_id,
                    quantity_to_scan: *quantity,
                })
                .collect(),
            other => {
                return Err(ScanError::InvalidPhase {
                    operation: "submit_bulk",
                    phase: other.name(),
                })
            }
        };

        let request = self.build_request(details)?;
        self.submit_scan(request).await
    }

    pub fn cancel_selection(&mut self) {
        if matches!(
            self.phase,
            ScanPhase::SingleSeatSelection { .. } | ScanPhase::BulkSelection { .. }
        ) {
            self.phase = ScanPhase::BookingLoaded;
        }
    }

    // === Отправка ===

    /// Проверяет запрос по текущему снимку, без сетевого вызова.
    pub fn validate_scan_request(&self, request: &ScanRequest) -> Result<(), ScanError> {
        let booking = self.loaded_booking()?;
        self.check_request_identity(booking, request)?;
        validate_scan_request(request, &booking.seats)?;
        Ok(())
    }

    /// Отправляет гашение: ровно один сетевой вызов, без повторов.
    ///
    /// Запрос проверяется по снимку непосредственно перед отправкой. При отказе
    /// проверки или ошибке сети локальное состояние не меняется. После успеха
    /// бронирование перечитывается, а в результате показываются количества,
    /// которые реально принял сервер.
    pub async fn submit_scan(&mut self, request: ScanRequest) -> Result<ScanOutcome, ScanError> {
        let booking = self.loaded_booking()?;
        if !self.phase.accepts_submission() {
            return Err(ScanError::InvalidPhase {
                operation: "submit_scan",
                phase: self.phase.name(),
            });
        }
        if booking.seats.is_empty() {
            return Err(ScanError::NoSeats);
        }

        request.validate()?;
        if let Err(e) = self.check_request_identity(booking, &request) {
            warn!(booking_id = booking.booking_id, error = %e, "Scan request does not match the session");
            return Err(e);
        }
        if let Err(rejection) = validate_scan_request(&request, &booking.seats) {
            warn!(booking_id = request.booking_id, %rejection, "Scan request rejected locally");
            return Err(rejection.into());
        }

        let reply = match self
            .authority
            .submit_partial_scan(&request, &self.operator)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(booking_id = request.booking_id, error = %e, "Scan submission failed");
                self.phase = ScanPhase::BookingLoaded;
                return Err(e);
            }
        };

        let mut outcome = ScanOutcome {
            status: reply.status,
            results: reply.results,
            message: reply.message,
            refreshed: false,
        };
        if outcome.is_partial() {
            warn!(
                booking_id = request.booking_id,
                requested = request.requested_total(),
                scanned = outcome.scanned_total(),
                "Scan partially accepted by authority"
            );
        } else {
            info!(
                booking_id = request.booking_id,
                scanned = outcome.scanned_total(),
                "Scan accepted"
            );
        }

        match self.reload().await {
            Ok(_) => outcome.refreshed = true,
            Err(e) => warn!(error = %e, "Failed to refresh booking after scan, keeping last snapshot"),
        }

        self.phase = ScanPhase::ResultDisplayed {
            outcome: outcome.clone(),
        };
        Ok(outcome)
    }
}
