//! reconcile.rs
//!
//! Чистые правила сверки количества билетов. Здесь нет ни сети, ни состояния:
//! функции получают текущий снимок строк бронирования и ничего не меняют.
//!
//! Локальная арифметика - только фильтр перед отправкой. Окончательное
//! значение остатка всегда берётся у сервера после перечитывания бронирования.

use std::collections::BTreeMap;

use crate::{
    error::Rejection,
    models::{ScanRequest, SeatLine, SeatScanDetail, SeatTypeId},
};

/// Остаток по строке: значение сервера, если оно есть, иначе `quantity - scanned_quantity`.
pub fn compute_remaining(line: &SeatLine) -> u32 {
    match line.remaining_quantity {
        Some(remaining) => remaining,
        None => line.quantity.saturating_sub(line.scanned_quantity),
    }
}

/// Жёсткая проверка запроса непосредственно перед отправкой.
///
/// Количество по одному типу мест суммируется, если тип встречается в запросе несколько раз.
pub fn validate_scan_request(request: &ScanRequest, lines: &[SeatLine]) -> Result<(), Rejection> {
    if request.seat_scan_details.iter().all(|d| d.quantity_to_scan == 0) {
        return Err(Rejection::EmptyRequest);
    }

    let mut requested: BTreeMap<SeatTypeId, u32> = BTreeMap::new();
    for detail in &request.seat_scan_details {
        let line = lines
            .iter()
            .find(|line| line.seat_type_id == detail.seat_type_id)
            .ok_or(Rejection::UnknownSeatType {
                seat_type_id: detail.seat_type_id,
            })?;

        if detail.quantity_to_scan == 0 {
            return Err(Rejection::NonPositiveQuantity {
                seat_type_id: detail.seat_type_id,
            });
        }

        let total = requested.entry(detail.seat_type_id).or_insert(0);
        *total = total.saturating_add(detail.quantity_to_scan);

        let remaining = compute_remaining(line);
        if *total > remaining {
            return Err(Rejection::ExceedsRemaining {
                seat_type_id: detail.seat_type_id,
                requested: *total,
                remaining,
            });
        }
    }

    Ok(())
}

/// Позиции полного гашения: каждая строка с ненулевым остатком на весь остаток.
pub fn build_full_scan(lines: &[SeatLine]) -> Vec<SeatScanDetail> {
    lines
        .iter()
        .filter_map(|line| {
            let remaining = compute_remaining(line);
            (remaining > 0).then_some(SeatScanDetail {
                seat_type_id: line.seat_type_id,
                quantity_to_scan: remaining,
            })
        })
        .collect()
}

/// Приводит количество к `[0, remaining]`. Не отклоняет, а молча исправляет.
pub fn clamp_bulk_quantity(line: &SeatLine, quantity: i64) -> u32 {
    let remaining = compute_remaining(line);
    quantity.clamp(0, i64::from(remaining)) as u32
}

/// Приводит количество к `[1, remaining]`; для строки без остатка вернёт 0.
pub fn clamp_single_quantity(line: &SeatLine, quantity: i64) -> u32 {
    let remaining = compute_remaining(line);
    if remaining == 0 {
        return 0;
    }
    quantity.clamp(1, i64::from(remaining)) as u32
}
