use serde::{Deserialize, Serialize};
use validator::Validate;

use super::SeatTypeId;

/// Одна позиция запроса: сколько билетов данного типа погасить.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatScanDetail {
    pub seat_type_id: SeatTypeId,
    pub quantity_to_scan: u32,
}

/// Запрос на гашение. Нигде не сохраняется, живёт до ответа сервера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub booking_id: i64,
    #[validate(length(min = 1))]
    pub scanned_by: String,
    #[validate(length(max = 255))]
    pub device_info: String,
    pub seat_scan_details: Vec<SeatScanDetail>,
}

impl ScanRequest {
    pub fn requested_total(&self) -> u32 {
        self.seat_scan_details
            .iter()
            .fold(0u32, |acc, d| acc.saturating_add(d.quantity_to_scan))
    }
}

/// Итог ответа сервера. `Partial` - не ошибка: часть билетов уже погашена кем-то другим.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ScanStatus {
    Success,
    Partial,
    Error,
}

impl TryFrom<String> for ScanStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        match value.to_ascii_lowercase().as_str() {
            "success" => Ok(ScanStatus::Success),
            "partial" => Ok(ScanStatus::Partial),
            "error" => Ok(ScanStatus::Error),
            other => Err(format!("unknown scan status '{other}'")),
        }
    }
}

/// Результат по одному типу мест.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[serde(alias = "seat_type_id")]
    pub seat_type_id: SeatTypeId,
    #[serde(default, alias = "seat_name")]
    pub seat_name: Option<String>,
    #[serde(alias = "requested_quantity")]
    pub requested_quantity: u32,
    /// Сколько реально принято сервером, может быть меньше запрошенного.
    #[serde(alias = "scanned_quantity")]
    pub scanned_quantity: u32,
    #[serde(alias = "remaining_quantity")]
    pub remaining_quantity: u32,
}

impl ScanResult {
    pub fn shortfall(&self) -> u32 {
        self.requested_quantity.saturating_sub(self.scanned_quantity)
    }
}

/// То, что показывается оператору после отправки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub results: Vec<ScanResult>,
    pub message: Option<String>,
    /// Удалось ли перечитать бронирование после гашения.
    pub refreshed: bool,
}

impl ScanOutcome {
    pub fn is_partial(&self) -> bool {
        self.status == ScanStatus::Partial || self.results.iter().any(|r| r.shortfall() > 0)
    }

    pub fn scanned_total(&self) -> u32 {
        self.results
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.scanned_quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_any_case() {
        let status: ScanStatus = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(status, ScanStatus::Partial);
        assert!(serde_json::from_str::<ScanStatus>("\"done\"").is_err());
    }

    #[test]
    fn request_serializes_camel_case() {
        let request = ScanRequest {
            booking_id: 42,
            scanned_by: "17".to_string(),
            device_info: "gate-3".to_string(),
            seat_scan_details: vec![SeatScanDetail {
                seat_type_id: SeatTypeId(7),
                quantity_to_scan: 6,
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["bookingId"], 42);
        assert_eq!(json["scannedBy"], "17");
        assert_eq!(json["seatScanDetails"][0]["seatTypeId"], 7);
        assert_eq!(json["seatScanDetails"][0]["quantityToScan"], 6);
    }

    #[test]
    fn request_without_operator_fails_validation() {
        let request = ScanRequest {
            booking_id: 1,
            scanned_by: String::new(),
            device_info: String::new(),
            seat_scan_details: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn partial_outcome_detected_from_shortfall() {
        let outcome = ScanOutcome {
            status: ScanStatus::Success,
            results: vec![ScanResult {
                seat_type_id: SeatTypeId(7),
                seat_name: None,
                requested_quantity: 6,
                scanned_quantity: 4,
                remaining_quantity: 2,
            }],
            message: None,
            refreshed: true,
        };
        assert!(outcome.is_partial());
        assert_eq!(outcome.scanned_total(), 4);
    }

    #[test]
    fn totals_saturate_on_huge_quantities() {
        let detail = |id, qty| SeatScanDetail {
            seat_type_id: SeatTypeId(id),
            quantity_to_scan: qty,
        };
        let request = ScanRequest {
            booking_id: 1,
            scanned_by: "17".to_string(),
            device_info: String::new(),
            seat_scan_details: vec![detail(1, u32::MAX), detail(2, 1)],
        };
        assert_eq!(request.requested_total(), u32::MAX);

        let result = |id, scanned| ScanResult {
            seat_type_id: SeatTypeId(id),
            seat_name: None,
            requested_quantity: scanned,
            scanned_quantity: scanned,
            remaining_quantity: 0,
        };
        let outcome = ScanOutcome {
            status: ScanStatus::Success,
            results: vec![result(1, u32::MAX), result(2, 1)],
            message: None,
            refreshed: false,
        };
        assert_eq!(outcome.scanned_total(), u32::MAX);
    }
}
