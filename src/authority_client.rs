//! authority_client.rs
//!
//! Граница с удалённым сервером, который владеет бронированиями и счётчиками гашения.
//!
//! Ключевые компоненты:
//! 1.  **ScanAuthority**: две удалённые операции, которые нужны сессии сканирования.
//!     Сессия знает только этот трейт, поэтому в тестах сервер легко подменить.
//! 2.  **AuthorityClient**: реализация поверх `reqwest`. Каждый вызов проходит через
//!     `CircuitBreaker`; повторов нет, один вызов оператора - один HTTP-запрос.
//! 3.  **Wire-модели**: ответ сервера приводится к одной канонической форме
//!     (`bookingSeats`; вариант `BookingSeats` принимается только здесь).

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::{AuthorityConfig, CircuitBreakerConfig},
    error::{ConfigError, ScanError},
    models::{Booking, ScanRequest, ScanResult, ScanStatus, SeatLine, SeatTypeId},
    services::circuit_breaker::{CircuitBreaker, CircuitState},
    session::OperatorSession,
};

/// Ответ сервера на отправку гашения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReply {
    pub status: ScanStatus,
    pub results: Vec<ScanResult>,
    pub message: Option<String>,
}

/// Удалённый источник истины по бронированиям.
#[async_trait]
pub trait ScanAuthority: Send + Sync {
    /// `GetBookingForScan`: бронирование и его строки по введённому коду.
    async fn get_booking_for_scan(
        &self,
        booking_code: &str,
        session: &OperatorSession,
    ) -> Result<Booking, ScanError>;

    /// `SubmitPartialScan`: единственная изменяющая операция.
    async fn submit_partial_scan(
        &self,
        request: &ScanRequest,
        session: &OperatorSession,
    ) -> Result<ScanReply, ScanError>;
}

// --- Модели данных API сервера ---

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: ScanStatus,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingDto {
    #[serde(alias = "id")]
    booking_id: i64,
    #[serde(default)]
    booking_code: Option<String>,
    #[serde(default)]
    event_name: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default, alias = "BookingSeats")]
    booking_seats: Vec<SeatLineDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeatLineDto {
    seat_type_id: i64,
    #[serde(default)]
    seat_name: String,
    quantity: u32,
    #[serde(default)]
    scanned_quantity: u32,
    #[serde(default)]
    remaining_quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanDataDto {
    #[serde(default)]
    scan_results: Vec<ScanResult>,
}

impl BookingDto {
    fn into_booking(self, requested_code: &str) -> Booking {
        Booking {
            booking_id: self.booking_id,
            booking_code: self
                .booking_code
                .unwrap_or_else(|| requested_code.to_string()),
            event_name: self.event_name,
            customer_name: self.customer_name,
            seats: self
                .booking_seats
                .into_iter()
                .map(|dto| {
                    SeatLine::new(
                        SeatTypeId(dto.seat_type_id),
                        dto.seat_name,
                        dto.quantity,
                        dto.scanned_quantity,
                        dto.remaining_quantity,
                    )
                })
                .collect(),
        }
    }
}

/// HTTP-клиент сервера сканирования.
#[derive(Clone)]
pub struct AuthorityClient {
    base_url: Url,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl AuthorityClient {
    pub fn from_config(
        config: &AuthorityConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Result<Self, ScanError> {
        let base_url = Url::parse(&config.base_url).map_err(|_| ConfigError::Invalid {
            var: "SCAN_API_URL",
            value: config.base_url.clone(),
        })?;

        Ok(Self {
            base_url,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()?,
            circuit_breaker: Arc::new(CircuitBreaker::from_config(breaker)),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ScanError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ScanError::Network(format!("base url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder, session: &OperatorSession) -> RequestBuilder {
        let builder = builder.header("X-Request-Id", Uuid::new_v4().to_string());
        match session.current_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Отправляет запрос через Circuit Breaker. Сбоем считаются только ошибки
    /// транспорта и ответы 5xx.
    async fn execute_with_circuit_breaker(
        &self,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, ScanError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking scan authority request");
            return Err(ScanError::AuthorityUnavailable);
        }

        match builder.send().await {
            Ok(response) if response.status().is_server_error() => {
                error!(status = %response.status(), "Scan authority returned server error");
                self.circuit_breaker.record_failure();
                Err(ScanError::Network(format!(
                    "authority returned {}",
                    response.status()
                )))
            }
            Ok(response) => {
                self.circuit_breaker.record_success();
                Ok(response)
            }
            Err(e) => {
                error!("Scan authority request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ScanAuthority for AuthorityClient {
    async fn get_booking_for_scan(
        &self,
        booking_code: &str,
        session: &OperatorSession,
    ) -> Result<Booking, ScanError> {
        let url = self.endpoint(&["api", "v1", "scan", "booking", booking_code])?;
        info!(booking_code, "Fetching booking for scan");

        let builder = self.authorize(self.http_client.get(url), session);
        let response = self.execute_with_circuit_breaker(builder).await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(ScanError::NotFound {
                    code: booking_code.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(ScanError::AuthorityRejected {
                    message: format!("lookup failed with HTTP {status}"),
                })
            }
            _ => {}
        }

        let envelope: Envelope<BookingDto> = response.json().await?;
        match (envelope.status, envelope.data) {
            (ScanStatus::Error, _) | (_, None) => {
                debug!(booking_code, message = ?envelope.message, "Booking lookup returned no data");
                Err(ScanError::NotFound {
                    code: booking_code.to_string(),
                })
            }
            (_, Some(dto)) => Ok(dto.into_booking(booking_code)),
        }
    }

    async fn submit_partial_scan(
        &self,
        request: &ScanRequest,
        session: &OperatorSession,
    ) -> Result<ScanReply, ScanError> {
        let url = self.endpoint(&["api", "v1", "scan", "partial"])?;
        info!(
            booking_id = request.booking_id,
            lines = request.seat_scan_details.len(),
            requested = request.requested_total(),
            "Submitting scan"
        );

        let builder = self.authorize(self.http_client.post(url).json(request), session);
        let response = self.execute_with_circuit_breaker(builder).await?;
        let http_status = response.status();

        let envelope: Envelope<ScanDataDto> = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) if http_status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ScanError::AuthorityRejected {
                    message: format!("HTTP {http_status}"),
                })
            }
        };

        if !http_status.is_success() || envelope.status == ScanStatus::Error {
            return Err(ScanError::AuthorityRejected {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("HTTP {http_status}")),
            });
        }

        Ok(ScanReply {
            status: envelope.status,
            results: envelope.data.map(|d| d.scan_results).unwrap_or_default(),
            message: envelope.message,
        })
    }
}
