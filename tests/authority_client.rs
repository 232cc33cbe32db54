//! Тесты HTTP-границы клиента сервера сканирования.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ticket_scanner::{
    authority_client::{AuthorityClient, ScanAuthority},
    config::{AuthorityConfig, CircuitBreakerConfig},
    error::ScanError,
    models::{ScanRequest, ScanStatus, SeatScanDetail, SeatTypeId},
    services::circuit_breaker::CircuitState,
    services::scan_session::ScanSession,
    session::OperatorSession,
};

fn client(server: &MockServer, failure_threshold: u32) -> AuthorityClient {
    AuthorityClient::from_config(
        &AuthorityConfig {
            base_url: server.uri(),
            timeout_seconds: 5,
        },
        &CircuitBreakerConfig {
            failure_threshold,
            timeout_seconds: 60,
        },
    )
    .unwrap()
}

fn operator() -> OperatorSession {
    OperatorSession::new("17", Some("token-abc".to_string()))
}

fn scan_request() -> ScanRequest {
    ScanRequest {
        booking_id: 501,
        scanned_by: "17".to_string(),
        device_info: "gate-2".to_string(),
        seat_scan_details: vec![SeatScanDetail {
            seat_type_id: SeatTypeId(7),
            quantity_to_scan: 6,
        }],
    }
}

#[tokio::test]
async fn lookup_normalizes_legacy_casing_and_sends_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/scan/booking/ZTH20260110"))
        .and(header("authorization", "Bearer token-abc"))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Success",
            "data": {
                "bookingId": 501,
                "bookingCode": "ZTH20260110",
                "eventName": "Jazz Night",
                "BookingSeats": [
                    { "seatTypeId": 7, "seatName": "VIP", "quantity": 10, "scannedQuantity": 4 },
                    { "seatTypeId": 8, "seatName": "Balcony", "quantity": 2, "scannedQuantity": 0, "remainingQuantity": 1 }
                ]
            },
            "message": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let booking = client(&server, 5)
        .get_booking_for_scan("ZTH20260110", &operator())
        .await
        .unwrap();

    assert_eq!(booking.booking_id, 501);
    assert_eq!(booking.seats.len(), 2);
    assert_eq!(booking.line(SeatTypeId(7)).unwrap().remaining(), 6);
    // остаток от сервера важнее локального расчёта
    assert_eq!(booking.line(SeatTypeId(8)).unwrap().remaining(), 1);
}

#[tokio::test]
async fn lookup_maps_404_and_error_status_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/scan/booking/MISSING"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/scan/booking/VOID"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Error",
            "data": null,
            "message": "Booking not found"
        })))
        .mount(&server)
        .await;

    let client = client(&server, 5);
    assert!(matches!(
        client.get_booking_for_scan("MISSING", &operator()).await,
        Err(ScanError::NotFound { .. })
    ));
    assert!(matches!(
        client.get_booking_for_scan("VOID", &operator()).await,
        Err(ScanError::NotFound { .. })
    ));
    assert_eq!(client.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn submit_returns_partial_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/scan/partial"))
        .and(body_partial_json(json!({
            "bookingId": 501,
            "scannedBy": "17",
            "seatScanDetails": [{ "seatTypeId": 7, "quantityToScan": 6 }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Partial",
            "data": {
                "scanResults": [
                    { "seatTypeId": 7, "requestedQuantity": 6, "scannedQuantity": 4, "remainingQuantity": 2 }
                ]
            },
            "message": "Partially scanned"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, 5)
        .submit_partial_scan(&scan_request(), &operator())
        .await
        .unwrap();

    assert_eq!(reply.status, ScanStatus::Partial);
    assert_eq!(reply.results[0].scanned_quantity, 4);
    assert_eq!(reply.results[0].remaining_quantity, 2);
    assert_eq!(reply.message.as_deref(), Some("Partially scanned"));
}

#[tokio::test]
async fn submit_error_status_is_authority_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/scan/partial"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "Error",
            "data": null,
            "message": "Booking is cancelled"
        })))
        .mount(&server)
        .await;

    let err = client(&server, 5)
        .submit_partial_scan(&scan_request(), &operator())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::AuthorityRejected { message } if message == "Booking is cancelled"));
}

#[tokio::test]
async fn server_errors_open_circuit_and_stop_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/scan/partial"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, 2);
    for _ in 0..2 {
        assert!(matches!(
            client.submit_partial_scan(&scan_request(), &operator()).await,
            Err(ScanError::Network(_))
        ));
    }
    assert_eq!(client.circuit_state(), CircuitState::Open);

    // третий вызов до сервера не доходит
    assert!(matches!(
        client.submit_partial_scan(&scan_request(), &operator()).await,
        Err(ScanError::AuthorityUnavailable)
    ));
}

#[tokio::test]
async fn session_refreshes_booking_over_http_after_scan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/scan/booking/ZTH20260110"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Success",
            "data": {
                "bookingId": 501,
                "bookingCode": "ZTH20260110",
                "bookingSeats": [
                    { "seatTypeId": 7, "seatName": "VIP", "quantity": 10, "scannedQuantity": 4 }
                ]
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/scan/booking/ZTH20260110"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Success",
            "data": {
                "bookingId": 501,
                "bookingCode": "ZTH20260110",
                "bookingSeats": [
                    { "seatTypeId": 7, "seatName": "VIP", "quantity": 10, "scannedQuantity": 8, "remainingQuantity": 2 }
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/scan/partial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "partial",
            "data": {
                "scanResults": [
                    { "seatTypeId": 7, "requestedQuantity": 6, "scannedQuantity": 4, "remainingQuantity": 2 }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ScanSession::new(client(&server, 5), operator(), "gate-2");
    session.load_booking("ZTH20260110").await.unwrap();
    session.begin_bulk_selection().unwrap();
    session.set_bulk_quantity(SeatTypeId(7), 6).unwrap();

    let outcome = session.submit_bulk().await.unwrap();
    assert!(outcome.refreshed);
    assert_eq!(outcome.status, ScanStatus::Partial);
    assert_eq!(session.remaining(SeatTypeId(7)).unwrap(), 2);
}
