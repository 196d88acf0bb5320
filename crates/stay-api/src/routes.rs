//! # Routes
//!
//! Axum router configuration for the booking API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - API v1:
///   - GET  /api/v1/providers - Registered payment providers
///   - GET  /api/v1/resources/{resource_id}/availability?start=&end= - Availability
///   - POST /api/v1/bookings - Start a booking
///   - POST /api/v1/bookings/{reference}/result - Client payment result
///   - GET  /api/v1/bookings/{reference} - Ledger lookup
///
/// - Webhooks:
///   - POST /webhook/{provider} - Provider callbacks
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/providers", get(handlers::list_providers))
        .route(
            "/resources/{resource_id}/availability",
            get(handlers::check_availability),
        )
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{reference}", get(handlers::get_booking))
        .route("/bookings/{reference}/result", post(handlers::submit_result));

    // Raw body, signature checked by the provider adapter
    let webhook_routes = Router::new().route("/{provider}", post(handlers::provider_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use async_trait::async_trait;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use stay_core::{
        AmountUnit, AvailabilityService, BookingError, BookingMetadata, BookingOrchestrator,
        BookingPayload, BookingRecord, BookingResult, BookingStore, CallbackEvent, CallbackKind,
        Currency, InitiateRequest, LedgerWriter, MemoryBookingStore, Money, PayerProfile,
        PaymentAttempt, PaymentProviderAdapter, ProfileDirectory, ProviderRegistry,
        ProviderSession, Resource, ResourceCatalog, StayInterval, VerifiedPayment,
    };

    /// Provider double: sessions are remembered and verify as paid in full
    #[derive(Default)]
    struct StubProvider {
        initiate_calls: AtomicUsize,
        sessions: Mutex<HashMap<String, (Money, HashMap<String, String>)>>,
    }

    #[async_trait]
    impl PaymentProviderAdapter for StubProvider {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        fn amount_unit(&self) -> AmountUnit {
            AmountUnit::Minor
        }

        fn signature_header(&self) -> &'static str {
            "x-stub-signature"
        }

        async fn initiate(&self, request: &InitiateRequest) -> BookingResult<ProviderSession> {
            self.initiate_calls.fetch_add(1, Ordering::SeqCst);
            let reference = request.idempotency.reference.clone();
            self.sessions.lock().unwrap().insert(
                reference.clone(),
                (request.amount, request.metadata.clone()),
            );
            Ok(ProviderSession {
                provider: "stub".into(),
                checkout_url: Some(format!("https://pay.example/{}", reference)),
                reference,
                created_at: Utc::now(),
            })
        }

        async fn verify(&self, reference: &str) -> BookingResult<VerifiedPayment> {
            let (amount, metadata) = self
                .sessions
                .lock()
                .unwrap()
                .get(reference)
                .cloned()
                .ok_or_else(|| BookingError::InvalidRequest("unknown reference".into()))?;
            Ok(VerifiedPayment {
                reference: reference.to_string(),
                success: true,
                status: "success".into(),
                amount,
                paid_at: Some(Utc::now()),
                channel: "card".into(),
                metadata,
            })
        }

        async fn verify_callback(
            &self,
            payload: &[u8],
            signature: &str,
        ) -> BookingResult<CallbackEvent> {
            if signature != "trusted" {
                return Err(BookingError::CallbackVerificationFailed(
                    "Signature mismatch".into(),
                ));
            }
            let body: Value = serde_json::from_slice(payload)
                .map_err(|e| BookingError::CallbackParseError(e.to_string()))?;
            let kind = match body["event"].as_str() {
                Some("charge") => CallbackKind::ChargeSucceeded,
                Some("refund") => CallbackKind::RefundProcessed,
                other => CallbackKind::Unknown(other.unwrap_or_default().to_string()),
            };
            Ok(CallbackEvent {
                provider: "stub".into(),
                kind,
                reference: body["reference"].as_str().map(String::from),
                raw_data: Some(body),
                received_at: Utc::now(),
            })
        }
    }

    struct Harness {
        server: TestServer,
        provider: Arc<StubProvider>,
        store: Arc<MemoryBookingStore>,
    }

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: "http://localhost".into(),
            environment: "test".into(),
            database_url: None,
            resource_catalog: "config/resources.toml".into(),
            profile_service_url: None,
            verify_timeout_secs: 5,
            verify_max_attempts: 2,
            provider_timeout_secs: 5,
            attempt_ttl_secs: 600,
        }
    }

    async fn harness() -> Harness {
        let catalog = ResourceCatalog::new()
            .with_resource(Resource::new("loft", 20_000, Currency::NGN))
            .with_resource(Resource::new("cabin", 15_000, Currency::NGN).blocked());
        let store = Arc::new(MemoryBookingStore::new());
        store
            .insert(BookingRecord::from_payload(
                "existing",
                BookingPayload {
                    resource_id: "loft".into(),
                    interval: StayInterval::parse("2025-06-03", "2025-06-05").unwrap(),
                    payer_id: "u9".into(),
                    amount: Money::from_major(40_000, Currency::NGN).unwrap(),
                    provider: "stub".into(),
                    channel: "card".into(),
                    paid_at: None,
                    verified_at: Utc::now(),
                },
            ))
            .await
            .unwrap();

        let profiles = ProfileDirectory::new()
            .with_profile(PayerProfile::new("u1", "Ada Obi", "ada@example.com"));
        let provider = Arc::new(StubProvider::default());

        let orchestrator = BookingOrchestrator::new(
            AvailabilityService::new(Arc::new(catalog), store.clone()),
            Arc::new(profiles),
            ProviderRegistry::new().with_provider(provider.clone()),
            Arc::new(LedgerWriter::new(store.clone())),
        );

        let state = AppState::from_parts(config(), orchestrator);
        let server = TestServer::new(create_router(state)).unwrap();

        Harness {
            server,
            provider,
            store,
        }
    }

    fn booking(start: &str, end: &str) -> Value {
        json!({
            "resource_id": "loft",
            "start": start,
            "end": end,
            "payer_id": "u1",
            "provider": "stub"
        })
    }

    fn signed() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-stub-signature"),
            HeaderValue::from_static("trusted"),
        )
    }

    #[tokio::test]
    async fn test_health_and_providers() {
        let h = harness().await;

        h.server.get("/health").await.assert_status_ok();

        let body: Value = h.server.get("/api/v1/providers").await.json();
        assert_eq!(body["providers"], json!(["stub"]));
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_availability_endpoint() {
        let h = harness().await;

        let back_to_back: Value = h
            .server
            .get("/api/v1/resources/loft/availability")
            .add_query_param("start", "2025-06-01")
            .add_query_param("end", "2025-06-03")
            .await
            .json();
        assert_eq!(back_to_back["available"], true);

        let overlap: Value = h
            .server
            .get("/api/v1/resources/loft/availability")
            .add_query_param("start", "2025-06-04")
            .add_query_param("end", "2025-06-06")
            .await
            .json();
        assert_eq!(overlap["available"], false);
        assert_eq!(overlap["reason"], "date_conflict");
        assert_eq!(
            overlap["conflicts"],
            json!([{"start": "2025-06-03", "end": "2025-06-05"}])
        );

        h.server
            .get("/api/v1/resources/loft/availability")
            .add_query_param("start", "2025-06-03")
            .add_query_param("end", "2025-06-03")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        h.server
            .get("/api/v1/resources/nowhere/availability")
            .add_query_param("start", "2025-06-01")
            .add_query_param("end", "2025-06-03")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_booking_flow_commits_once() {
        let h = harness().await;

        let started = h
            .server
            .post("/api/v1/bookings")
            .json(&booking("2025-06-01", "2025-06-03"))
            .await;
        started.assert_status(StatusCode::CREATED);
        let started: Value = started.json();
        assert_eq!(started["state"], "payment_initiated");
        assert_eq!(started["amount"]["amount_minor"], 4_000_000);
        let reference = started["reference"].as_str().unwrap().to_string();
        assert!(started["checkout_url"].as_str().unwrap().ends_with(&reference));

        let result_path = format!("/api/v1/bookings/{}/result", reference);
        let done: Value = h
            .server
            .post(&result_path)
            .json(&json!({"outcome": "success", "reference": reference}))
            .await
            .json();
        assert_eq!(done["state"], "committed");
        assert_eq!(done["created"], true);

        let record: Value = h
            .server
            .get(&format!("/api/v1/bookings/{}", reference))
            .await
            .json();
        assert_eq!(record["provider_reference"], reference.as_str());
        assert_eq!(record["payer_id"], "u1");

        // The attempt is consumed; a replay cannot commit twice
        h.server
            .post(&result_path)
            .json(&json!({"outcome": "success", "reference": reference}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test]
    async fn test_rejections_are_states_without_provider_calls() {
        let h = harness().await;

        let conflict: Value = h
            .server
            .post("/api/v1/bookings")
            .json(&booking("2025-06-04", "2025-06-06"))
            .await
            .json();
        assert_eq!(conflict["state"], "rejected");
        assert_eq!(conflict["reason_code"], "date_conflict");

        let mut blocked = booking("2025-06-01", "2025-06-03");
        blocked["resource_id"] = json!("cabin");
        let blocked: Value = h.server.post("/api/v1/bookings").json(&blocked).await.json();
        assert_eq!(blocked["reason_code"], "owner_blocked");

        let mut anonymous = booking("2025-06-01", "2025-06-03");
        anonymous["payer_id"] = Value::Null;
        let anonymous: Value = h.server.post("/api/v1/bookings").json(&anonymous).await.json();
        assert_eq!(anonymous["reason_code"], "missing_profile");

        assert_eq!(h.provider.initiate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_must_be_known() {
        let h = harness().await;

        let mut unknown = booking("2025-06-01", "2025-06-03");
        unknown["provider"] = json!("stripe");
        h.server
            .post("/api/v1/bookings")
            .json(&unknown)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let mut blank = booking("2025-06-01", "2025-06-03");
        blank["provider"] = json!("");
        h.server
            .post("/api/v1/bookings")
            .json(&blank)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_abandoned_payment_records_nothing() {
        let h = harness().await;

        let started: Value = h
            .server
            .post("/api/v1/bookings")
            .json(&booking("2025-06-01", "2025-06-03"))
            .await
            .json();
        let reference = started["reference"].as_str().unwrap();

        let closed: Value = h
            .server
            .post(&format!("/api/v1/bookings/{}/result", reference))
            .json(&json!({"outcome": "abandoned"}))
            .await
            .json();
        assert_eq!(closed["state"], "idle");
        assert_eq!(closed["reason_code"], "payment_not_completed");

        h.server
            .get(&format!("/api/v1/bookings/{}", reference))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callback_reconciles_idempotently() {
        let h = harness().await;

        let started: Value = h
            .server
            .post("/api/v1/bookings")
            .json(&booking("2025-06-01", "2025-06-03"))
            .await
            .json();
        let reference = started["reference"].as_str().unwrap().to_string();
        let callback = json!({"event": "charge", "reference": reference});
        let (name, value) = signed();

        let first: Value = h
            .server
            .post("/webhook/stub")
            .add_header(name.clone(), value.clone())
            .json(&callback)
            .await
            .json();
        assert_eq!(first["created"], true);

        let second: Value = h
            .server
            .post("/webhook/stub")
            .add_header(name.clone(), value.clone())
            .json(&callback)
            .await
            .json();
        assert_eq!(second["created"], false);

        // The interactive path arriving late observes the existing record
        let late: Value = h
            .server
            .post(&format!("/api/v1/bookings/{}/result", reference))
            .json(&json!({"outcome": "success", "reference": reference}))
            .await
            .json();
        assert_eq!(late["state"], "committed");
        assert_eq!(late["created"], false);
        assert_eq!(h.store.len().await, 2);

        let refund: Value = h
            .server
            .post("/webhook/stub")
            .add_header(name, value)
            .json(&json!({"event": "refund", "reference": reference}))
            .await
            .json();
        assert_eq!(refund["received"], true);
        let record = h.store.find(&reference).await.unwrap().unwrap();
        assert_eq!(record.refund_status, Some(stay_core::RefundStatus::Processed));
    }

    #[tokio::test]
    async fn test_refused_callbacks_are_acknowledged() {
        let h = harness().await;
        let (name, value) = signed();

        // Paid directly with the provider, cheap and on top of an existing stay
        let attempt = PaymentAttempt::new(
            "loft",
            StayInterval::parse("2025-06-01", "2025-06-30").unwrap(),
            "u1",
            "stub",
        );
        let one_naira = Money::from_minor(100, Currency::NGN);
        h.provider.sessions.lock().unwrap().insert(
            "PAYER-CHOSEN-REF".into(),
            (one_naira, BookingMetadata::new(&attempt, one_naira).to_map()),
        );

        for reference in ["PAYER-CHOSEN-REF", "never-initiated"] {
            let response = h
                .server
                .post("/webhook/stub")
                .add_header(name.clone(), value.clone())
                .json(&json!({"event": "charge", "reference": reference}))
                .await;
            response.assert_status_ok();
            let body: Value = response.json();
            assert_eq!(body["received"], true);
            assert!(body.get("created").is_none());
        }

        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_callback_authentication() {
        let h = harness().await;

        h.server
            .post("/webhook/stub")
            .json(&json!({"event": "charge", "reference": "x"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        h.server
            .post("/webhook/stub")
            .add_header(
                HeaderName::from_static("x-stub-signature"),
                HeaderValue::from_static("forged"),
            )
            .json(&json!({"event": "charge", "reference": "x"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        h.server
            .post("/webhook/unknown")
            .json(&json!({}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
