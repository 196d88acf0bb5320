//! # Request Handlers
//!
//! Axum request handlers for the booking API.
//! Business outcomes (conflict, owner block, missing profile, payment not
//! completed, verification failure) are 200 responses carrying the attempt
//! state; only infrastructure and validation failures are error statuses.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use stay_core::{
    Availability, BookingError, BookingRecord, BookingRequest, BookingState, CallbackKind,
    ClientResult, CommitOutcome, Conflict, Money, PaymentAttempt, RefundStatus, StayInterval,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Availability query string
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub resource_id: String,
    pub start: String,
    pub end: String,
    #[serde(flatten)]
    pub availability: Availability,
}

/// Book action
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub resource_id: String,
    /// Check-in date, `YYYY-MM-DD`
    pub start: String,
    /// Check-out date, `YYYY-MM-DD`
    pub end: String,
    #[serde(default)]
    pub payer_id: Option<String>,
    /// Payment provider, required
    pub provider: String,
}

/// Where an attempt stands after a request
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub attempt_id: Uuid,
    pub state: String,
    pub reason_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

impl From<&PaymentAttempt> for AttemptResponse {
    fn from(attempt: &PaymentAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            state: attempt.state.name().to_string(),
            reason_code: attempt.reason_code().to_string(),
            message: attempt.user_message().to_string(),
            reference: attempt.reference().map(String::from),
            checkout_url: attempt
                .session
                .as_ref()
                .and_then(|s| s.checkout_url.clone()),
            amount: attempt.amount,
            conflicts: attempt.conflicts.clone(),
            created: attempt.commit.map(|c| c.created),
        }
    }
}

/// Acknowledgement for provider callbacks
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn booking_error_to_response(err: BookingError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    if err.is_retryable() {
        response = response.with_details("retryable");
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stay-ledger",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Registered payment providers
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.orchestrator.providers().providers();
    Json(serde_json::json!({
        "providers": providers,
        "count": providers.len()
    }))
}

/// Check whether a stay can be booked
#[instrument(skip(state))]
pub async fn check_availability(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let interval =
        StayInterval::parse(&query.start, &query.end).map_err(booking_error_to_response)?;

    let availability = state
        .orchestrator
        .availability()
        .check(&resource_id, &interval)
        .await
        .map_err(booking_error_to_response)?;

    Ok(Json(AvailabilityResponse {
        resource_id,
        start: query.start,
        end: query.end,
        availability,
    }))
}

/// Start a booking: validate, re-check availability, initiate payment
#[instrument(skip(state, request), fields(resource_id = %request.resource_id, provider = %request.provider))]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    if request.provider.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("A payment provider must be selected", 400)),
        ));
    }

    let interval =
        StayInterval::parse(&request.start, &request.end).map_err(booking_error_to_response)?;

    let attempt = state
        .orchestrator
        .begin(BookingRequest {
            resource_id: request.resource_id,
            interval,
            payer_id: request.payer_id,
            provider: request.provider,
        })
        .await
        .map_err(|e| {
            error!("Failed to start booking: {}", e);
            booking_error_to_response(e)
        })?;

    let response = AttemptResponse::from(&attempt);
    if attempt.state == BookingState::PaymentInitiated {
        state.pending.insert(attempt).await;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    Ok((StatusCode::OK, Json(response)))
}

/// Deliver the client-side payment result, then verify and commit
#[instrument(skip(state, result))]
pub async fn submit_result(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(result): Json<ClientResult>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let mut attempt = state.pending.take(&reference).await.ok_or_else(|| {
        booking_error_to_response(BookingError::AttemptNotFound {
            reference: reference.clone(),
        })
    })?;

    let orchestrator = &state.orchestrator;
    // A resubmission after a failed commit resumes verification
    if attempt.state != BookingState::Verifying {
        if let Err(e) = orchestrator.receive_result(&mut attempt, result) {
            state.pending.insert(attempt).await;
            return Err(booking_error_to_response(e));
        }
    }

    if matches!(
        attempt.state,
        BookingState::PaymentResultReceived | BookingState::Verifying
    ) {
        if let Err(e) = orchestrator.confirm(&mut attempt).await {
            error!("Commit failed for {}: {}", reference, e);
            state.pending.insert(attempt).await;
            return Err(booking_error_to_response(e));
        }
    }

    info!("Attempt {} finished as {}", attempt.id, attempt.reason_code());
    Ok(Json(AttemptResponse::from(&attempt)))
}

/// Ledger lookup by provider reference
pub async fn get_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<BookingRecord>, ApiError> {
    let record = state
        .orchestrator
        .ledger()
        .store()
        .find(&reference)
        .await
        .map_err(booking_error_to_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    format!("Booking not found: {}", reference),
                    404,
                )),
            )
        })?;

    Ok(Json(record))
}

/// Handle a provider callback
#[instrument(skip(state, headers, body))]
pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let adapter = state
        .orchestrator
        .providers()
        .get(&provider)
        .map_err(booking_error_to_response)?
        .clone();

    let signature = headers
        .get(adapter.signature_header())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    format!("Missing {} header", adapter.signature_header()),
                    400,
                )),
            )
        })?;

    let event = adapter
        .verify_callback(&body, signature)
        .await
        .map_err(|e| {
            error!("Callback verification failed: {}", e);
            booking_error_to_response(e)
        })?;

    info!(
        "Received callback: provider={}, kind={:?}, reference={:?}",
        event.provider, event.kind, event.reference
    );

    let refund = match &event.kind {
        CallbackKind::ChargeSucceeded => {
            let reference = event
                .reference
                .as_deref()
                .ok_or(BookingError::MissingReference)
                .map_err(booking_error_to_response)?;

            // Non-2xx asks the provider to redeliver; only worth it for transient failures
            let created = match state.orchestrator.reconcile(&provider, reference).await {
                Ok(CommitOutcome { created }) => Some(created),
                Err(e) if e.is_redeliverable() => {
                    error!("Reconciliation failed for {}, awaiting redelivery: {}", reference, e);
                    return Err(booking_error_to_response(e));
                }
                Err(e) => {
                    error!("Reconciliation refused for {}: {}", reference, e);
                    None
                }
            };

            return Ok(Json(CallbackResponse {
                received: true,
                created,
            }));
        }
        CallbackKind::RefundPending => Some(RefundStatus::Pending),
        CallbackKind::RefundProcessed => Some(RefundStatus::Processed),
        CallbackKind::RefundFailed => Some(RefundStatus::Failed),
        CallbackKind::ChargeFailed | CallbackKind::Unknown(_) => None,
    };

    match (refund, event.reference.as_deref()) {
        (Some(status), Some(reference)) => {
            state
                .orchestrator
                .record_refund(reference, status)
                .await
                .map_err(booking_error_to_response)?;
        }
        (Some(_), None) => warn!("Refund callback without reference ignored"),
        (None, _) => info!("Callback {:?} acknowledged without action", event.kind),
    }

    Ok(Json(CallbackResponse {
        received: true,
        created: None,
    }))
}
