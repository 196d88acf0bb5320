//! # Booking Orchestrator
//!
//! Drives a [`PaymentAttempt`] through the booking state machine:
//! re-check availability, initiate payment with the caller's provider, take
//! the client-reported result, verify server-side, commit to the ledger.
//!
//! The availability answer the user saw while browsing is never trusted; it
//! is re-read in `begin`, immediately before the provider is contacted. No
//! reservation is held between that read and the commit.

use crate::attempt::{
    AttemptEvent, BookingMetadata, BookingState, IdleExit, PaymentAttempt, RejectReason,
};
use crate::availability::{AvailabilityService, UnavailableReason};
use crate::booking::{BookingPayload, RefundStatus};
use crate::error::{BookingError, BookingResult};
use crate::interval::StayInterval;
use crate::ledger::{CommitOutcome, LedgerWriter};
use crate::money::Money;
use crate::profile::PayerProfileProvider;
use crate::provider::{
    ClientResult, IdempotencyContext, InitiateRequest, ProviderRegistry, ProviderSession,
    SharedProvider, VerifiedPayment,
};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, instrument, warn};

/// Timeouts and retry policy
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on `initiate`
    pub provider_timeout: Duration,
    /// Bound on each verification call
    pub verify_timeout: Duration,
    /// Verification calls per attempt, including the first
    pub verify_max_attempts: u32,
    /// Delay before retry `n` is `verify_backoff * n`
    pub verify_backoff: Duration,
    /// Bound on waiting for the client-side result in [`BookingOrchestrator::run`]
    pub result_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            verify_timeout: Duration::from_secs(15),
            verify_max_attempts: 3,
            verify_backoff: Duration::from_millis(500),
            result_timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// A book action
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub resource_id: String,
    pub interval: StayInterval,
    /// Payer identity reference; absent means no profile
    pub payer_id: Option<String>,
    /// Caller-selected provider name
    pub provider: String,
}

/// Future-like source of the single terminal client result of an attempt
#[async_trait]
pub trait ClientResultSource: Send + Sync {
    async fn await_result(&self, session: &ProviderSession) -> ClientResult;
}

/// Coordinates availability, provider and ledger for one attempt at a time
pub struct BookingOrchestrator {
    availability: AvailabilityService,
    profiles: Arc<dyn PayerProfileProvider>,
    providers: ProviderRegistry,
    ledger: Arc<LedgerWriter>,
    config: OrchestratorConfig,
}

impl BookingOrchestrator {
    pub fn new(
        availability: AvailabilityService,
        profiles: Arc<dyn PayerProfileProvider>,
        providers: ProviderRegistry,
        ledger: Arc<LedgerWriter>,
    ) -> Self {
        Self {
            availability,
            profiles,
            providers,
            ledger,
            config: OrchestratorConfig::default(),
        }
    }

    /// Builder: override timeouts and retry policy
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn ledger(&self) -> &LedgerWriter {
        &self.ledger
    }

    /// Validate, re-check availability and initiate payment.
    ///
    /// Business rejections come back as `Ok` with the attempt in a
    /// `Rejected` state. Infrastructure failures abort the attempt and are
    /// returned as errors; nothing is recorded.
    #[instrument(skip(self, request), fields(resource_id = %request.resource_id, provider = %request.provider))]
    pub async fn begin(&self, request: BookingRequest) -> BookingResult<PaymentAttempt> {
        let provider = self.providers.get(&request.provider)?.clone();

        let mut attempt = PaymentAttempt::new(
            request.resource_id,
            request.interval,
            request.payer_id.unwrap_or_default(),
            request.provider,
        );
        attempt.apply(AttemptEvent::Book)?;

        let profile = if attempt.payer_id.trim().is_empty() {
            None
        } else {
            let lookup = self.profiles.profile(&attempt.payer_id).await;
            match lookup {
                Ok(profile) => profile.filter(|p| p.is_usable()),
                Err(e) => return Err(abort(&mut attempt, e)),
            }
        };
        let Some(profile) = profile else {
            info!("Attempt {} rejected: missing profile", attempt.id);
            attempt.apply(AttemptEvent::Reject(RejectReason::MissingProfile))?;
            return Ok(attempt);
        };

        let lookup = self.availability.resource(&attempt.resource_id).await;
        let resource = match lookup {
            Ok(resource) => resource,
            Err(e) => return Err(abort(&mut attempt, e)),
        };

        let recheck = self.availability.assess(&resource, &attempt.interval).await;
        let availability = match recheck {
            Ok(availability) => availability,
            Err(e) => return Err(abort(&mut attempt, e)),
        };

        if !availability.available {
            let reason = match availability.reason {
                Some(UnavailableReason::OwnerBlocked) => RejectReason::OwnerBlocked,
                _ => RejectReason::Conflict,
            };
            info!("Attempt {} rejected: {:?}", attempt.id, reason);
            attempt.conflicts = availability.conflicts;
            attempt.apply(AttemptEvent::Reject(reason))?;
            return Ok(attempt);
        }
        attempt.apply(AttemptEvent::AvailabilityConfirmed)?;

        let amount = match resource.price_for(&attempt.interval) {
            Ok(amount) if amount.is_positive() => amount,
            Ok(amount) => {
                let e = BookingError::InvalidRequest(format!(
                    "refusing to charge {} for {}",
                    amount, attempt.resource_id
                ));
                return Err(abort(&mut attempt, e));
            }
            Err(e) => return Err(abort(&mut attempt, e)),
        };
        let request = InitiateRequest {
            amount,
            payer: profile.contact,
            idempotency: IdempotencyContext::for_attempt(attempt.id),
            metadata: BookingMetadata::new(&attempt, amount).to_map(),
        };

        let session = match timeout(self.config.provider_timeout, provider.initiate(&request)).await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(abort(&mut attempt, e)),
            Err(_) => {
                let e = BookingError::Timeout {
                    operation: format!("{} initiate", provider.provider_name()),
                    after_secs: self.config.provider_timeout.as_secs(),
                };
                return Err(abort(&mut attempt, e));
            }
        };

        info!(
            "Attempt {} initiated with {}: reference={}, amount={}",
            attempt.id, session.provider, session.reference, amount
        );
        attempt.amount = Some(amount);
        attempt.session = Some(session);
        attempt.apply(AttemptEvent::PaymentInitiated)?;
        Ok(attempt)
    }

    /// Record the client-side result of the provider widget.
    ///
    /// Failure and abandonment return the attempt to `Idle`.
    pub fn receive_result(
        &self,
        attempt: &mut PaymentAttempt,
        result: ClientResult,
    ) -> BookingResult<()> {
        attempt.apply(AttemptEvent::ResultReceived)?;

        match &result {
            ClientResult::Success { .. } => {}
            ClientResult::Failed { reason } => {
                info!("Attempt {}: payment failed ({})", attempt.id, reason);
                attempt.exit = Some(IdleExit::PaymentFailed(reason.clone()));
                attempt.apply(AttemptEvent::PaymentNotCompleted)?;
            }
            ClientResult::Abandoned => {
                info!("Attempt {}: payment abandoned", attempt.id);
                attempt.exit = Some(IdleExit::PaymentAbandoned);
                attempt.apply(AttemptEvent::PaymentNotCompleted)?;
            }
        }

        attempt.client_result = Some(result);
        Ok(())
    }

    /// Verify server-side and commit.
    ///
    /// Runs only after a client-reported success. May be called again on an
    /// attempt left in `Verifying` by a storage failure; verification and
    /// commit are both idempotent per reference.
    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    pub async fn confirm(&self, attempt: &mut PaymentAttempt) -> BookingResult<()> {
        let client_reference = match &attempt.client_result {
            Some(ClientResult::Success { reference }) => reference.clone(),
            _ => {
                return Err(BookingError::InvalidTransition {
                    from: attempt.state.to_string(),
                    event: "confirm without client success".to_string(),
                })
            }
        };

        if attempt.state != BookingState::Verifying {
            attempt.apply(AttemptEvent::StartVerification)?;
        }

        let (Some(session), Some(expected)) = (attempt.session.clone(), attempt.amount) else {
            return Err(BookingError::Internal(
                "attempt in verification without session".to_string(),
            ));
        };

        if client_reference.trim() != session.reference {
            warn!(
                "Client reference {} does not match session {}",
                client_reference, session.reference
            );
            return fail_verification(
                attempt,
                BookingError::CallbackParseError("client reference mismatch".to_string()),
            );
        }

        let provider = self.providers.get(&attempt.provider)?.clone();
        let verified = match self.confirm_with_retry(&provider, &session.reference, &expected).await
        {
            Ok(verified) => verified,
            Err(e) => return fail_verification(attempt, e),
        };

        let payload = payload_from(
            &attempt.resource_id,
            attempt.interval,
            &attempt.payer_id,
            provider.provider_name(),
            verified,
        );
        let outcome = self.commit(&session.reference, payload).await?;

        attempt.commit = Some(outcome);
        attempt.apply(AttemptEvent::Committed)?;
        Ok(())
    }

    /// Drive a whole attempt, awaiting the client result from `results`.
    ///
    /// Waiting for the client result is bounded; on expiry the attempt ends
    /// in `VerificationFailed`.
    pub async fn run(
        &self,
        request: BookingRequest,
        results: &dyn ClientResultSource,
    ) -> BookingResult<PaymentAttempt> {
        let mut attempt = self.begin(request).await?;
        let Some(session) = attempt.session.clone() else {
            return Ok(attempt);
        };

        let result = match timeout(self.config.result_timeout, results.await_result(&session)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("Attempt {}: no payment result in time", attempt.id);
                attempt.failure = Some("timed out waiting for payment result".to_string());
                attempt.apply(AttemptEvent::ResultTimedOut)?;
                return Ok(attempt);
            }
        };

        self.receive_result(&mut attempt, result)?;
        if matches!(attempt.client_result, Some(ClientResult::Success { .. })) {
            self.confirm(&mut attempt).await?;
        }
        Ok(attempt)
    }

    /// Reconcile a provider callback for `reference`.
    ///
    /// Only references proposed by [`begin`](Self::begin) are accepted. The
    /// stay is read from the metadata attached at initiation, but the amount
    /// it must have been paid is recomputed from the resource catalog and the
    /// stay is re-checked against the ledger before anything is written.
    /// Repeated callbacks return `created: false`.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, provider: &str, reference: &str) -> BookingResult<CommitOutcome> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(BookingError::MissingReference);
        }
        let provider = self.providers.get(provider)?.clone();

        if self.ledger.store().find(reference).await?.is_some() {
            info!("Callback for {} already committed", reference);
            return Ok(CommitOutcome { created: false });
        }

        let lookup = self
            .with_verify_retry(provider.provider_name(), || provider.verify(reference))
            .await?;
        let metadata = BookingMetadata::from_map(&lookup.metadata)?;

        if IdempotencyContext::for_attempt(metadata.attempt_id).reference != reference {
            warn!(
                "Callback reference {} was not proposed for attempt {}",
                reference, metadata.attempt_id
            );
            return Err(BookingError::UnrecognizedReference {
                reference: reference.to_string(),
            });
        }

        let resource = self.availability.resource(&metadata.resource_id).await?;
        let expected = resource.price_for(&metadata.interval)?;
        if metadata.amount != expected {
            error!(
                "Callback {} carries amount {}, catalog price is {}",
                reference, metadata.amount, expected
            );
            return Err(BookingError::AmountMismatch {
                reference: reference.to_string(),
                expected: expected.to_string(),
                verified: metadata.amount.to_string(),
            });
        }

        let availability = self
            .availability
            .assess(&resource, &metadata.interval)
            .await?;
        if !availability.available {
            error!(
                "Paid stay {} on {} is no longer available ({:?}); refund required",
                reference, metadata.resource_id, availability.reason
            );
            return Err(BookingError::StayUnavailable {
                reference: reference.to_string(),
                resource_id: metadata.resource_id,
            });
        }

        let verified = self
            .confirm_with_retry(&provider, reference, &expected)
            .await?;

        let payload = payload_from(
            &metadata.resource_id,
            metadata.interval,
            &metadata.payer_id,
            provider.provider_name(),
            verified,
        );
        self.commit(reference, payload).await
    }

    /// Annotate the refund state of a committed booking
    pub async fn record_refund(&self, reference: &str, status: RefundStatus) -> BookingResult<bool> {
        let found = self.ledger.store().annotate_refund(reference, status).await?;
        if found {
            info!("Refund {} recorded for {}", status.as_str(), reference);
        } else {
            warn!("Refund callback for unknown reference {}", reference);
        }
        Ok(found)
    }

    async fn commit(&self, reference: &str, payload: BookingPayload) -> BookingResult<CommitOutcome> {
        // Accepted race: two payers may both pass the pre-payment re-check.
        // The overlap is surfaced here, not prevented.
        if let Ok(resource) = self.availability.resource(&payload.resource_id).await {
            if let Ok(availability) = self.availability.assess(&resource, &payload.interval).await {
                if !availability.conflicts.is_empty()
                    && self.ledger.store().find(reference).await.ok().flatten().is_none()
                {
                    warn!(
                        "Committing {} over {} overlapping booking(s) on {}",
                        reference,
                        availability.conflicts.len(),
                        payload.resource_id
                    );
                }
            }
        }

        self.ledger.commit(reference, payload).await
    }

    async fn confirm_with_retry(
        &self,
        provider: &SharedProvider,
        reference: &str,
        expected: &Money,
    ) -> BookingResult<VerifiedPayment> {
        self.with_verify_retry(provider.provider_name(), || {
            provider.confirm(reference, expected)
        })
        .await
    }

    /// Bounded, retried verification. Every retry reuses the same reference.
    async fn with_verify_retry<T, F, Fut>(&self, provider: &str, op: F) -> BookingResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BookingResult<T>>,
    {
        let max_attempts = self.config.verify_max_attempts.max(1);
        let mut n = 1;
        loop {
            let result = match timeout(self.config.verify_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(BookingError::Timeout {
                    operation: format!("{} verification", provider),
                    after_secs: self.config.verify_timeout.as_secs(),
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && n < max_attempts => {
                    warn!("Verification attempt {}/{} failed: {}", n, max_attempts, e);
                    sleep(self.config.verify_backoff * n).await;
                    n += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn abort(attempt: &mut PaymentAttempt, e: BookingError) -> BookingError {
    error!("Attempt {} aborted: {}", attempt.id, e);
    attempt.exit = Some(IdleExit::Aborted(e.to_string()));
    if let Err(transition) = attempt.apply(AttemptEvent::Abort) {
        error!("Attempt {}: {}", attempt.id, transition);
    }
    e
}

fn fail_verification(attempt: &mut PaymentAttempt, e: BookingError) -> BookingResult<()> {
    error!("Attempt {} verification failed: {}", attempt.id, e);
    attempt.failure = Some(e.to_string());
    attempt.apply(AttemptEvent::VerificationFailed)?;
    Ok(())
}

fn payload_from(
    resource_id: &str,
    interval: StayInterval,
    payer_id: &str,
    provider: &str,
    verified: VerifiedPayment,
) -> BookingPayload {
    BookingPayload {
        resource_id: resource_id.to_string(),
        interval,
        payer_id: payer_id.to_string(),
        amount: verified.amount,
        provider: provider.to_string(),
        channel: verified.channel,
        paid_at: verified.paid_at,
        verified_at: Utc::now(),
    }
}
