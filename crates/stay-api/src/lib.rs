//! # stay-api
//!
//! HTTP API layer for stay-ledger-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Availability and booking endpoints
//! - Provider callback handlers
//! - PostgreSQL ledger and HTTP identity-service adapters
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/providers` | Registered payment providers |
//! | GET | `/api/v1/resources/{resource_id}/availability` | Availability for `start`/`end` |
//! | POST | `/api/v1/bookings` | Start a booking |
//! | POST | `/api/v1/bookings/{reference}/result` | Client payment result |
//! | GET | `/api/v1/bookings/{reference}` | Ledger lookup |
//! | POST | `/webhook/{provider}` | Provider callback |

pub mod handlers;
pub mod profiles;
pub mod routes;
pub mod state;
pub mod storage;

pub use routes::create_router;
pub use state::{AppConfig, AppState, PendingAttempts};
