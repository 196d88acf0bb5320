//! # Stay Ledger
//!
//! Booking availability and payment reconciliation service.
//!
//! ## Usage
//!
//! ```bash
//! # At least one payment provider
//! export PAYSTACK_SECRET_KEY=sk_test_...
//! export FLW_SECRET_KEY=FLWSECK_TEST-...
//! export FLW_WEBHOOK_HASH=...
//!
//! # Optional: PostgreSQL ledger (in-memory otherwise)
//! export DATABASE_URL=postgres://localhost/stay
//!
//! # Run the server
//! stay-ledger
//! ```

use std::time::Duration;
use stay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    print_banner();

    let state = AppState::new().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!(
        "Payment providers: {:?}",
        state.orchestrator.providers().providers()
    );

    // Attempts whose client never reported back
    let pending = state.pending.clone();
    let sweep_every = state.config.attempt_ttl().max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let purged = pending.purge_expired().await;
            if purged > 0 {
                info!("Purged {} expired payment attempts", purged);
            }
        }
    });

    let app = routes::create_router(state);

    info!("Stay Ledger starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Book: POST http://{}/api/v1/bookings", addr);
        info!("Callbacks: POST http://{}/webhook/{{provider}}", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to structured output
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  Stay Ledger
  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
  Bookings, verified payments
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
