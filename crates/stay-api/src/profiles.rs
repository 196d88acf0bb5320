//! Payer profiles fetched from the identity service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use stay_core::{BookingError, BookingResult, PayerProfile, PayerProfileProvider};
use tracing::{debug, error, instrument};

/// `GET {base_url}/payers/{payer_id}` returning a `PayerProfile` JSON body.
///
/// 404 means no profile.
pub struct HttpProfileProvider {
    base_url: String,
    client: Client,
}

impl HttpProfileProvider {
    pub fn new(base_url: impl Into<String>) -> BookingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                BookingError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl PayerProfileProvider for HttpProfileProvider {
    #[instrument(skip(self))]
    async fn profile(&self, payer_id: &str) -> BookingResult<Option<PayerProfile>> {
        let url = format!("{}/payers/{}", self.base_url, payer_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BookingError::NetworkError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("No profile for payer {}", payer_id);
                Ok(None)
            }
            status if status.is_success() => {
                let profile = response.json::<PayerProfile>().await.map_err(|e| {
                    BookingError::Serialization(format!("Failed to parse profile: {}", e))
                })?;
                Ok(Some(profile))
            }
            status => {
                error!("Identity service error: status={}", status);
                Err(BookingError::NetworkError(format!(
                    "identity service returned {}",
                    status
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_profile_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payers/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payer_id": "u1",
                "contact": {"name": "Ada Obi", "email": "ada@example.com"},
                "complete": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/payers/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/payers/boom"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = HttpProfileProvider::new(server.uri()).unwrap();

        let profile = provider.profile("u1").await.unwrap().unwrap();
        assert!(profile.is_usable());
        assert!(provider.profile("ghost").await.unwrap().is_none());
        assert!(matches!(
            provider.profile("boom").await,
            Err(BookingError::NetworkError(_))
        ));
    }
}
