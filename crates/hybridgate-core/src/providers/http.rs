use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{PremiumProvider, ProviderFuture};
use crate::error::ProviderError;
use crate::http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, ReqwestHttpClient};
use crate::record::PremiumDocument;
use crate::request::{EnrichmentField, LookupRequest};

const API_KEY_HEADER: &str = "apikey";
const MAX_ERROR_BODY: usize = 200;

/// Upstream path serving one enrichment field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumEndpoint(EnrichmentField);

impl PremiumEndpoint {
    pub const fn for_field(field: EnrichmentField) -> Self {
        Self(field)
    }

    pub const fn path(self) -> &'static str {
        match self.0 {
            EnrichmentField::TaxData => "/assessment",
            EnrichmentField::TitleData => "/title",
            EnrichmentField::Foreclosure => "/foreclosure",
            EnrichmentField::SalesHistory => "/sale/history",
            EnrichmentField::Valuation => "/valuation",
        }
    }
}

/// Metered premium provider reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPremiumProvider {
    base_url: String,
    auth: HttpAuth,
    timeout: Duration,
    http_client: Arc<dyn HttpClient>,
}

impl HttpPremiumProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self::with_http_client(base_url, api_key, timeout, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        let auth = api_key
            .filter(|key| !key.trim().is_empty())
            .map_or(HttpAuth::None, |key| {
                HttpAuth::api_key_header(API_KEY_HEADER, key)
            });
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth,
            timeout,
            http_client,
        }
    }

    fn build_request(&self, field: EnrichmentField, request: &LookupRequest) -> HttpRequest {
        let endpoint = PremiumEndpoint::for_field(field);
        HttpRequest::get(format!("{}{}", self.base_url, endpoint.path()))
            .with_query("postalcode", request.target_key.as_str())
            .with_auth(&self.auth)
            .with_timeout(self.timeout)
    }
}

fn map_transport_error(error: HttpError) -> ProviderError {
    if error.timed_out() {
        ProviderError::timeout(error.message())
    } else {
        ProviderError::transport(error.message())
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

fn decode(field: EnrichmentField, body: &str) -> Result<PremiumDocument, ProviderError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::decode(format!("{field} response is not JSON: {e}")))?;
    // Some endpoints wrap the document in a `data` envelope.
    let document = match value {
        Value::Object(mut object) if object.get("data").is_some_and(Value::is_object) => {
            object.remove("data").unwrap_or_default()
        }
        other => other,
    };
    PremiumDocument::from_json(field, document)
        .map_err(|e| ProviderError::decode(format!("{field} response has unexpected shape: {e}")))
}

impl PremiumProvider for HttpPremiumProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    fn fetch<'a>(
        &'a self,
        field: EnrichmentField,
        request: &'a LookupRequest,
    ) -> ProviderFuture<'a, Option<PremiumDocument>> {
        Box::pin(async move {
            let http_request = self.build_request(field, request);
            debug!(field = %field, url = %http_request.url, "premium request");

            let response = self
                .http_client
                .execute(http_request)
                .await
                .map_err(map_transport_error)?;

            if response.status == 404 {
                return Ok(None);
            }
            if !response.is_success() {
                return Err(ProviderError::status(
                    response.status,
                    truncate(&response.body),
                ));
            }

            decode(field, &response.body).map(Some)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::http_client::HttpResponse;

    #[derive(Debug)]
    struct ScriptedHttpClient {
        reply: Result<HttpResponse, HttpError>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn new(reply: Result<HttpResponse, HttpError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.seen.lock().expect("lock").push(request);
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }
    }

    fn provider(client: Arc<ScriptedHttpClient>) -> HttpPremiumProvider {
        HttpPremiumProvider::with_http_client(
            "https://premium.test/v1/",
            Some(String::from("k-123")),
            Duration::from_secs(5),
            client,
        )
    }

    #[tokio::test]
    async fn sends_key_header_to_field_endpoint() {
        let client = ScriptedHttpClient::new(Ok(HttpResponse::ok_json(
            r#"{"assessed_value":720000,"tax_amount":7200,"tax_year":2024}"#,
        )));
        let provider = provider(client.clone());

        let document = provider
            .fetch(EnrichmentField::TaxData, &LookupRequest::new("90210"))
            .await
            .expect("success")
            .expect("document");

        let PremiumDocument::Tax(tax) = document else {
            panic!("expected tax document");
        };
        assert_eq!(tax.tax_year, Some(2024));

        let seen = client.seen.lock().expect("lock");
        assert_eq!(
            seen[0].full_url(),
            "https://premium.test/v1/assessment?postalcode=90210"
        );
        assert_eq!(seen[0].headers.get("apikey").map(String::as_str), Some("k-123"));
        assert_eq!(seen[0].timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unwraps_data_envelope() {
        let client = ScriptedHttpClient::new(Ok(HttpResponse::ok_json(
            r#"{"data":{"estimated_value":750000,"confidence_score":0.92}}"#,
        )));
        let document = provider(client)
            .fetch(EnrichmentField::Valuation, &LookupRequest::new("90210"))
            .await
            .expect("success");

        assert!(matches!(document, Some(PremiumDocument::Valuation(_))));
    }

    #[tokio::test]
    async fn not_found_means_not_returned() {
        let client = ScriptedHttpClient::new(Ok(HttpResponse::with_status(404, "")));
        let document = provider(client)
            .fetch(EnrichmentField::Foreclosure, &LookupRequest::new("90210"))
            .await
            .expect("404 is not a failure");

        assert!(document.is_none());
    }

    #[tokio::test]
    async fn server_errors_map_to_status_failures() {
        let client = ScriptedHttpClient::new(Ok(HttpResponse::with_status(503, "maintenance")));
        let error = provider(client)
            .fetch(EnrichmentField::TitleData, &LookupRequest::new("90210"))
            .await
            .expect_err("503 fails");

        assert_eq!(error.kind(), ProviderErrorKind::Status);
        assert!(error.retryable());
        assert!(error.message().contains("maintenance"));
    }

    #[tokio::test]
    async fn transport_timeouts_are_timeouts() {
        let client = ScriptedHttpClient::new(Err(HttpError::timeout("request timeout")));
        let error = provider(client)
            .fetch(EnrichmentField::SalesHistory, &LookupRequest::new("90210"))
            .await
            .expect_err("timeout fails");

        assert_eq!(error.kind(), ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_failure() {
        let client = ScriptedHttpClient::new(Ok(HttpResponse::ok_json("<html>")));
        let error = provider(client)
            .fetch(EnrichmentField::TaxData, &LookupRequest::new("90210"))
            .await
            .expect_err("decode fails");

        assert_eq!(error.kind(), ProviderErrorKind::Decode);
    }

    #[test]
    fn blank_key_sends_no_credential() {
        let client = ScriptedHttpClient::new(Ok(HttpResponse::ok_json("{}")));
        let provider = HttpPremiumProvider::with_http_client(
            "https://premium.test",
            Some(String::from("  ")),
            Duration::from_secs(5),
            client,
        );
        let request = provider.build_request(EnrichmentField::TaxData, &LookupRequest::new("90210"));
        assert!(request.headers.is_empty());
    }
}
