use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hybridgate_core::{
    BaselineProvider, EnrichmentField, FusedRecord, HttpClient, HttpError, HttpPremiumProvider,
    HttpRequest, HttpResponse, LookupRequest, MockBaselineProvider, PremiumProvider,
    ProviderErrorKind, SimulatedPremiumProvider,
};

/// Replays canned HTTP answers and records the requests it saw.
#[derive(Debug, Default)]
struct ReplayHttpClient {
    answers: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ReplayHttpClient {
    fn answering(answers: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<HttpRequest> {
        self.seen.lock().expect("lock").clone()
    }
}

impl HttpClient for ReplayHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.seen.lock().expect("lock").push(request);
        let answer = self
            .answers
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("no scripted answer")));
        Box::pin(async move { answer })
    }
}

/// Wire body for `field`, shaped like the simulated provider's document.
fn wire_body(field: EnrichmentField) -> String {
    let mut record = FusedRecord::baseline("90210", Default::default());
    record.overlay(SimulatedPremiumProvider::document(field));
    let value = serde_json::to_value(&record).expect("serializes");
    value[field.as_str()].to_string()
}

fn premium_cases() -> Vec<(&'static str, Arc<dyn PremiumProvider>)> {
    let answers = EnrichmentField::ALL
        .into_iter()
        .map(|field| Ok(HttpResponse::ok_json(wire_body(field))))
        .collect::<Vec<_>>();
    let http: Arc<dyn PremiumProvider> = Arc::new(HttpPremiumProvider::with_http_client(
        "https://premium.test/v1/",
        Some(String::from("k-test")),
        Duration::from_secs(5),
        ReplayHttpClient::answering(answers),
    ));

    vec![
        ("simulated", Arc::new(SimulatedPremiumProvider::new())),
        ("http", http),
    ]
}

#[tokio::test]
async fn every_premium_provider_answers_each_field_with_its_own_document() {
    let request = LookupRequest::new("90210");

    for (name, provider) in premium_cases() {
        for field in EnrichmentField::ALL {
            let document = provider
                .fetch(field, &request)
                .await
                .unwrap_or_else(|error| panic!("{name} failed on {field}: {error}"))
                .unwrap_or_else(|| panic!("{name} returned nothing for {field}"));
            assert_eq!(document.field(), field, "{name} mismatched {field}");
        }
    }
}

#[tokio::test]
async fn http_provider_sends_key_header_and_encoded_target() {
    let client = ReplayHttpClient::answering([Ok(HttpResponse::ok_json(wire_body(
        EnrichmentField::Valuation,
    )))]);
    let provider = HttpPremiumProvider::with_http_client(
        "https://premium.test/v1",
        Some(String::from("k-test")),
        Duration::from_secs(5),
        client.clone(),
    );

    provider
        .fetch(EnrichmentField::Valuation, &LookupRequest::new("90210"))
        .await
        .expect("call succeeds");

    let seen = client.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].full_url(), "https://premium.test/v1/valuation?postalcode=90210");
    assert_eq!(seen[0].headers.get("apikey").map(String::as_str), Some("k-test"));
    assert_eq!(seen[0].timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn http_provider_maps_not_found_to_absent_document() {
    let client = ReplayHttpClient::answering([Ok(HttpResponse::with_status(404, "{}"))]);
    let provider = HttpPremiumProvider::with_http_client(
        "https://premium.test",
        None,
        Duration::from_secs(5),
        client,
    );

    let document = provider
        .fetch(EnrichmentField::TitleData, &LookupRequest::new("90210"))
        .await
        .expect("a 404 is not a failure");
    assert!(document.is_none());
}

#[tokio::test]
async fn http_provider_classifies_failures() {
    let client = ReplayHttpClient::answering([
        Ok(HttpResponse::with_status(401, "bad key")),
        Err(HttpError::timeout("deadline exceeded")),
        Err(HttpError::new("connection refused")),
        Ok(HttpResponse::ok_json("not json")),
    ]);
    let provider = HttpPremiumProvider::with_http_client(
        "https://premium.test",
        Some(String::from("k-test")),
        Duration::from_secs(5),
        client,
    );
    let request = LookupRequest::new("90210");

    let mut kinds = Vec::new();
    for _ in 0..4 {
        let error = provider
            .fetch(EnrichmentField::TaxData, &request)
            .await
            .expect_err("scripted failure");
        kinds.push(error.kind());
    }

    assert_eq!(
        kinds,
        vec![
            ProviderErrorKind::Status,
            ProviderErrorKind::Timeout,
            ProviderErrorKind::Transport,
            ProviderErrorKind::Decode,
        ]
    );
}

#[tokio::test]
async fn baseline_provider_is_deterministic_and_respects_filters() {
    let provider = MockBaselineProvider::new();
    let request = LookupRequest::new("90210").with_filters(2_000_000.0, Some(3_000_000.0));

    let first = provider.fetch(&request).await.expect("baseline never fails");
    let second = provider.fetch(&request).await.expect("baseline never fails");

    assert_eq!(first, second);
    assert_eq!(first.zip_code.as_deref(), Some("90210"));
    let price = first.price.expect("price present");
    assert!((2_000_000.0..=3_000_000.0).contains(&price));
}
