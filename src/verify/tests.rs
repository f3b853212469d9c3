use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::governor::Cost;
use crate::render::PageImage;

fn pages(n: u32) -> Arc<Vec<PageImage>> {
    Arc::new((1..=n).map(|p| PageImage::new(p, vec![1, 2, 3])).collect())
}

fn context() -> VerificationContext {
    VerificationContext {
        left_id: "R-001".to_string(),
        right_id: "REF-17".to_string(),
        similarity: Some(0.82),
    }
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_millis(1))
        .with_jitter(false)
}

const USAGE: Usage = Usage {
    input_units: 1_000,
    output_units: 200,
};

#[test]
fn test_parse_well_formed_match() {
    let reply = parse_reply("VERDICT: MATCH\nCONFIDENCE: 92\nREASONING: Same letterhead and signature.");
    assert_eq!(reply.verdict, Verdict::Match);
    assert_eq!(reply.confidence, 92);
    assert_eq!(reply.reasoning, "Same letterhead and signature.");
    assert!(!reply.needs_review);
}

#[test]
fn test_parse_no_match_is_not_read_as_match() {
    let reply = parse_reply("**Verdict:** NO MATCH\nConfidence: 88%\nReasoning: different dates");
    assert_eq!(reply.verdict, Verdict::NoMatch);
    assert_eq!(reply.confidence, 88);
    assert!(!reply.needs_review);
}

#[test]
fn test_parse_negated_match_is_no_match() {
    for text in [
        "VERDICT: NOT A MATCH\nCONFIDENCE: 85\nREASONING: different letterheads",
        "Verdict: Not a match\nConfidence: 85\nReasoning: different letterheads",
        "VERDICT: NON-MATCH\nCONFIDENCE: 85\nREASONING: different letterheads",
    ] {
        let reply = parse_reply(text);
        assert_eq!(reply.verdict, Verdict::NoMatch, "{text}");
        assert_eq!(reply.confidence, 85);
    }
}

#[test]
fn test_parse_verdict_line_wins_over_reasoning_text() {
    let reply = parse_reply(
        "VERDICT: MATCH\nCONFIDENCE: 75\nREASONING: not a perfect match, there is no match on page 3 header",
    );
    assert_eq!(reply.verdict, Verdict::Match);
}

#[test]
fn test_parse_without_labels() {
    let reply = parse_reply("I believe this is a MATCH. Confidence 80.");
    assert_eq!(reply.verdict, Verdict::Match);
    assert_eq!(reply.confidence, 80);
    assert_eq!(reply.reasoning, "I believe this is a MATCH. Confidence 80.");
}

#[test]
fn test_parse_missing_verdict_falls_back() {
    let reply = parse_reply("CONFIDENCE: 90\nREASONING: unsure");
    assert_eq!(reply.verdict, Verdict::NoMatch);
    assert_eq!(reply.confidence, 50);
    assert!(reply.needs_review);
}

#[test]
fn test_parse_out_of_range_confidence_falls_back() {
    let reply = parse_reply("VERDICT: MATCH\nCONFIDENCE: 150");
    assert_eq!(reply.verdict, Verdict::NoMatch);
    assert_eq!(reply.confidence, 50);
    assert!(reply.needs_review);
}

#[test]
fn test_parse_garbage_falls_back() {
    let reply = parse_reply("");
    assert_eq!(reply.verdict, Verdict::NoMatch);
    assert_eq!(reply.confidence, 50);
    assert!(reply.needs_review);
}

#[test]
fn test_pricing() {
    let pricing = Pricing {
        input_per_million: 3.0,
        output_per_million: 15.0,
        exchange_rate: 0.5,
    };
    // (1000 * 3 + 200 * 15) / 1e6 * 0.5 = 0.003
    assert_eq!(pricing.cost(&USAGE), Cost::from_micros(3_000));
    assert_eq!(pricing.cost(&Usage::default()), Cost::ZERO);
}

#[test]
fn test_retry_delay_grows_and_caps() {
    let retry = RetryConfig {
        max_retries: 5,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(300),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    assert_eq!(retry.delay_for(0), Duration::ZERO);
    assert_eq!(retry.delay_for(1), Duration::from_millis(100));
    assert_eq!(retry.delay_for(2), Duration::from_millis(200));
    assert_eq!(retry.delay_for(3), Duration::from_millis(300));
    assert_eq!(retry.delay_for(9), Duration::from_millis(300));
}

#[test]
fn test_retry_jitter_stays_in_band() {
    let retry = RetryConfig::default()
        .with_base_delay(Duration::from_millis(400))
        .with_jitter(true);
    for _ in 0..100 {
        let d = retry.delay_for(1);
        assert!(d >= Duration::from_millis(300) && d <= Duration::from_millis(500));
    }
}

#[test]
fn test_error_classification() {
    assert!(VerifyError::RateLimited { retry_after: None }.is_retryable());
    assert!(
        VerifyError::Service {
            status: 502,
            body: String::new()
        }
        .is_retryable()
    );
    assert!(
        VerifyError::Transport {
            reason: "reset".into()
        }
        .is_retryable()
    );
    assert!(
        !VerifyError::Rejected {
            status: 400,
            body: String::new()
        }
        .is_retryable()
    );
    assert!(
        VerifyError::Decode {
            reason: "bad json".into()
        }
        .is_retryable()
    );
}

#[tokio::test]
async fn test_client_parses_and_prices() {
    let backend = Arc::new(MockVerificationBackend::replying(
        "VERDICT: MATCH\nCONFIDENCE: 95\nREASONING: identical",
        USAGE,
    ));
    let client = VerificationClient::new(backend.clone(), Pricing::default(), fast_retry(3));

    let outcome = client.verify(pages(2), pages(3), &context()).await;

    assert_eq!(outcome.verdict, Verdict::Match);
    assert_eq!(outcome.confidence, 95);
    assert_eq!(outcome.cost, Pricing::default().cost(&USAGE));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(backend.calls(), 1);
    assert!(backend.contexts()[0].contains("R-001"));
    assert!(backend.contexts()[0].contains("REF-17"));
}

#[tokio::test]
async fn test_client_retries_transient_failures() {
    let backend = Arc::new(
        MockVerificationBackend::replying("VERDICT: NO MATCH\nCONFIDENCE: 70\nREASONING: x", USAGE)
            .push(Err(VerifyError::Transport {
                reason: "connection reset".into(),
            }))
            .push(Err(VerifyError::RateLimited { retry_after: None })),
    );
    let client = VerificationClient::new(backend.clone(), Pricing::default(), fast_retry(3));

    let outcome = client.verify(pages(1), pages(1), &context()).await;

    assert_eq!(outcome.verdict, Verdict::NoMatch);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_client_retries_undecodable_response() {
    let backend = Arc::new(
        MockVerificationBackend::replying("VERDICT: MATCH\nCONFIDENCE: 90\nREASONING: x", USAGE)
            .push(Err(VerifyError::Decode {
                reason: "expected value at line 1".into(),
            })),
    );
    let client = VerificationClient::new(backend.clone(), Pricing::default(), fast_retry(3));

    let outcome = client.verify(pages(1), pages(1), &context()).await;

    assert_eq!(outcome.verdict, Verdict::Match);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_client_gives_up_after_max_retries() {
    let backend = Arc::new(MockVerificationBackend::failing());
    let client = VerificationClient::new(backend.clone(), Pricing::default(), fast_retry(2));

    let outcome = client.verify(pages(1), pages(1), &context()).await;

    assert_eq!(outcome.verdict, Verdict::Error);
    assert_eq!(outcome.confidence, 0);
    assert_eq!(outcome.cost, Cost::ZERO);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_client_does_not_retry_rejections() {
    let backend = Arc::new(MockVerificationBackend::with_responder(|_| {
        Err(VerifyError::Rejected {
            status: 413,
            body: "too large".into(),
        })
    }));
    let client = VerificationClient::new(backend.clone(), Pricing::default(), fast_retry(3));

    let outcome = client.verify(pages(1), pages(1), &context()).await;

    assert_eq!(outcome.verdict, Verdict::Error);
    assert!(outcome.reasoning.contains("413"));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_unparseable_reply_is_billed_and_flagged() {
    let backend = Arc::new(MockVerificationBackend::replying("hmm", USAGE));
    let client = VerificationClient::new(backend, Pricing::default(), fast_retry(0));

    let outcome = client.verify(pages(1), pages(1), &context()).await;

    assert_eq!(outcome.verdict, Verdict::NoMatch);
    assert_eq!(outcome.confidence, 50);
    assert!(outcome.needs_review);
    assert!(!outcome.cost.is_zero());
}

#[test]
fn test_http_backend_requires_key() {
    assert!(matches!(
        HttpVerificationBackend::new(HttpBackendConfig::default()),
        Err(VerifyError::Config { .. })
    ));
}

#[test]
fn test_http_body_orders_images_left_then_right() {
    let backend = HttpVerificationBackend::new(HttpBackendConfig {
        api_key: "test-key".to_string(),
        ..HttpBackendConfig::default()
    })
    .unwrap();
    let request = ServiceRequest {
        instruction: Arc::from("compare"),
        context: context().describe(),
        left: pages(2),
        right: pages(1),
    };

    let body = backend.body(&request);
    let content = body["messages"][0]["content"].as_array().unwrap();

    assert_eq!(content.len(), 5);
    assert_eq!(content[0]["text"], "compare");
    assert_eq!(content[2]["type"], "image");
    assert_eq!(content[2]["source"]["media_type"], "image/png");
    assert_eq!(content[2]["source"]["data"], "AQID");
}

fn png(width: u32, height: u32) -> PageImage {
    let mut bytes = PageImage::PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 2, 0, 0, 0]);
    PageImage::new(1, bytes)
}

#[test]
fn test_usage_bound_counts_text_pixels_and_output_cap() {
    let request = ServiceRequest {
        instruction: Arc::from("compare"),
        context: "ctx".to_string(),
        left: Arc::new(vec![png(1_500, 1_000)]),
        right: pages(1),
    };

    let bound = request.usage_bound(512);

    // 10 text bytes + 1_500_000 / 750 pixels + 3 bytes of an unparseable image.
    assert_eq!(bound.input_units, 10 + 2_000 + 3);
    assert_eq!(bound.output_units, 512);
    assert_eq!(png(1_500, 1_000).dimensions(), Some((1_500, 1_000)));
    assert_eq!(PageImage::new(1, vec![1, 2, 3]).dimensions(), None);
}

#[test]
fn test_http_backend_bound_uses_configured_output_cap() {
    let backend = HttpVerificationBackend::new(HttpBackendConfig {
        api_key: "test-key".to_string(),
        max_output_units: 300,
        ..HttpBackendConfig::default()
    })
    .unwrap();
    let request = ServiceRequest {
        instruction: Arc::from("compare"),
        context: String::new(),
        left: pages(1),
        right: pages(1),
    };

    assert_eq!(backend.usage_bound(&request).output_units, 300);
}

#[tokio::test]
async fn test_cost_bound_covers_billed_cost() {
    let backend = Arc::new(MockVerificationBackend::replying(
        "VERDICT: MATCH\nCONFIDENCE: 95\nREASONING: identical",
        Usage {
            input_units: 4_000,
            output_units: 1_024,
        },
    ));
    let client = VerificationClient::new(backend, Pricing::default(), fast_retry(0));
    let request = client.request(
        Arc::new(vec![png(1_568, 1_568)]),
        Arc::new(vec![png(1_568, 1_568)]),
        &context(),
    );

    let bound = client.cost_bound(&request);
    let outcome = client.send(&request).await;

    assert!(outcome.cost <= bound);
}

#[test]
fn test_verdict_strings() {
    assert_eq!(Verdict::NoMatch.to_string(), "no_match");
    assert_eq!(
        serde_json::to_string(&Verdict::NoMatch).unwrap(),
        "\"no_match\""
    );
    assert!(Verdict::Match.is_final());
    assert!(!Verdict::Error.is_final());
    assert!(!Verdict::Pending.is_final());
}
