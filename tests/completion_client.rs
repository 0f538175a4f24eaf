use neural_terminal::resilience::{CircuitBreaker, CircuitBreakerConfig, RateLimitConfig};
use neural_terminal::source::{Script, ScriptStep, ScriptedSource};
use neural_terminal::tokens::{BudgetStatus, CostTracker, ModelPricing};
use neural_terminal::{
    BridgeConfig, CircuitState, CompletionClient, CompletionCollector, CompletionRequest, Error,
    ErrorCode, Message, StreamChunk, UpstreamError,
};
use std::sync::Arc;
use std::time::Duration;

const MODEL: &str = "test-model";

fn request() -> CompletionRequest {
    CompletionRequest::new(MODEL, vec![Message::user("hello")])
}

fn client_with(source: ScriptedSource, threshold: u32) -> CompletionClient {
    CompletionClient::builder()
        .rate_limit(RateLimitConfig::new(600, 50).unwrap())
        .circuit_breaker(
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_recovery_timeout(Duration::from_secs(60)),
        )
        .bridge(BridgeConfig::default().with_chunk_timeout(Duration::from_secs(5)))
        .build(Arc::new(source))
        .unwrap()
}

#[test]
fn test_stream_success_records_success() {
    let source = ScriptedSource::new()
        .with_chunk_delay(Duration::from_millis(2))
        .with_fallback(Script::reply(MODEL, &["Hello", ", ", "world"]));
    let client = client_with(source, 2);
    client.breaker().record_failure();
    assert_eq!(client.breaker().failure_count(), 1);

    let stream = client.stream_chat(request()).unwrap();
    let mut deltas = Vec::new();
    let mut collector = CompletionCollector::new();
    let meta = collector
        .drive(stream, |d| deltas.push(d.to_string()), |_| {})
        .unwrap()
        .unwrap();

    assert_eq!(collector.content(), "Hello, world");
    assert_eq!(deltas.len(), 3);
    assert_eq!(meta.model, MODEL);
    assert_eq!(meta.finish_reason.as_deref(), Some("stop"));
    assert_eq!(client.breaker().failure_count(), 0);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
}

#[test]
fn test_mid_stream_failure_keeps_partial_and_opens_breaker() {
    let source = ScriptedSource::new().with_fallback(Script::fail_after(
        &["partial ", "answer"],
        UpstreamError::Api {
            status: 502,
            message: "bad gateway".into(),
            body: None,
        },
    ));
    let client = client_with(source, 2);

    for _ in 0..2 {
        let stream = client.stream_chat(request()).unwrap();
        let mut collector = CompletionCollector::new();
        let err = collector.drive(stream, |_| {}, |_| {}).unwrap_err();
        assert_eq!(collector.content(), "partial answer");
        assert_eq!(err.code(), ErrorCode::ApiError);
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    match client.stream_chat(request()) {
        Err(Error::CircuitBreakerOpen { remaining }) => assert!(remaining > Duration::ZERO),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("open breaker admitted a stream"),
    }
}

#[test]
fn test_open_failure_surfaces_on_first_chunk() {
    let source = ScriptedSource::new();
    source.push(Script::RejectOpen(UpstreamError::TokenLimit {
        max_tokens: Some(8192),
        actual_tokens: Some(9100),
    }));
    let client = client_with(source, 5);

    let mut stream = client.stream_chat(request()).unwrap();
    let err = stream.next_chunk().unwrap_err();
    assert!(matches!(err, Error::Upstream(UpstreamError::TokenLimit { .. })));
    assert!(stream.is_finished());
    assert!(stream.next_chunk().unwrap().is_none());
    // Reported once even though the stream was polled again.
    assert_eq!(client.breaker().failure_count(), 1);
}

#[test]
fn test_cancellation_is_not_a_failure() {
    let source = ScriptedSource::new()
        .with_chunk_delay(Duration::from_millis(5))
        .with_fallback(Script::reply(MODEL, &["a"; 200]));
    let client = client_with(source, 1);

    let mut stream = client.stream_chat(request()).unwrap();
    assert!(stream.next_chunk().unwrap().is_some());
    stream.stop();

    let err = loop {
        match stream.next_chunk() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("stopped stream reported completion"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(client.breaker().failure_count(), 0);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
}

#[test]
fn test_stalled_stream_times_out_and_counts() {
    let source = ScriptedSource::new();
    source.push(Script::Stream(vec![
        ScriptStep::Chunk(StreamChunk::delta("thinking")),
        ScriptStep::Stall,
    ]));
    let client = CompletionClient::builder()
        .bridge(BridgeConfig::default().with_chunk_timeout(Duration::from_millis(100)))
        .circuit_breaker(CircuitBreakerConfig::new().with_failure_threshold(1))
        .build(Arc::new(source))
        .unwrap();

    let mut stream = client.stream_chat(request()).unwrap();
    assert_eq!(
        stream.next_chunk().unwrap().and_then(|c| c.as_delta().map(str::to_string)),
        Some("thinking".to_string())
    );
    assert!(matches!(stream.next_chunk(), Err(Error::StreamTimeout { .. })));
    assert_eq!(client.breaker().state(), CircuitState::Open);
}

#[test]
fn test_rate_limit_rejects_before_upstream() {
    let source = Arc::new(ScriptedSource::new().with_fallback(Script::reply(MODEL, &["ok"])));
    let client = CompletionClient::builder()
        .rate_limit(RateLimitConfig::new(1, 2).unwrap())
        .build(Arc::clone(&source) as Arc<dyn neural_terminal::CompletionSource>)
        .unwrap();

    assert_eq!(client.complete(&request()).unwrap().content, "ok");
    assert_eq!(client.complete(&request()).unwrap().content, "ok");
    let err = client.complete(&request()).unwrap_err();
    assert!(matches!(err, Error::RateLimitExceeded { .. }));
    assert!(err.retry_after().is_some());
    assert_eq!(source.requests().len(), 2);

    let signals = client.signals();
    assert_eq!(signals.rate_limiter.burst, 2);
    assert!(signals.rate_limiter.estimated_wait.is_some());
    assert!(signals.cost.is_none());
}

#[test]
fn test_complete_records_failures_through_breaker() {
    let source = ScriptedSource::new().with_fallback(Script::RejectOpen(
        UpstreamError::ModelUnavailable {
            model_id: Some(MODEL.into()),
        },
    ));
    let client = client_with(source, 2);

    for _ in 0..2 {
        let err = client.complete(&request()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModelUnavailable);
    }
    assert!(matches!(
        client.complete(&request()),
        Err(Error::CircuitBreakerOpen { .. })
    ));
}

#[tokio::test]
async fn test_complete_works_inside_runtime() {
    let source = ScriptedSource::new().with_fallback(Script::reply(MODEL, &["in", "side"]));
    let client = client_with(source, 2);
    let completion = client.complete(&request()).unwrap();
    assert_eq!(completion.content, "inside");
}

#[test]
fn test_shared_breaker_across_clients() {
    let breaker = Arc::new(
        CircuitBreaker::new(CircuitBreakerConfig::new().with_failure_threshold(1)).unwrap(),
    );
    let failing = CompletionClient::builder()
        .shared_circuit_breaker(Arc::clone(&breaker))
        .build(Arc::new(ScriptedSource::new().with_fallback(Script::RejectOpen(
            UpstreamError::RateLimited { retry_after: None },
        ))))
        .unwrap();
    let healthy = CompletionClient::builder()
        .shared_circuit_breaker(Arc::clone(&breaker))
        .build(Arc::new(
            ScriptedSource::new().with_fallback(Script::reply(MODEL, &["hi"])),
        ))
        .unwrap();

    assert!(failing.complete(&request()).is_err());
    assert!(matches!(
        healthy.stream_chat(request()),
        Err(Error::CircuitBreakerOpen { .. })
    ));
    assert_eq!(healthy.signals().circuit_breaker.state, CircuitState::Open);
}

#[test]
fn test_usage_feeds_cost_tracker() {
    let tracker = Arc::new(CostTracker::new(
        Some(ModelPricing::new(MODEL, 1.0, 1.0)),
        Some(0.02),
    ));
    let source = ScriptedSource::new().with_fallback(Script::reply(MODEL, &["a", "b"]));
    let client = CompletionClient::builder()
        .cost_tracker(Arc::clone(&tracker))
        .build(Arc::new(source))
        .unwrap();

    // Scripted usage: 10 prompt tokens + one completion token per delta.
    let stream = client.stream_chat(request()).unwrap();
    for chunk in stream {
        chunk.unwrap();
    }
    assert!((tracker.accumulated() - 0.012).abs() < 1e-9);

    client.complete(&request()).unwrap();
    let cost = client.signals().cost.unwrap();
    assert!((cost.accumulated - 0.024).abs() < 1e-9);
    assert_eq!(cost.status, BudgetStatus::Exceeded);
}

#[test]
fn test_stream_projects_budget_while_streaming() {
    let tracker = Arc::new(CostTracker::new(
        Some(ModelPricing::new(MODEL, 1.0, 1.0)),
        Some(0.105),
    ));
    let source = ScriptedSource::new().with_fallback(Script::reply(MODEL, &["t"; 100]));
    let client = CompletionClient::builder()
        .cost_tracker(Arc::clone(&tracker))
        .build(Arc::new(source))
        .unwrap();

    let mut stream = client.stream_chat(request()).unwrap();
    for _ in 0..99 {
        assert!(stream.next_chunk().unwrap().is_some());
    }
    assert_eq!(stream.budget_status(), None);

    // 100 streamed tokens project to 0.1, past 80 % of the budget.
    assert!(stream.next_chunk().unwrap().is_some());
    assert_eq!(stream.budget_status(), Some(BudgetStatus::ApproachingLimit));
    assert_eq!(tracker.accumulated(), 0.0);

    // Billed usage is 110 tokens.
    assert!(matches!(
        stream.next_chunk().unwrap(),
        Some(StreamChunk::Metadata(_))
    ));
    assert_eq!(stream.budget_status(), Some(BudgetStatus::Exceeded));
    assert!(stream.next_chunk().unwrap().is_none());
}

#[test]
fn test_invalid_bridge_config_fails_build() {
    let result = CompletionClient::builder()
        .bridge(BridgeConfig::default().with_queue_capacity(0))
        .build(Arc::new(ScriptedSource::new()));
    assert!(matches!(result, Err(Error::Configuration { .. })));
}
