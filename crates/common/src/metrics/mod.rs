//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency-oriented histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all convorag metrics
pub const METRICS_PREFIX: &str = "convorag";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Buckets for upstream embedding / chat latency (typically slower)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.000,
    5.000,
    10.00,
    30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents indexed"
    );

    describe_counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks added to the vector index"
    );

    describe_gauge!(
        format!("{}_index_chunks", METRICS_PREFIX),
        Unit::Count,
        "Live chunks in the vector index"
    );

    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total similarity searches"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Similarity search latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat completion requests"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat completion latency in seconds"
    );

    describe_counter!(
        format!("{}_chat_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Answers produced, labelled by outcome"
    );

    describe_gauge!(
        format!("{}_active_sessions", METRICS_PREFIX),
        Unit::Count,
        "Sessions currently held in memory"
    );

    describe_counter!(
        format!("{}_sessions_expired_total", METRICS_PREFIX),
        Unit::Count,
        "Sessions removed by the expiry sweep"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(model: &str, batch_size: usize, elapsed: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    tracing::trace!(model, batch_size, success, "Embedding request recorded");
}

/// Helper to record chat completion metrics
pub fn record_llm(model: &str, elapsed: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(elapsed.as_secs_f64());
    }
}

/// Helper to record indexing metrics
pub fn record_indexing(documents: usize, chunks: usize, live_chunks: usize) {
    counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(documents as u64);
    counter!(format!("{}_chunks_indexed_total", METRICS_PREFIX)).increment(chunks as u64);
    gauge!(format!("{}_index_chunks", METRICS_PREFIX)).set(live_chunks as f64);
}

/// Helper to record the live index size after removals
pub fn record_index_size(live_chunks: usize) {
    gauge!(format!("{}_index_chunks", METRICS_PREFIX)).set(live_chunks as f64);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(elapsed: Duration, filtered: bool) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "filtered" => if filtered { "true" } else { "false" }
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX))
        .record(elapsed.as_secs_f64());
}

/// Helper to record the outcome of a chat answer
pub fn record_answer(outcome: &'static str) {
    counter!(
        format!("{}_chat_answers_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Helper to record session store size
pub fn record_sessions(active: usize, expired: usize) {
    gauge!(format!("{}_active_sessions", METRICS_PREFIX)).set(active as f64);
    if expired > 0 {
        counter!(format!("{}_sessions_expired_total", METRICS_PREFIX)).increment(expired as u64);
    }
}
