use prometheus::{
    exponential_buckets, histogram_opts, register_counter, register_histogram,
    register_int_counter_vec, register_int_gauge, Counter, Histogram, IntCounterVec, IntGauge,
};

pub static REQUESTS_TOTAL: once_cell::sync::Lazy<Counter> = once_cell::sync::Lazy::new(|| {
    register_counter!("a2v_requests_total", "Total number of HTTP requests").unwrap()
});

pub static ACTIVE_REQUESTS: once_cell::sync::Lazy<IntGauge> = once_cell::sync::Lazy::new(|| {
    register_int_gauge!("a2v_active_requests", "Current active requests").unwrap()
});

pub static LATENCY: once_cell::sync::Lazy<Histogram> = once_cell::sync::Lazy::new(|| {
    let opts = histogram_opts!(
        "a2v_latency_seconds",
        "End-to-end latency in seconds",
        exponential_buckets(0.01, 2.0, 15).unwrap()
    );
    register_histogram!(opts).unwrap()
});

/// Labelled by `outcome`: `ok` or the error type.
pub static CONVERSIONS_TOTAL: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "a2v_conversions_total",
            "Conversions by outcome",
            &["outcome"]
        )
        .unwrap()
    });

pub static ENCODE_SECONDS: once_cell::sync::Lazy<Histogram> = once_cell::sync::Lazy::new(|| {
    let opts = histogram_opts!(
        "a2v_encode_seconds",
        "Wall time spent in the encoder",
        exponential_buckets(0.1, 2.0, 14).unwrap()
    );
    register_histogram!(opts).unwrap()
});

pub static ACTIVE_ENCODES: once_cell::sync::Lazy<IntGauge> = once_cell::sync::Lazy::new(|| {
    register_int_gauge!("a2v_active_encodes", "Encodes currently running").unwrap()
});

pub static UPLOAD_BYTES_TOTAL: once_cell::sync::Lazy<Counter> = once_cell::sync::Lazy::new(|| {
    register_counter!("a2v_upload_bytes_total", "Audio bytes received").unwrap()
});

pub static JOBS_STORED: once_cell::sync::Lazy<IntGauge> = once_cell::sync::Lazy::new(|| {
    register_int_gauge!("a2v_jobs_stored", "Jobs currently held in memory").unwrap()
});
