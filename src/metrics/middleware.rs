use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::prometheus::{ACTIVE_REQUESTS, LATENCY, REQUESTS_TOTAL};

/// Holds one slot of `a2v_active_requests`. Released on drop, so a client
/// that hangs up mid-request does not leave the gauge raised.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        ACTIVE_REQUESTS.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        ACTIVE_REQUESTS.dec();
    }
}

pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let in_flight = InFlight::enter();

    let response = next.run(req).await;

    drop(in_flight);
    REQUESTS_TOTAL.inc();
    // Measures time to response headers; streamed video bodies finish later.
    LATENCY.observe(start.elapsed().as_secs_f64());

    response
}
