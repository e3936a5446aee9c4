use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total API requests. Labels: route, status.
pub const REQUESTS_TOTAL: &str = "slotbook_requests_total";

/// Histogram: request latency in seconds. Labels: route.
pub const REQUEST_DURATION_SECONDS: &str = "slotbook_request_duration_seconds";

// ── Domain counters ─────────────────────────────────────────────

/// Counter: bookings created (pending).
pub const BOOKINGS_CREATED_TOTAL: &str = "slotbook_bookings_created_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "slotbook_bookings_cancelled_total";

/// Counter: create attempts that lost the slot to an existing booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "slotbook_booking_conflicts_total";

// ── Rate limiter ────────────────────────────────────────────────

/// Counter: requests rejected with 429. Labels: class.
pub const RATE_LIMITED_TOTAL: &str = "slotbook_rate_limited_total";

/// Counter: requests passed uncounted because the counter lock could not be
/// acquired within the retry budget (fail-open policy).
pub const RATE_LIMITER_FAILOPEN_TOTAL: &str = "slotbook_rate_limiter_failopen_total";

/// Gauge: live rate-limit counter entries.
pub const RATE_COUNTERS_ACTIVE: &str = "slotbook_rate_counters_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
