//! Shared HTTP Client Module
//!
//! Process-wide, lazily built HTTP clients so every request to the detection
//! service reuses pooled connections.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Client for processing and export requests
///
/// No request timeout: a processing job is one long-lived request and is
/// bounded only by the transport and the service. Connection setup is still
/// bounded.
pub static DETECTION_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create detection service HTTP client")
});

/// Client for quick health probes
pub static HEALTH_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(1)
        .build()
        .expect("Failed to create health check HTTP client")
});

/// Get the global detection service HTTP client
#[inline]
pub fn detection_client() -> &'static Client {
    &DETECTION_CLIENT
}

/// Get the global health check HTTP client
#[inline]
pub fn health_client() -> &'static Client {
    &HEALTH_CLIENT
}
