//! Shared HTTP client used by every provider and vector-store call.
//!
//! A single `reqwest::Client` is reused across the process so connection
//! pooling actually applies; components never build their own client.

use once_cell::sync::Lazy;
use std::time::Duration;

/// Global HTTP client instance shared across the application.
pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build the shared HTTP client")
});
