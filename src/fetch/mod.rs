//! Remote acquisition of station tables.
//!
//! All requests are blocking; a station's run waits for each response in
//! turn and a failed request is reported, never retried.

mod basic;
mod client;
pub mod erddap;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use erddap::{DEFAULT_BASE_URL, ErddapClient};

use std::time::Instant;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Requests `url` through `client`, logging size and latency.
#[tracing::instrument(skip(client))]
pub fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<String, TransportError> {
    let start = Instant::now();
    let body = client.get_text(url)?;

    let elapsed = start.elapsed();
    if elapsed.as_secs() > 15 {
        warn!(elapsed_secs = elapsed.as_secs(), "Tabular query was slow");
    }
    debug!(bytes = body.len(), elapsed_ms = elapsed.as_millis() as u64, "Response received");
    Ok(body)
}
