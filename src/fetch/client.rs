use crate::error::TransportError;

/// Blocking transport used by the fetcher.
///
/// [`BasicClient`](super::BasicClient) issues real requests; tests swap in
/// in-memory implementations.
pub trait HttpClient {
    fn get_text(&self, url: &str) -> Result<String, TransportError>;
}
