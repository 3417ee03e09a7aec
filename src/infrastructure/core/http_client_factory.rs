use reqwest::Client;
use std::time::Duration;

/// Connect timeout applied to every upstream client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Plain client with pooled connections and a request timeout. Failed
    /// requests surface to the caller as-is; nothing here retries.
    pub fn create_client(timeout: Duration) -> Client {
        Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_short_timeout() {
        // must not panic even when the timeout is below the connect default
        let _client = HttpClientFactory::create_client(Duration::from_secs(1));
    }
}
