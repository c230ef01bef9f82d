use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("x402-tools/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client for one paid-agent call.
///
/// Every invocation gets its own client so concurrent calls share no
/// connection state. The timeout applies to each request separately, so the
/// paid retry gets its own budget.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .build()
}
