use log::debug;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Up,
    Status(u16),
    Unreachable(String)
}

/// Plain GET against a guest service URL.
pub trait ServiceProbe: Send + Sync {
    fn get(&self, url: &Url, timeout: Duration) -> ProbeOutcome;
}

#[derive(Default)]
pub struct HttpProbe {}

impl HttpProbe {
    pub fn new() -> Self {
        Self{}
    }
}

impl ServiceProbe for HttpProbe {
    #[tokio::main]
    async fn get(&self, url: &Url, timeout: Duration) -> ProbeOutcome {
        debug!("GET {} (timeout {:?})", url, timeout);
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::Unreachable(e.to_string())
        };
        match client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => ProbeOutcome::Up,
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(e) => ProbeOutcome::Unreachable(e.to_string())
        }
    }
}
