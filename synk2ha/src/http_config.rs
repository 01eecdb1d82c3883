use serde_derive::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
}

impl HttpConfig {
    pub const DEFAULT_TIMEOUT: u64 = 30;

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(Self::DEFAULT_TIMEOUT)
    }
}
