use chrono::NaiveDate;

use crate::auth::EndpointForm;
use crate::bridge_config::BridgeConfig;
use crate::http_wrapper::HttpWrapper;

pub static DEFAULT_API_SERVER: &str = "https://api.sunsynk.net";
pub static DEFAULT_ALT_API_SERVER: &str = "https://pv.inteless.com";

/// Base URLs of the inverter cloud. `api` serves keys, tokens, telemetry
/// and settings; `alt_api` is only ever used for token requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudEndpoints {
    pub api: String,
    pub alt_api: String,
}

impl Default for CloudEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_SERVER, DEFAULT_ALT_API_SERVER)
    }
}

impl CloudEndpoints {
    pub fn new(api: &str, alt_api: &str) -> Self {
        Self {
            api: api.trim().trim_end_matches('/').to_string(),
            alt_api: alt_api.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.api_server.as_deref().unwrap_or(DEFAULT_API_SERVER),
            config
                .alt_api_server
                .as_deref()
                .unwrap_or(DEFAULT_ALT_API_SERVER),
        )
    }

    pub fn public_key_url(&self, nonce: i64) -> String {
        format!(
            "{}/anonymous/publicKey?source=sunsynk&nonce={nonce}",
            self.api
        )
    }

    pub fn token_url(&self, endpoint: EndpointForm) -> String {
        let base = match endpoint {
            EndpointForm::Default => &self.api,
            EndpointForm::Alternate => &self.alt_api,
        };
        format!("{base}/oauth/token")
    }

    pub fn settings_write_url(&self, serial: &str) -> String {
        format!("{}/api/v1/common/setting/{serial}/set", self.api)
    }

    pub fn telemetry_url(&self, path: &str, date: NaiveDate) -> String {
        format!("{}{}", self.api, path).replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}

/// A cycle-scoped handle on the inverter cloud.
pub struct SunsynkCloud<'a, H: HttpWrapper> {
    pub(crate) http: &'a mut H,
    pub(crate) endpoints: &'a CloudEndpoints,
}

impl<'a, H: HttpWrapper> SunsynkCloud<'a, H> {
    pub fn new(http: &'a mut H, endpoints: &'a CloudEndpoints) -> Self {
        Self { http, endpoints }
    }
}
