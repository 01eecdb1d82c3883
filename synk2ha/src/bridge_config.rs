use std::path::PathBuf;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::credential::Secret;
use crate::error::{BridgeError, BridgeResult};
use crate::http_config::HttpConfig;

static DEFAULT_HA_PORT: u16 = 8123;
static DEFAULT_REFRESH_INTERVAL: u64 = 300;
/// Shorter intervals would run authentication back to back.
pub static MIN_REFRESH_INTERVAL: u64 = 30;

/// The resolved configuration bag, reloaded at the start of every cycle.
///
/// Field aliases accept the option names of the Home Assistant add-on
/// (`/data/options.json`), so the same struct reads both sources.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub sunsynk_user: String,
    #[serde(default)]
    pub sunsynk_pass: Secret,
    /// One serial, or several separated by `;`.
    #[serde(default)]
    pub sunsynk_serial: String,
    #[serde(default, alias = "HA_ip")]
    pub ha_host: String,
    #[serde(alias = "HA_port")]
    pub ha_port: Option<u16>,
    #[serde(default, alias = "HA_LongLiveToken")]
    pub ha_token: Secret,
    /// Seconds between two cycles.
    #[serde(alias = "Refresh_rate")]
    pub refresh_interval: Option<u64>,
    #[serde(alias = "Enable_HTTPS")]
    pub use_https: Option<bool>,
    #[serde(alias = "Enable_Verbose_Log")]
    pub verbose: Option<bool>,
    #[serde(alias = "Settings_Helper_Entity")]
    pub settings_helper: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub api_server: Option<String>,
    pub alt_api_server: Option<String>,
}

impl BridgeConfig {
    pub fn validate(&self) -> BridgeResult<()> {
        let mut missing = Vec::new();
        if self.sunsynk_user.trim().is_empty() {
            missing.push("sunsynk_user");
        }
        if self.sunsynk_pass.is_empty() {
            missing.push("sunsynk_pass");
        }
        if self.serials().is_empty() {
            missing.push("sunsynk_serial");
        }
        if self.ha_host.trim().is_empty() {
            missing.push("ha_host");
        }
        if self.ha_token.is_empty() {
            missing.push("ha_token");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::ConfigMissing(missing))
        }
    }

    pub fn serials(&self) -> Vec<&str> {
        self.sunsynk_serial
            .split(';')
            .map(str::trim)
            .filter(|serial| !serial.is_empty())
            .collect()
    }

    pub fn refresh_interval(&self) -> Duration {
        let seconds = self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL);
        Duration::from_secs(seconds.max(MIN_REFRESH_INTERVAL))
    }

    pub fn verbose(&self) -> bool {
        self.verbose.is_some_and(|value| value)
    }

    pub fn use_https(&self) -> bool {
        self.use_https.is_some_and(|value| value)
    }

    pub fn ha_base_url(&self) -> String {
        let scheme = if self.use_https() { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}",
            self.ha_host.trim(),
            self.ha_port.unwrap_or(DEFAULT_HA_PORT)
        )
    }

    /// Entity id of the settings write-back helper for `serial`.
    pub fn settings_helper(&self, serial: &str) -> String {
        match self.settings_helper.as_deref().map(str::trim) {
            Some(helper) if !helper.is_empty() => helper.replace("{sn}", serial),
            _ => format!("input_text.solarsynk_{serial}_inverter_settings"),
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn cloud_http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: None,
            accept_invalid_certs: Some(false),
        }
    }

    /// Local Home Assistant installs commonly serve HTTPS with a self-signed
    /// certificate.
    pub fn ha_http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: None,
            accept_invalid_certs: Some(self.use_https()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BridgeConfig {
        BridgeConfig {
            sunsynk_user: "user@example.com".to_string(),
            sunsynk_pass: Secret::new("hunter2"),
            sunsynk_serial: "2211229948".to_string(),
            ha_host: "homeassistant.local".to_string(),
            ha_token: Secret::new("llat"),
            ..Default::default()
        }
    }

    #[test]
    fn complete_config_is_valid() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn validate_lists_every_missing_value() {
        let config = BridgeConfig {
            sunsynk_serial: " ; ".to_string(),
            ..complete()
        };
        let config = BridgeConfig {
            ha_token: Secret::default(),
            ..config
        };
        match config.validate() {
            Err(BridgeError::ConfigMissing(missing)) => {
                assert_eq!(missing, vec!["sunsynk_serial", "ha_token"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn serials_split_on_semicolon() {
        let config = BridgeConfig {
            sunsynk_serial: "111; 222;;333 ".to_string(),
            ..complete()
        };
        assert_eq!(config.serials(), vec!["111", "222", "333"]);
    }

    #[test]
    fn defaults_apply() {
        let config = complete();
        assert_eq!(config.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.ha_base_url(), "http://homeassistant.local:8123");
        assert_eq!(
            config.settings_helper("2211229948"),
            "input_text.solarsynk_2211229948_inverter_settings"
        );
        assert!(!config.verbose());
    }

    #[test]
    fn refresh_interval_has_a_floor() {
        for seconds in [0, 1, 29] {
            let config = BridgeConfig {
                refresh_interval: Some(seconds),
                ..complete()
            };
            assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        }
        let config = BridgeConfig {
            refresh_interval: Some(45),
            ..complete()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(45));
    }

    #[test]
    fn https_and_custom_helper() {
        let config = BridgeConfig {
            use_https: Some(true),
            ha_port: Some(443),
            settings_helper: Some("input_text.pushback_{sn}".to_string()),
            ..complete()
        };
        assert_eq!(config.ha_base_url(), "https://homeassistant.local:443");
        assert_eq!(config.settings_helper("42"), "input_text.pushback_42");
        assert_eq!(config.ha_http_config().accept_invalid_certs, Some(true));
        assert_eq!(config.cloud_http_config().accept_invalid_certs, Some(false));
    }

    #[test]
    fn addon_option_names_are_accepted() {
        let options = r#"{
            "sunsynk_user": "u",
            "sunsynk_pass": "p",
            "sunsynk_serial": "1",
            "HA_ip": "10.0.0.2",
            "HA_port": 8124,
            "HA_LongLiveToken": "t",
            "Refresh_rate": 60,
            "Enable_HTTPS": false,
            "Enable_Verbose_Log": true,
            "Settings_Helper_Entity": ""
        }"#;
        let config: BridgeConfig = serde_json::from_str(options).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.ha_base_url(), "http://10.0.0.2:8124");
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert!(config.verbose());
        assert_eq!(
            config.settings_helper("1"),
            "input_text.solarsynk_1_inverter_settings"
        );
    }
}
