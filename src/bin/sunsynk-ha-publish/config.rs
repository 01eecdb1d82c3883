use std::path::{Path, PathBuf};
use std::{env, fs};

use log::{debug, warn};
use synk2ha::bridge_config::BridgeConfig;
use synk2ha::credential::Secret;

static CONFIG_FILE: &str = "config.toml";
static ADDON_OPTIONS: &str = "/data/options.json";

/// Loads the configuration bag: a file first, then environment overrides.
pub fn load() -> BridgeConfig {
    let mut config = read_file();
    apply_env(&mut config, |name| env::var(name).ok());
    config
}

// config.toml from the current working dir, or next to the executable if
// that fails
fn config_path() -> Option<PathBuf> {
    let local = env::current_dir().ok()?.join(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let mut beside_exe = env::current_exe().ok()?;
    beside_exe.pop();
    beside_exe.push(CONFIG_FILE);
    beside_exe.exists().then_some(beside_exe)
}

fn read_file() -> BridgeConfig {
    if let Some(path) = config_path() {
        debug!("loading configuration from {}", path.display());
        return match fs::read_to_string(&path) {
            Ok(contents) => parse_toml(&contents),
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                BridgeConfig::default()
            }
        };
    }

    let options = Path::new(ADDON_OPTIONS);
    if options.exists() {
        debug!("loading add-on options from {ADDON_OPTIONS}");
        return match fs::read_to_string(options) {
            Ok(contents) => parse_json(&contents),
            Err(e) => {
                warn!("Could not read {ADDON_OPTIONS}: {e}");
                BridgeConfig::default()
            }
        };
    }

    debug!("no configuration file found, relying on environment variables");
    BridgeConfig::default()
}

fn parse_toml(contents: &str) -> BridgeConfig {
    toml::from_str(contents).unwrap_or_else(|e| {
        warn!("toml config unparsable: {e}");
        BridgeConfig::default()
    })
}

fn parse_json(contents: &str) -> BridgeConfig {
    serde_json::from_str(contents).unwrap_or_else(|e| {
        warn!("add-on options unparsable: {e}");
        BridgeConfig::default()
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// overwrite config if environment variables are set
fn apply_env(config: &mut BridgeConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(user) = var("SUNSYNK_USER") {
        config.sunsynk_user = user;
    }
    if let Some(pass) = var("SUNSYNK_PASS") {
        config.sunsynk_pass = Secret::new(pass);
    }
    if let Some(serial) = var("SUNSYNK_SERIAL") {
        config.sunsynk_serial = serial;
    }
    if let Some(host) = var("HA_HOST") {
        config.ha_host = host;
    }
    if let Some(port) = var("HA_PORT") {
        match port.trim().parse() {
            Ok(port) => config.ha_port = Some(port),
            Err(e) => warn!("ignoring HA_PORT={port}: {e}"),
        }
    }
    if let Some(token) = var("HA_TOKEN") {
        config.ha_token = Secret::new(token);
    }
    if let Some(interval) = var("REFRESH_INTERVAL") {
        match interval.trim().parse::<u64>() {
            Ok(0) => warn!("ignoring REFRESH_INTERVAL=0"),
            Ok(interval) => config.refresh_interval = Some(interval),
            Err(e) => warn!("ignoring REFRESH_INTERVAL={interval}: {e}"),
        }
    }
    if let Some(https) = var("ENABLE_HTTPS") {
        match parse_flag(&https) {
            Some(flag) => config.use_https = Some(flag),
            None => warn!("ignoring ENABLE_HTTPS={https}"),
        }
    }
    if let Some(verbose) = var("VERBOSE") {
        match parse_flag(&verbose) {
            Some(flag) => config.verbose = Some(flag),
            None => warn!("ignoring VERBOSE={verbose}"),
        }
    }
    if let Some(helper) = var("SETTINGS_HELPER") {
        config.settings_helper = Some(helper);
    }
}
