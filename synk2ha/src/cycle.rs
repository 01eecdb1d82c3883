use std::time::Duration;

use chrono::{Local, NaiveDate};
use log::{error, info, warn};

use crate::auth::{negotiate, BackoffSchedule};
use crate::bridge_config::BridgeConfig;
use crate::cloud::{CloudEndpoints, SunsynkCloud};
use crate::credential::{encrypt_password, Credentials};
use crate::home_assistant::HomeAssistant;
use crate::http_wrapper::HttpWrapper;
use crate::metric_collector::MetricCollector;
use crate::projector::{project, Projection};
use crate::pushback::push_settings;
use crate::scratch::ScratchArea;
use crate::sleeper::Sleeper;
use crate::telemetry::fetch_all;

/// Wait after a cycle that found the configuration incomplete.
pub static CONFIG_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    ConfigMissing,
    EncryptionFailed,
    AuthExhausted,
    /// Serials whose telemetry was published, and serials skipped because
    /// at least one fetch failed.
    Completed { published: usize, skipped: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub next_delay: Duration,
}

/// Drives one authenticate, fetch, publish and pushback pass per call.
///
/// Cloud and Home Assistant traffic use separate clients since only the
/// latter may accept self-signed certificates.
pub struct Bridge<H: HttpWrapper, S: Sleeper> {
    cloud_http: H,
    ha_http: H,
    sleeper: S,
    schedule: BackoffSchedule,
}

impl<H: HttpWrapper, S: Sleeper> Bridge<H, S> {
    pub fn new(config: &BridgeConfig, sleeper: S) -> Self {
        Self::with_clients(
            H::new(&config.cloud_http_config()),
            H::new(&config.ha_http_config()),
            sleeper,
        )
    }

    pub fn with_clients(cloud_http: H, ha_http: H, sleeper: S) -> Self {
        Self {
            cloud_http,
            ha_http,
            sleeper,
            schedule: BackoffSchedule::default(),
        }
    }

    pub fn cloud_http(&self) -> &H {
        &self.cloud_http
    }

    pub fn ha_http(&self) -> &H {
        &self.ha_http
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Suspends until the next cycle is due.
    pub fn wait(&mut self, report: &CycleReport) {
        self.sleeper.sleep(report.next_delay);
    }

    pub fn run_cycle(&mut self, config: &BridgeConfig) -> CycleReport {
        self.run_cycle_on(config, Local::now().date_naive())
    }

    pub fn run_cycle_on(&mut self, config: &BridgeConfig, date: NaiveDate) -> CycleReport {
        let scratch = ScratchArea::new(config.scratch_dir());
        scratch.purge();

        if let Err(e) = config.validate() {
            error!("{e}; retrying in {}s", CONFIG_RETRY_DELAY.as_secs());
            return CycleReport {
                outcome: CycleOutcome::ConfigMissing,
                next_delay: CONFIG_RETRY_DELAY,
            };
        }
        let refresh = config.refresh_interval();
        let report = |outcome| CycleReport {
            outcome,
            next_delay: refresh,
        };

        let endpoints = CloudEndpoints::from_config(config);
        let mut cloud = SunsynkCloud::new(&mut self.cloud_http, &endpoints);

        let encrypted = encrypt_password(&mut cloud, &scratch, &config.sunsynk_pass);
        let encrypted_password = match encrypted {
            Ok(encrypted) => encrypted,
            Err(e) => {
                error!("{e}");
                return report(CycleOutcome::EncryptionFailed);
            }
        };
        let credentials = Credentials {
            username: config.sunsynk_user.trim().to_string(),
            password: config.sunsynk_pass.clone(),
            encrypted_password,
        };

        let session = negotiate(&mut cloud, &credentials, &self.schedule, &mut self.sleeper);
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                error!("{e}");
                return report(CycleOutcome::AuthExhausted);
            }
        };
        drop(credentials);

        let base_url = config.ha_base_url();
        let mut home_assistant =
            HomeAssistant::new(&mut self.ha_http, &base_url, &config.ha_token);

        let (mut published, mut skipped) = (0, 0);
        for serial in config.serials() {
            let telemetry = fetch_all(&mut cloud, &session, serial, date);
            match project(&telemetry) {
                Projection::Complete(values) => {
                    home_assistant.publish(serial, &values);
                    published += 1;
                }
                Projection::Skipped => {
                    if let Err(e) = telemetry.gate() {
                        warn!("not publishing {serial} this cycle: {e}");
                    }
                    skipped += 1;
                }
            }

            let helper = config.settings_helper(serial);
            push_settings(&mut cloud, &mut home_assistant, &session, serial, &helper);
        }

        info!("cycle complete, next run in {}s", refresh.as_secs());
        report(CycleOutcome::Completed { published, skipped })
    }
}
