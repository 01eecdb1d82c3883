use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde_json::Value;

use crate::auth::AuthSession;
use crate::cloud::{CloudEndpoints, SunsynkCloud};
use crate::error::{BridgeError, BridgeResult};
use crate::http_wrapper::HttpWrapper;

/// One inverter subsystem, fetched as one JSON document per cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    PvInput,
    Grid,
    Load,
    Battery,
    InverterOutput,
    Temperature,
    InverterInfo,
    Settings,
}

impl Domain {
    pub const ALL: [Domain; 8] = [
        Domain::PvInput,
        Domain::Grid,
        Domain::Load,
        Domain::Battery,
        Domain::InverterOutput,
        Domain::Temperature,
        Domain::InverterInfo,
        Domain::Settings,
    ];

    /// Name of the output slot the document is kept under.
    pub fn slot(self) -> &'static str {
        match self {
            Domain::PvInput => "pvindata",
            Domain::Grid => "griddata",
            Domain::Load => "loaddata",
            Domain::Battery => "batterydata",
            Domain::InverterOutput => "outputdata",
            Domain::Temperature => "dcactemp",
            Domain::InverterInfo => "inverterinfo",
            Domain::Settings => "inverter_settings",
        }
    }

    fn path(self, serial: &str) -> String {
        match self {
            Domain::PvInput => format!("/api/v1/inverter/{serial}/realtime/input"),
            Domain::Grid => format!("/api/v1/inverter/grid/{serial}/realtime?sn={serial}"),
            Domain::Load => format!("/api/v1/inverter/load/{serial}/realtime?sn={serial}"),
            Domain::Battery => {
                format!("/api/v1/inverter/battery/{serial}/realtime?sn={serial}&lan=en")
            }
            Domain::InverterOutput => format!("/api/v1/inverter/{serial}/realtime/output"),
            Domain::Temperature => format!(
                "/api/v1/inverter/{serial}/output/day?lan=en&date={{date}}&column=dc_temp,igbt_temp"
            ),
            Domain::InverterInfo => format!("/api/v1/inverter/{serial}"),
            Domain::Settings => format!("/api/v1/common/setting/{serial}/read"),
        }
    }

    pub fn url(self, endpoints: &CloudEndpoints, serial: &str, date: NaiveDate) -> String {
        endpoints.telemetry_url(&self.path(serial), date)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot())
    }
}

/// The documents fetched for one inverter in one cycle.
#[derive(Clone, Debug, Default)]
pub struct TelemetrySet {
    documents: BTreeMap<Domain, Value>,
    failures: Vec<Domain>,
}

impl TelemetrySet {
    pub fn insert(&mut self, domain: Domain, document: Value) {
        self.failures.retain(|failed| *failed != domain);
        self.documents.insert(domain, document);
    }

    pub fn record_failure(&mut self, domain: Domain) {
        self.documents.remove(&domain);
        if !self.failures.contains(&domain) {
            self.failures.push(domain);
        }
    }

    pub fn document(&self, domain: Domain) -> Option<&Value> {
        self.documents.get(&domain)
    }

    pub fn failures(&self) -> &[Domain] {
        &self.failures
    }

    /// True only when every domain has a document.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && Domain::ALL.iter().all(|d| self.documents.contains_key(d))
    }

    pub fn gate(&self) -> BridgeResult<()> {
        if self.all_succeeded() {
            return Ok(());
        }
        let failed = Domain::ALL
            .iter()
            .filter(|d| !self.documents.contains_key(d))
            .count();
        Err(BridgeError::FetchPartialFailure {
            failed,
            total: Domain::ALL.len(),
        })
    }
}

/// Fetches every domain for `serial`. A failed domain is recorded and the
/// remaining ones are still fetched.
pub fn fetch_all<H: HttpWrapper>(
    cloud: &mut SunsynkCloud<'_, H>,
    session: &AuthSession,
    serial: &str,
    date: NaiveDate,
) -> TelemetrySet {
    let mut set = TelemetrySet::default();

    for domain in Domain::ALL {
        let url = domain.url(cloud.endpoints, serial, date);
        match fetch_one(cloud, session, &url) {
            Ok(document) => {
                debug!("{domain} for {serial}: {document}");
                set.insert(domain, document);
            }
            Err(reason) => {
                warn!("fetching {domain} for {serial} failed: {reason}");
                set.record_failure(domain);
            }
        }
    }

    if set.all_succeeded() {
        info!("fetched all {} telemetry documents for {serial}", Domain::ALL.len());
    }
    set
}

fn fetch_one<H: HttpWrapper>(
    cloud: &mut SunsynkCloud<'_, H>,
    session: &AuthSession,
    url: &str,
) -> Result<Value, String> {
    let response = cloud
        .http
        .get(url, Some(session.bearer()))
        .map_err(|e| format!("{e:#}"))?;
    if !response.is_success() {
        debug!("error body from {url}: {}", response.body);
        return Err(format!("status {}", response.status));
    }
    serde_json::from_str(&response.body).map_err(|e| format!("unparsable body: {e}"))
}
