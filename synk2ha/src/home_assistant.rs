use log::{debug, info, warn};
use serde::Serialize;
use serde_derive::Deserialize;

use crate::credential::Secret;
use crate::error::{BridgeError, BridgeResult};
use crate::http_wrapper::HttpWrapper;
use crate::metric_collector::MetricCollector;
use crate::projector::SensorValues;
use crate::sensors::{SensorDef, SENSORS};

/// Body of a state write. Each write fully replaces the entity's prior state.
#[derive(Serialize)]
struct StateUpdate<'a> {
    state: &'a str,
    attributes: StateAttributes<'a>,
}

// exclude attributes that are not set
#[derive(Serialize)]
struct StateAttributes<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    friendly_name: &'a str,
}

#[derive(Serialize)]
struct StateReset<'a> {
    state: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A cycle-scoped handle on the Home Assistant REST API.
pub struct HomeAssistant<'a, H: HttpWrapper> {
    http: &'a mut H,
    base_url: String,
    token: &'a Secret,
    catalog: &'static [SensorDef],
}

impl<'a, H: HttpWrapper> HomeAssistant<'a, H> {
    pub fn new(http: &'a mut H, base_url: &str, token: &'a Secret) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            catalog: SENSORS,
        }
    }

    pub fn with_catalog(mut self, catalog: &'static [SensorDef]) -> Self {
        self.catalog = catalog;
        self
    }

    fn state_url(&self, entity_id: &str) -> String {
        format!("{}/api/states/{entity_id}", self.base_url)
    }

    fn post_state(&mut self, entity_id: &str, payload: String) -> BridgeResult<()> {
        let url = self.state_url(entity_id);
        debug!("Publishing to {entity_id} with payload {payload}");

        let response = self
            .http
            .post(&url, Some(self.token.expose()), payload)
            .map_err(|e| BridgeError::DispatchWrite {
                entity: entity_id.to_string(),
                reason: format!("{e:#}"),
            })?;
        if !response.is_success() {
            return Err(BridgeError::DispatchWrite {
                entity: entity_id.to_string(),
                reason: format!("status {}: {}", response.status, response.body),
            });
        }
        Ok(())
    }

    pub fn write_sensor(
        &mut self,
        serial: &str,
        sensor: &SensorDef,
        value: &str,
    ) -> BridgeResult<()> {
        let update = StateUpdate {
            state: value,
            attributes: StateAttributes {
                device_class: sensor.attributes.device_class,
                state_class: sensor.attributes.state_class,
                unit_of_measurement: sensor.attributes.unit,
                friendly_name: sensor.friendly_name,
            },
        };
        let payload = serde_json::to_string(&update).map_err(|e| BridgeError::DispatchWrite {
            entity: sensor.entity_id(serial),
            reason: e.to_string(),
        })?;
        self.post_state(&sensor.entity_id(serial), payload)
    }

    /// Writes every catalogued sensor that has a dispatchable value. Failed
    /// writes are logged and not retried.
    pub fn dispatch(&mut self, serial: &str, values: &SensorValues) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for sensor in self.catalog {
            let Some(value) = values.dispatchable(sensor.key) else {
                summary.skipped += 1;
                continue;
            };
            match self.write_sensor(serial, sensor, value) {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    warn!("{e}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Reads one entity. `Ok(None)` means the entity does not exist.
    pub fn read_state(&mut self, entity_id: &str) -> anyhow::Result<Option<EntityState>> {
        let url = self.state_url(entity_id);
        let response = self.http.get(&url, Some(self.token.expose()))?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => {
                debug!("{entity_id} read as {}", response.body);
                Ok(Some(serde_json::from_str(&response.body)?))
            }
            status => anyhow::bail!("reading {entity_id} answered with status {status}"),
        }
    }

    /// Overwrites an entity's state with the empty string.
    pub fn clear_state(&mut self, entity_id: &str) -> BridgeResult<()> {
        let payload = serde_json::to_string(&StateReset { state: "" }).map_err(|e| {
            BridgeError::DispatchWrite {
                entity: entity_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.post_state(entity_id, payload)
    }
}

impl<H: HttpWrapper> MetricCollector for HomeAssistant<'_, H> {
    fn publish(&mut self, serial: &str, values: &SensorValues) {
        let summary = self.dispatch(serial, values);
        info!(
            "published {} sensors for {serial} ({} without value, {} failed)",
            summary.written, summary.skipped, summary.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{find, Source};
    use crate::telemetry::Domain;
    use crate::test_support::{FakeHttp, Reply};
    use serde_json::json;

    static BASE: &str = "http://ha.test:8123";

    static CATALOG: &[SensorDef] = &[
        SensorDef {
            key: "grid_power",
            friendly_name: "Grid Power",
            attributes: crate::sensors::SensorAttributes {
                device_class: Some("power"),
                state_class: Some("measurement"),
                unit: Some("W"),
            },
            source: Source::Field(Domain::Grid, ".data.vip[0].power"),
        },
        SensorDef {
            key: "run_status",
            friendly_name: "Inverter Run Status",
            attributes: crate::sensors::SensorAttributes {
                device_class: None,
                state_class: None,
                unit: None,
            },
            source: Source::Field(Domain::InverterInfo, ".data.runStatus"),
        },
        SensorDef {
            key: "battery_soc",
            friendly_name: "Battery SOC",
            attributes: crate::sensors::SensorAttributes {
                device_class: Some("battery"),
                state_class: Some("measurement"),
                unit: Some("%"),
            },
            source: Source::Field(Domain::Battery, ".data.bmsSoc"),
        },
    ];

    fn values() -> SensorValues {
        let mut values = SensorValues::default();
        values.insert("grid_power", Some("748".to_string()));
        values.insert("run_status", Some("null".to_string()));
        values.insert("battery_soc", None);
        values.insert("not_in_catalog", Some("42".to_string()));
        values
    }

    #[test]
    fn writes_only_present_non_null_catalogued_values() {
        let token = Secret::new("llat");
        let mut http = FakeHttp::default().on(
            "POST",
            "ha.test:8123/api/states/sensor.solarsynk_SN1_grid_power",
            Reply::Respond(200, "{}".to_string()),
        );
        let summary = HomeAssistant::new(&mut http, BASE, &token)
            .with_catalog(CATALOG)
            .dispatch("SN1", &values());

        assert_eq!(
            summary,
            DispatchSummary {
                written: 1,
                skipped: 2,
                failed: 0
            }
        );
        assert_eq!(http.requests.len(), 1);
        let request = &http.requests[0];
        assert_eq!(request.bearer.as_deref(), Some("llat"));
        assert_eq!(
            request.json_body(),
            json!({
                "state": "748",
                "attributes": {
                    "device_class": "power",
                    "state_class": "measurement",
                    "unit_of_measurement": "W",
                    "friendly_name": "Grid Power"
                }
            })
        );
    }

    #[test]
    fn text_sensors_omit_unset_attributes() {
        let token = Secret::new("llat");
        let mut http = FakeHttp::default();
        let sensor = find("inverter_name").unwrap();
        let _ = HomeAssistant::new(&mut http, BASE, &token).write_sensor("SN1", sensor, "Garage");

        assert_eq!(
            http.requests[0].json_body(),
            json!({"state": "Garage", "attributes": {"friendly_name": "Inverter Name"}})
        );
    }

    #[test]
    fn a_failed_write_does_not_block_the_rest() {
        let token = Secret::new("llat");
        let mut values = values();
        values.insert("run_status", Some("normal".to_string()));
        values.insert("battery_soc", Some("87".to_string()));
        let mut http = FakeHttp::default()
            .on(
                "POST",
                "ha.test:8123/api/states/sensor.solarsynk_SN1_grid_power",
                Reply::Fail("connection reset".to_string()),
            )
            .on(
                "POST",
                "ha.test:8123/api/states/sensor.solarsynk_SN1_run_status",
                Reply::Respond(500, "boom".to_string()),
            )
            .on(
                "POST",
                "ha.test:8123/api/states/sensor.solarsynk_SN1_battery_soc",
                Reply::Respond(201, "{}".to_string()),
            );

        let summary = HomeAssistant::new(&mut http, BASE, &token)
            .with_catalog(CATALOG)
            .dispatch("SN1", &values);

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.written, 1);
        assert_eq!(http.requests.len(), 3);
    }

    #[test]
    fn dispatching_twice_sends_identical_writes() {
        let token = Secret::new("llat");
        let mut http = FakeHttp::default().on(
            "POST",
            "ha.test:8123/api/states/sensor.solarsynk_SN1_grid_power",
            Reply::Respond(200, "{}".to_string()),
        );
        let values = values();
        {
            let mut ha = HomeAssistant::new(&mut http, BASE, &token).with_catalog(CATALOG);
            ha.dispatch("SN1", &values);
            ha.dispatch("SN1", &values);
        }
        assert_eq!(http.requests.len(), 2);
        assert_eq!(http.requests[0], http.requests[1]);
    }

    #[test]
    fn read_state_distinguishes_missing_entities() {
        let token = Secret::new("llat");
        let mut http = FakeHttp::default()
            .on(
                "GET",
                "ha.test:8123/api/states/input_text.present",
                Reply::json(200, json!({"entity_id": "input_text.present", "state": "abc"})),
            )
            .on(
                "GET",
                "ha.test:8123/api/states/input_text.broken",
                Reply::Respond(401, String::new()),
            );
        let mut ha = HomeAssistant::new(&mut http, BASE, &token);

        assert_eq!(
            ha.read_state("input_text.present").unwrap().unwrap().state,
            "abc"
        );
        assert!(ha.read_state("input_text.absent").unwrap().is_none());
        assert!(ha.read_state("input_text.broken").is_err());
    }

    #[test]
    fn clear_state_posts_an_empty_state() {
        let token = Secret::new("llat");
        let mut http = FakeHttp::default().on(
            "POST",
            "ha.test:8123/api/states/input_text.helper",
            Reply::Respond(200, "{}".to_string()),
        );
        HomeAssistant::new(&mut http, BASE, &token)
            .clear_state("input_text.helper")
            .unwrap();
        assert_eq!(http.requests[0].json_body(), json!({"state": ""}));
    }
}
