use log::{debug, info, warn};
use serde_json::Value;

use crate::auth::AuthSession;
use crate::cloud::SunsynkCloud;
use crate::error::BridgeError;
use crate::home_assistant::HomeAssistant;
use crate::http_wrapper::HttpWrapper;
use crate::projector::NULL_MARKER;

/// States Home Assistant reports for a helper that holds no value.
static UNSET_STATES: [&str; 2] = ["unknown", "unavailable"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushbackOutcome {
    /// The helper entity does not exist in Home Assistant.
    HelperMissing,
    /// The helper could not be read; nothing was forwarded or cleared.
    HelperUnreadable,
    /// The helper exists but holds nothing to forward.
    Empty,
    Forwarded,
    /// Forwarding failed; the helper was cleared regardless.
    ForwardFailed,
}

/// Forwards a pending settings change from the helper entity to the
/// inverter, then clears the helper.
///
/// The helper is cleared even when forwarding fails, so a failed change is
/// dropped rather than retried next cycle.
pub fn push_settings<C: HttpWrapper, H: HttpWrapper>(
    cloud: &mut SunsynkCloud<'_, C>,
    home_assistant: &mut HomeAssistant<'_, H>,
    session: &AuthSession,
    serial: &str,
    helper: &str,
) -> PushbackOutcome {
    let pending = match home_assistant.read_state(helper) {
        Ok(Some(entity)) => entity.state,
        Ok(None) => {
            info!(
                "settings helper {helper} not found; create an input_text helper with that \
                 entity id to push settings to inverter {serial}"
            );
            return PushbackOutcome::HelperMissing;
        }
        Err(e) => {
            warn!("cannot read settings helper {helper}: {e:#}");
            return PushbackOutcome::HelperUnreadable;
        }
    };
    let trimmed = pending.trim();
    if trimmed.is_empty() || trimmed == NULL_MARKER || UNSET_STATES.contains(&trimmed) {
        debug!("settings helper {helper} holds no settings ({pending:?})");
        return PushbackOutcome::Empty;
    }

    info!("forwarding pending settings from {helper} to inverter {serial}");
    let outcome = match forward(cloud, session, serial, pending) {
        Ok(()) => {
            info!("settings accepted by inverter {serial}");
            PushbackOutcome::Forwarded
        }
        Err(e) => {
            warn!("{e}; the pending change is discarded");
            PushbackOutcome::ForwardFailed
        }
    };

    if let Err(e) = home_assistant.clear_state(helper) {
        warn!("cannot clear settings helper: {e}");
    }
    outcome
}

fn forward<C: HttpWrapper>(
    cloud: &mut SunsynkCloud<'_, C>,
    session: &AuthSession,
    serial: &str,
    body: String,
) -> Result<(), BridgeError> {
    let url = cloud.endpoints.settings_write_url(serial);
    let response = cloud
        .http
        .post(&url, Some(session.bearer()), body)
        .map_err(|e| BridgeError::PushbackForward(format!("{e:#}")))?;
    debug!("settings write response ({}): {}", response.status, response.body);

    if !response.is_success() {
        return Err(BridgeError::PushbackForward(format!(
            "status {}",
            response.status
        )));
    }
    // the cloud reports rejections in-band
    let rejected = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("success").and_then(Value::as_bool))
        == Some(false);
    if rejected {
        return Err(BridgeError::PushbackForward(format!(
            "rejected by the cloud: {}",
            response.body
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{negotiate, BackoffSchedule};
    use crate::cloud::CloudEndpoints;
    use crate::credential::{Credentials, Secret};
    use crate::test_support::{FakeHttp, RecordingSleeper, Reply};
    use serde_json::json;

    static HA: &str = "http://ha.test:8123";
    static HELPER: &str = "input_text.solarsynk_SN1_inverter_settings";
    static HELPER_TARGET: &str = "ha.test:8123/api/states/input_text.solarsynk_SN1_inverter_settings";
    static SETTINGS_TARGET: &str = "api.test/api/v1/common/setting/SN1/set";
    static PENDING: &str = r#"{"sn":"SN1","cap1":"40","sellTime1":"01:00"}"#;

    fn endpoints() -> CloudEndpoints {
        CloudEndpoints::new("https://api.test", "https://alt.test")
    }

    fn session(endpoints: &CloudEndpoints) -> AuthSession {
        let mut http = FakeHttp::default().on(
            "POST",
            "api.test/oauth/token",
            Reply::json(200, json!({"success": true, "data": {"access_token": "bearer-1"}})),
        );
        let credentials = Credentials {
            username: "u".to_string(),
            password: Secret::new("p"),
            encrypted_password: Secret::new("e"),
        };
        negotiate(
            &mut SunsynkCloud::new(&mut http, endpoints),
            &credentials,
            &BackoffSchedule::default(),
            &mut RecordingSleeper::default(),
        )
        .unwrap()
    }

    fn helper_holding(state: &str) -> FakeHttp {
        FakeHttp::default()
            .on(
                "GET",
                HELPER_TARGET,
                Reply::json(200, json!({"entity_id": HELPER, "state": state})),
            )
            .on("POST", HELPER_TARGET, Reply::Respond(200, "{}".to_string()))
    }

    fn run(cloud_http: &mut FakeHttp, ha_http: &mut FakeHttp) -> PushbackOutcome {
        let endpoints = endpoints();
        let session = session(&endpoints);
        let token = Secret::new("llat");
        let mut cloud = SunsynkCloud::new(cloud_http, &endpoints);
        let mut home_assistant = HomeAssistant::new(ha_http, HA, &token);
        push_settings(&mut cloud, &mut home_assistant, &session, "SN1", HELPER)
    }

    #[test]
    fn forwards_verbatim_and_clears_the_helper() {
        let mut cloud_http = FakeHttp::default().on(
            "POST",
            SETTINGS_TARGET,
            Reply::json(200, json!({"code": 0, "msg": "Success", "success": true})),
        );
        let mut ha_http = helper_holding(PENDING);

        assert_eq!(run(&mut cloud_http, &mut ha_http), PushbackOutcome::Forwarded);

        let forwarded = cloud_http.requests_to("POST", SETTINGS_TARGET);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].body.as_deref(), Some(PENDING));
        assert_eq!(forwarded[0].bearer.as_deref(), Some("bearer-1"));

        let cleared = ha_http.requests_to("POST", HELPER_TARGET);
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].json_body(), json!({"state": ""}));
    }

    #[test]
    fn helper_is_cleared_even_when_forwarding_fails() {
        for reply in [
            Reply::Fail("timeout".to_string()),
            Reply::Respond(502, String::new()),
            Reply::json(200, json!({"code": 1, "msg": "Failed", "success": false})),
        ] {
            let mut cloud_http = FakeHttp::default().on("POST", SETTINGS_TARGET, reply);
            let mut ha_http = helper_holding(PENDING);

            assert_eq!(
                run(&mut cloud_http, &mut ha_http),
                PushbackOutcome::ForwardFailed
            );
            assert_eq!(ha_http.requests_to("POST", HELPER_TARGET).len(), 1);
        }
    }

    #[test]
    fn empty_helper_forwards_nothing() {
        let mut cloud_http = FakeHttp::default();
        let mut ha_http = helper_holding("  ");

        assert_eq!(run(&mut cloud_http, &mut ha_http), PushbackOutcome::Empty);
        assert!(cloud_http.requests_to("POST", SETTINGS_TARGET).is_empty());
        assert!(ha_http.requests_to("POST", HELPER_TARGET).is_empty());
    }

    #[test]
    fn unset_helper_states_forward_nothing() {
        for state in ["unknown", "unavailable", "null", " unknown "] {
            let mut cloud_http = FakeHttp::default();
            let mut ha_http = helper_holding(state);

            assert_eq!(
                run(&mut cloud_http, &mut ha_http),
                PushbackOutcome::Empty,
                "{state:?}"
            );
            assert!(cloud_http.requests_to("POST", SETTINGS_TARGET).is_empty());
            assert!(ha_http.requests_to("POST", HELPER_TARGET).is_empty());
        }
    }

    #[test]
    fn missing_helper_is_not_an_error() {
        let mut cloud_http = FakeHttp::default();
        let mut ha_http = FakeHttp::default();

        assert_eq!(
            run(&mut cloud_http, &mut ha_http),
            PushbackOutcome::HelperMissing
        );
        assert!(cloud_http.requests_to("POST", SETTINGS_TARGET).is_empty());
        assert_eq!(ha_http.requests.len(), 1);
    }

    #[test]
    fn unreadable_helper_stops_without_clearing() {
        let mut cloud_http = FakeHttp::default();
        let mut ha_http =
            FakeHttp::default().on("GET", HELPER_TARGET, Reply::Fail("refused".to_string()));

        assert_eq!(
            run(&mut cloud_http, &mut ha_http),
            PushbackOutcome::HelperUnreadable
        );
        assert_eq!(ha_http.requests.len(), 1);
    }
}
