use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use serde_derive::Deserialize;

use crate::cloud::SunsynkCloud;
use crate::credential::{Credentials, Secret};
use crate::error::{BridgeError, BridgeResult};
use crate::http_wrapper::HttpWrapper;
use crate::sleeper::Sleeper;

/// Seconds to wait before attempts 2, 3, ... of one variant.
pub static BACKOFF_SCHEDULE: [u64; 7] = [1, 1, 2, 3, 5, 8, 13];

static CLIENT_ID: &str = "csp-web";
static SOURCE: &str = "sunsynk";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordForm {
    Encrypted,
    Plain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointForm {
    Default,
    Alternate,
}

/// One (password form, endpoint) combination tried during authentication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthVariant {
    pub password: PasswordForm,
    pub endpoint: EndpointForm,
}

impl AuthVariant {
    /// Encrypted forms always come before plaintext ones.
    pub const PRIORITY: [AuthVariant; 4] = [
        AuthVariant::new(PasswordForm::Encrypted, EndpointForm::Default),
        AuthVariant::new(PasswordForm::Encrypted, EndpointForm::Alternate),
        AuthVariant::new(PasswordForm::Plain, EndpointForm::Default),
        AuthVariant::new(PasswordForm::Plain, EndpointForm::Alternate),
    ];

    pub const fn new(password: PasswordForm, endpoint: EndpointForm) -> Self {
        Self { password, endpoint }
    }
}

impl fmt::Display for AuthVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = match self.password {
            PasswordForm::Encrypted => "encrypted",
            PasswordForm::Plain => "plain",
        };
        let endpoint = match self.endpoint {
            EndpointForm::Default => "default",
            EndpointForm::Alternate => "alternate",
        };
        write!(f, "{password} password via {endpoint} endpoint")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffSchedule {
    steps: &'static [u64],
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(&BACKOFF_SCHEDULE)
    }
}

impl BackoffSchedule {
    pub const fn new(steps: &'static [u64]) -> Self {
        Self { steps }
    }

    pub fn max_attempts(&self) -> usize {
        self.steps.len() + 1
    }

    /// The wait before `attempt` (1-based). Attempt 1 never waits.
    pub fn delay_before(&self, attempt: usize) -> Option<Duration> {
        attempt
            .checked_sub(2)
            .and_then(|index| self.steps.get(index))
            .map(|secs| Duration::from_secs(*secs))
    }

    /// Total wait spent within one variant before `attempt` is issued.
    pub fn elapsed_before(&self, attempt: usize) -> Duration {
        (1..=attempt).filter_map(|n| self.delay_before(n)).sum()
    }
}

/// A bearer token, valid for the cycle that obtained it.
#[derive(Clone, Debug)]
pub struct AuthSession {
    token: Secret,
    variant: AuthVariant,
}

impl AuthSession {
    pub fn bearer(&self) -> &str {
        self.token.expose()
    }

    pub fn variant(&self) -> AuthVariant {
        self.variant
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    grant_type: &'a str,
    password: &'a str,
    source: &'a str,
    username: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    success: bool,
    msg: Option<String>,
    data: Option<TokenData>,
}

#[derive(Deserialize)]
struct TokenData {
    access_token: Option<String>,
}

/// Walks every variant in priority order, retrying each with backoff, and
/// returns the first token obtained.
pub fn negotiate<H: HttpWrapper, S: Sleeper>(
    cloud: &mut SunsynkCloud<'_, H>,
    credentials: &Credentials,
    schedule: &BackoffSchedule,
    sleeper: &mut S,
) -> BridgeResult<AuthSession> {
    let max_attempts = schedule.max_attempts();
    let mut attempts = 0;

    for variant in AuthVariant::PRIORITY {
        for attempt in 1..=max_attempts {
            if let Some(delay) = schedule.delay_before(attempt) {
                debug!("waiting {}s before retrying {variant}", delay.as_secs());
                sleeper.sleep(delay);
            }
            attempts += 1;

            match request_token(cloud, credentials, variant) {
                Ok(token) => {
                    info!("authenticated with {variant} (attempt {attempt})");
                    return Ok(AuthSession { token, variant });
                }
                Err(reason) => {
                    warn!("authentication with {variant} failed ({attempt}/{max_attempts}): {reason}")
                }
            }
        }
    }

    Err(BridgeError::AuthExhausted { attempts })
}

fn request_token<H: HttpWrapper>(
    cloud: &mut SunsynkCloud<'_, H>,
    credentials: &Credentials,
    variant: AuthVariant,
) -> Result<Secret, String> {
    let password = match variant.password {
        PasswordForm::Encrypted => &credentials.encrypted_password,
        PasswordForm::Plain => &credentials.password,
    };
    let body = serde_json::to_string(&TokenRequest {
        client_id: CLIENT_ID,
        grant_type: "password",
        password: password.expose(),
        source: SOURCE,
        username: &credentials.username,
    })
    .map_err(|e| e.to_string())?;

    let url = cloud.endpoints.token_url(variant.endpoint);
    let response = cloud
        .http
        .post(&url, None, body)
        .map_err(|e| format!("{e:#}"))?;
    let parsed: Option<TokenResponse> = serde_json::from_str(&response.body).ok();
    debug!(
        "token response status {}, message {:?}",
        response.status,
        parsed.as_ref().and_then(|p| p.msg.as_deref())
    );

    if !response.is_success() {
        return Err(format!("status {}", response.status));
    }
    let parsed = parsed.ok_or_else(|| "unparsable response".to_string())?;
    if !parsed.success {
        return Err(format!(
            "rejected: {}",
            parsed.msg.as_deref().unwrap_or("no message")
        ));
    }
    match parsed.data.and_then(|data| data.access_token) {
        Some(token) if !token.trim().is_empty() && token.trim() != "null" => {
            Ok(Secret::new(token.trim()))
        }
        _ => Err("no access token in response".to_string()),
    }
}
