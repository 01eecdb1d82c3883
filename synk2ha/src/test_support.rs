//! Scripted transport and helpers shared by the unit and integration tests.

use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::anyhow;
use base64::Engine as _;
use rand_core::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::http_config::HttpConfig;
use crate::http_wrapper::{HttpResponse, HttpWrapper};
use crate::sleeper::Sleeper;

#[derive(Clone, Debug)]
pub enum Reply {
    Respond(u16, String),
    Fail(String),
}

impl Reply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Reply::Respond(status, body.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<String>,
}

impl Request {
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(self.body.as_deref().unwrap_or("null")).unwrap()
    }
}

struct Route {
    method: &'static str,
    target: String,
    queued: VecDeque<Reply>,
    fallback: Reply,
}

/// Routes on `method` plus host and path; the query string is ignored.
/// Unrouted requests get a 404 unless the fake was built `accepting`.
#[derive(Default)]
pub struct FakeHttp {
    routes: Vec<Route>,
    unrouted: Option<Reply>,
    pub requests: Vec<Request>,
}

impl FakeHttp {
    /// A server that answers every unrouted request with an empty object.
    pub fn accepting() -> Self {
        Self {
            unrouted: Some(Reply::Respond(200, "{}".to_string())),
            ..Self::default()
        }
    }

    pub fn on(self, method: &'static str, target: &str, reply: Reply) -> Self {
        self.on_sequence(method, target, Vec::new(), reply)
    }

    /// Serves `replies` in order, then `fallback` forever.
    pub fn on_sequence(
        mut self,
        method: &'static str,
        target: &str,
        replies: Vec<Reply>,
        fallback: Reply,
    ) -> Self {
        self.routes.push(Route {
            method,
            target: target.to_string(),
            queued: replies.into(),
            fallback,
        });
        self
    }

    pub fn requests_to(&self, method: &str, target: &str) -> Vec<&Request> {
        self.requests
            .iter()
            .filter(|r| r.method == method && target_of(&r.url) == target)
            .collect()
    }

    /// Requests whose host and path start with `prefix`.
    pub fn count(&self, method: &str, prefix: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.method == method && target_of(&r.url).starts_with(prefix))
            .count()
    }

    fn respond(
        &mut self,
        method: &'static str,
        url: &str,
        bearer: Option<&str>,
        body: Option<String>,
    ) -> anyhow::Result<HttpResponse> {
        self.requests.push(Request {
            method,
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body,
        });

        let target = target_of(url);
        let route = self
            .routes
            .iter_mut()
            .find(|route| route.method == method && route.target == target);
        let reply = match route {
            Some(route) => route
                .queued
                .pop_front()
                .unwrap_or_else(|| route.fallback.clone()),
            None => self
                .unrouted
                .clone()
                .unwrap_or_else(|| Reply::Respond(404, String::new())),
        };
        match reply {
            Reply::Respond(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Fail(reason) => Err(anyhow!(reason)),
        }
    }
}

pub fn target_of(url: &str) -> &str {
    let url = url.split_once("://").map_or(url, |(_, rest)| rest);
    url.split_once('?').map_or(url, |(path, _)| path)
}

impl HttpWrapper for FakeHttp {
    fn get(&mut self, url: &str, bearer: Option<&str>) -> anyhow::Result<HttpResponse> {
        self.respond("GET", url, bearer, None)
    }

    fn post(
        &mut self,
        url: &str,
        bearer: Option<&str>,
        body: String,
    ) -> anyhow::Result<HttpResponse> {
        self.respond("POST", url, bearer, Some(body))
    }

    fn new(_config: &HttpConfig) -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub sleeps: Vec<Duration>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.sleeps.iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

fn test_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

/// The test key's public half as the cloud hands it out: bare base64.
pub fn bare_public_key() -> String {
    RsaPublicKey::from(test_key())
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect()
}

pub fn decrypt(encoded: &str) -> String {
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    let plaintext = test_key().decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap();
    String::from_utf8(plaintext).unwrap()
}
