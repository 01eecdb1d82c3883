use crate::http_config::HttpConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpWrapper {
    // This trait decouples the library from a concrete HTTP client. The
    // binary wraps its client in a new type implementing this trait; tests
    // provide a scripted one.
    //
    // A transport failure is an `Err`. Any HTTP status, including 4xx and
    // 5xx, is an `Ok` and left for the caller to judge.

    fn get(&mut self, url: &str, bearer: Option<&str>) -> anyhow::Result<HttpResponse>;

    fn post(&mut self, url: &str, bearer: Option<&str>, body: String)
        -> anyhow::Result<HttpResponse>;

    fn new(config: &HttpConfig) -> Self;
}
