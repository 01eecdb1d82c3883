use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use synk2ha::{
    http_config::HttpConfig,
    http_wrapper::{HttpResponse, HttpWrapper},
};

pub struct ReqwestWrapper {
    client: Client,
}

impl ReqwestWrapper {
    fn send(request: RequestBuilder, bearer: Option<&str>) -> anyhow::Result<HttpResponse> {
        let request = match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpWrapper for ReqwestWrapper {
    fn get(&mut self, url: &str, bearer: Option<&str>) -> anyhow::Result<HttpResponse> {
        Self::send(
            self.client.get(url).header(CONTENT_TYPE, "application/json"),
            bearer,
        )
    }

    fn post(
        &mut self,
        url: &str,
        bearer: Option<&str>,
        body: String,
    ) -> anyhow::Result<HttpResponse> {
        Self::send(
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body),
            bearer,
        )
    }

    fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .danger_accept_invalid_certs(config.accept_invalid_certs.is_some_and(|v| v))
            .build()
            .expect("could not build HTTP client");
        Self { client }
    }
}
