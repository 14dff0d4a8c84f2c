use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, HeaderValue};

use crate::client::{ApiClient, Request, Response};
use crate::config::Settings;
use crate::error::TransportError;
use crate::operation::BodyEncoding;

pub struct HttpClient {
    base_url: String,
    api_token: Option<String>,
    client: Client,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cloudapi-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
            client,
        })
    }
}

impl ApiClient for HttpClient {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = self
            .client
            .request(request.method.into(), url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        req = apply_query(req, &request.query);
        if let Some(body) = &request.body {
            req = match body.encoding {
                BodyEncoding::Json => req.json(&body.to_json()),
                BodyEncoding::Form => req.form(&body.to_form()),
            };
        }

        let resp = req.send().map_err(TransportError::Send)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(TransportError::Read)?;
        Ok(Response { status, body })
    }
}

fn apply_query(req: RequestBuilder, query: &[(String, String)]) -> RequestBuilder {
    if query.is_empty() {
        return req;
    }
    req.query(query)
}
