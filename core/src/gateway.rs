//! Request construction and response parsing shared by every operation.
//!
//! # Design
//! `Gateway` holds the base URL and API key and nothing else. It turns an
//! endpoint, method, optional JSON body and optional query pairs into an
//! `HttpRequest`, and turns an `HttpResponse` back into a `serde_json::Value`.
//! It never performs I/O.
//!
//! Query values are appended verbatim, without percent-encoding. A value
//! containing `&`, `=`, `#` or spaces changes the meaning of the URL.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, API_VERSION_PREFIX};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

#[derive(Debug, Clone)]
pub struct Gateway {
    base_url: String,
    api_key: String,
}

impl Gateway {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Full URL for `endpoint`. `api_token` is always the first query
    /// parameter; `query` pairs follow in the order given.
    pub fn url(&self, endpoint: &str, query: Option<&[(&str, &str)]>) -> String {
        let mut url = format!(
            "{}{API_VERSION_PREFIX}{endpoint}?api_token={}",
            self.base_url, self.api_key
        );
        for (key, value) in query.unwrap_or_default() {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    /// Build a request. When `body` is present it is JSON-encoded and the
    /// content headers are set; otherwise the request carries no headers.
    pub fn build_request<B>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&B>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_string).transpose()?;
        let headers = match &body {
            Some(body) => vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("content-length".to_string(), body.len().to_string()),
            ],
            None => Vec::new(),
        };
        Ok(HttpRequest {
            method,
            path: self.url(endpoint, query),
            headers,
            body,
        })
    }

    /// Parse the response body as JSON regardless of status. Pipedrive puts
    /// its failure details in the body, so the status is only logged.
    pub fn parse_body(&self, endpoint: &str, response: &HttpResponse) -> Result<Value, ApiError> {
        if !(200..300).contains(&response.status) {
            debug!(endpoint, status = response.status, "non-2xx status from Pipedrive");
        }
        serde_json::from_str(&response.body).map_err(|source| {
            warn!(endpoint, status = response.status, "Pipedrive response is not valid JSON");
            ApiError::Deserialization {
                endpoint: endpoint.to_string(),
                source,
            }
        })
    }
}
