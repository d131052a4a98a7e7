//! The I/O seam between the sans-IO gateway and the network.
//!
//! # Design
//! `Transport` takes a fully built `HttpRequest` and hands back the raw
//! `HttpResponse`. It never interprets the body; status handling and JSON
//! parsing stay in the gateway. `ReqwestTransport` is the production
//! implementation; tests substitute scripted transports.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// HTTPS transport backed by `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport. `timeout` bounds the whole request, body included.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, request.path.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body: decode_body(bytes.to_vec())?,
        })
    }
}

/// Pipedrive answers UTF-8 JSON. Invalid bytes fail the read instead of
/// being replaced, so they can never slip into a parsed string.
fn decode_body(bytes: Vec<u8>) -> Result<String, TransportError> {
    String::from_utf8(bytes).map_err(|e| TransportError::Body(format!("response is not UTF-8: {e}")))
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_builder() {
        TransportError::Setup(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}
