//! Async client core for the Pipedrive CRM REST API.
//!
//! # Overview
//! Saves organizations, persons and deals, moves deals between pipeline
//! stages and attaches notes to deals. Each operation is one HTTPS round
//! trip whose JSON reply is reduced to an identifier or `true`.
//!
//! # Design
//! - `Gateway` builds `HttpRequest` values and parses `HttpResponse` values
//!   without touching the network (host-does-IO pattern).
//! - `PipedriveClient` exposes `build_*` / `parse_*` pairs per operation and
//!   async wrappers that run them through a `Transport`.
//! - `ReqwestTransport` is the default transport; any `Transport` can be
//!   plugged in with `PipedriveClient::with_transport`.
//! - The API key travels as the `api_token` query parameter and is never
//!   logged.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod sanitize;
pub mod transport;
pub mod types;

pub use client::PipedriveClient;
pub use config::ClientConfig;
pub use error::{ApiError, TransportError};
pub use gateway::Gateway;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
pub use types::{EntityId, NewDeal, NewOrganization, NewPerson};
