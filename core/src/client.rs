//! Pipedrive client: the five entity operations on top of the gateway.
//!
//! # Design
//! Every operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`,
//! exactly like the gateway itself. The async method of the same name wires
//! the two around one `Transport::execute` call. Hosts that do their own I/O
//! can use the `build_*`/`parse_*` pair directly.
//!
//! Create endpoints succeed iff the body has `data.id`. Update endpoints
//! succeed iff the body is an object with `"success": true`. Any other body
//! is an error carrying the serialized response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError};
use crate::gateway::Gateway;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::sanitize::sanitize_message;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    DealPayload, DealStageUpdate, EntityId, IdentifierResponse, NewDeal, NewNote, NewOrganization,
    NewPerson, SuccessResponse,
};

const ORGANIZATIONS: &str = "/organizations";
const PERSONS: &str = "/persons";
const DEALS: &str = "/deals";
const NOTES: &str = "/notes";

/// Stateless Pipedrive client.
///
/// Holds the gateway, the deal message field key and a transport. Nothing
/// is mutated between calls, so a client can be shared across tasks.
#[derive(Debug, Clone)]
pub struct PipedriveClient<T = ReqwestTransport> {
    gateway: Gateway,
    deal_message_field: String,
    transport: T,
}

impl PipedriveClient<ReqwestTransport> {
    /// Client for the production API with default settings.
    pub fn new(api_key: &str) -> Result<Self, TransportError> {
        Self::from_config(ClientConfig::new(api_key))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T> PipedriveClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            gateway: Gateway::new(&config),
            deal_message_field: config.deal_message_field,
            transport,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn build_save_organization(&self, org: &NewOrganization) -> Result<HttpRequest, ApiError> {
        self.gateway
            .build_request(ORGANIZATIONS, HttpMethod::Post, Some(org), None)
    }

    pub fn build_save_person(&self, person: &NewPerson) -> Result<HttpRequest, ApiError> {
        self.gateway
            .build_request(PERSONS, HttpMethod::Post, Some(person), None)
    }

    /// A non-empty message is sanitized and stored under the configured
    /// custom field key. An empty one is left out entirely.
    pub fn build_save_deal(&self, deal: &NewDeal) -> Result<HttpRequest, ApiError> {
        let mut custom_fields = BTreeMap::new();
        if let Some(message) = deal.message.as_deref().filter(|m| !m.is_empty()) {
            custom_fields.insert(self.deal_message_field.as_str(), sanitize_message(message));
        }
        let payload = DealPayload {
            deal,
            custom_fields,
        };
        self.gateway
            .build_request(DEALS, HttpMethod::Post, Some(&payload), None)
    }

    pub fn build_move_deal_to_stage(
        &self,
        deal_id: EntityId,
        stage_id: EntityId,
    ) -> Result<HttpRequest, ApiError> {
        let update = DealStageUpdate { stage_id };
        self.gateway
            .build_request(&deal_endpoint(deal_id), HttpMethod::Put, Some(&update), None)
    }

    pub fn build_add_note_to_deal(
        &self,
        deal_id: EntityId,
        content: &str,
    ) -> Result<HttpRequest, ApiError> {
        let note = NewNote {
            content: content.to_string(),
            deal_id,
        };
        self.gateway
            .build_request(NOTES, HttpMethod::Post, Some(&note), None)
    }

    pub fn parse_save_organization(&self, response: &HttpResponse) -> Result<EntityId, ApiError> {
        let body = self.gateway.parse_body(ORGANIZATIONS, response)?;
        expect_identifier(ORGANIZATIONS, &body)
    }

    pub fn parse_save_person(&self, response: &HttpResponse) -> Result<EntityId, ApiError> {
        let body = self.gateway.parse_body(PERSONS, response)?;
        expect_identifier(PERSONS, &body)
    }

    pub fn parse_save_deal(&self, response: &HttpResponse) -> Result<EntityId, ApiError> {
        let body = self.gateway.parse_body(DEALS, response)?;
        expect_identifier(DEALS, &body)
    }

    pub fn parse_move_deal_to_stage(
        &self,
        deal_id: EntityId,
        response: &HttpResponse,
    ) -> Result<bool, ApiError> {
        let body = self.gateway.parse_body(&deal_endpoint(deal_id), response)?;
        expect_success("move deal", &body)
    }

    pub fn parse_add_note_to_deal(&self, response: &HttpResponse) -> Result<bool, ApiError> {
        let body = self.gateway.parse_body(NOTES, response)?;
        expect_success("add note", &body)
    }
}

impl<T: Transport> PipedriveClient<T> {
    /// Issue an arbitrary request and return the parsed JSON body.
    ///
    /// `method` is matched case-insensitively against GET, POST and PUT.
    /// `query` pairs are appended after `api_token` without URL encoding.
    pub async fn send<B>(
        &self,
        endpoint: &str,
        method: &str,
        body: Option<&B>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let method: HttpMethod = method.parse()?;
        let request = self.gateway.build_request(endpoint, method, body, query)?;
        let response = self.execute(endpoint, request).await?;
        self.gateway.parse_body(endpoint, &response)
    }

    pub async fn save_organization(&self, org: &NewOrganization) -> Result<EntityId, ApiError> {
        let request = self.build_save_organization(org)?;
        let response = self.execute(ORGANIZATIONS, request).await?;
        self.parse_save_organization(&response)
    }

    pub async fn save_person(&self, person: &NewPerson) -> Result<EntityId, ApiError> {
        let request = self.build_save_person(person)?;
        let response = self.execute(PERSONS, request).await?;
        self.parse_save_person(&response)
    }

    pub async fn save_deal(&self, deal: &NewDeal) -> Result<EntityId, ApiError> {
        let request = self.build_save_deal(deal)?;
        let response = self.execute(DEALS, request).await?;
        self.parse_save_deal(&response)
    }

    pub async fn move_deal_to_stage(
        &self,
        deal_id: EntityId,
        stage_id: EntityId,
    ) -> Result<bool, ApiError> {
        let request = self.build_move_deal_to_stage(deal_id, stage_id)?;
        let response = self.execute(&deal_endpoint(deal_id), request).await?;
        self.parse_move_deal_to_stage(deal_id, &response)
    }

    pub async fn add_note_to_deal(&self, deal_id: EntityId, content: &str) -> Result<bool, ApiError> {
        let request = self.build_add_note_to_deal(deal_id, content)?;
        let response = self.execute(NOTES, request).await?;
        self.parse_add_note_to_deal(&response)
    }

    async fn execute(&self, endpoint: &str, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        // `request.path` carries the API token, so only the endpoint is logged.
        debug!(method = %request.method, endpoint, "sending Pipedrive request");
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|source| {
                warn!(endpoint, error = %source, "Pipedrive request failed");
                ApiError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                }
            })?;
        debug!(endpoint, status = response.status, "received Pipedrive response");
        Ok(response)
    }
}

fn deal_endpoint(deal_id: EntityId) -> String {
    format!("{DEALS}/{deal_id}")
}

fn expect_identifier(endpoint: &str, body: &Value) -> Result<EntityId, ApiError> {
    match IdentifierResponse::deserialize(body) {
        Ok(parsed) => Ok(parsed.data.id),
        Err(_) => {
            warn!(endpoint, "Pipedrive response has no data.id");
            Err(ApiError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                response: body.to_string(),
            })
        }
    }
}

fn expect_success(action: &'static str, body: &Value) -> Result<bool, ApiError> {
    match SuccessResponse::deserialize(body) {
        Ok(SuccessResponse { success: true }) => Ok(true),
        _ => {
            warn!(action, "Pipedrive did not report success");
            Err(ApiError::Rejected {
                action,
                response: body.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::DEFAULT_DEAL_MESSAGE_FIELD;

    /// Transport that records every request and replays one scripted reply.
    struct StubTransport {
        reply: Result<HttpResponse, String>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        fn replying(body: &str) -> Self {
            Self {
                reply: Ok(HttpResponse::ok(body)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            match &self.reply {
                Ok(response) => Ok(response.clone()),
                Err(message) => Err(TransportError::Connection(message.clone())),
            }
        }
    }

    fn client(transport: StubTransport) -> PipedriveClient<StubTransport> {
        let config = ClientConfig::new("secret").with_base_url("https://api.example.com");
        PipedriveClient::with_transport(config, transport)
    }

    fn sent_body(transport: &StubTransport) -> Value {
        let request = transport.last_request();
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Organization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_organization_returns_data_id() {
        let c = client(StubTransport::replying(r#"{"success":true,"data":{"id":101,"name":"Acme"}}"#));
        let org = NewOrganization {
            name: "Acme".to_string(),
            owner_id: Some(9),
        };
        assert_eq!(c.save_organization(&org).await.unwrap(), 101);

        let request = c.transport().last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "https://api.example.com/v1/organizations?api_token=secret");
        assert_eq!(sent_body(c.transport()), serde_json::json!({ "name": "Acme", "owner_id": 9 }));
    }

    #[tokio::test]
    async fn save_organization_rejects_null() {
        let c = client(StubTransport::replying("null"));
        let org = NewOrganization {
            name: "Acme".to_string(),
            owner_id: None,
        };
        let err = c.save_organization(&org).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse { .. }));
        let message = err.to_string();
        assert!(message.contains("/organizations"), "{message}");
        assert!(message.ends_with("null"), "{message}");
    }

    // -----------------------------------------------------------------------
    // Person
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_person_with_only_name_sends_only_name() {
        let c = client(StubTransport::replying(r#"{"success":true,"data":{"id":5}}"#));
        let person = NewPerson {
            name: "Grace".to_string(),
            ..Default::default()
        };
        assert_eq!(c.save_person(&person).await.unwrap(), 5);
        assert_eq!(sent_body(c.transport()), serde_json::json!({ "name": "Grace" }));
    }

    #[tokio::test]
    async fn save_person_sends_every_present_field() {
        let c = client(StubTransport::replying(r#"{"data":{"id":6}}"#));
        let person = NewPerson {
            name: "Grace".to_string(),
            email: Some("grace@example.com".to_string()),
            phone: Some("+1 555 0100".to_string()),
            owner_id: Some(2),
            org_id: Some(101),
        };
        c.save_person(&person).await.unwrap();
        assert_eq!(
            sent_body(c.transport()),
            serde_json::json!({
                "name": "Grace",
                "email": "grace@example.com",
                "phone": "+1 555 0100",
                "owner_id": 2,
                "org_id": 101
            })
        );
    }

    #[tokio::test]
    async fn save_person_missing_id_embeds_response() {
        let c = client(StubTransport::replying(r#"{"success":false,"error":"bad"}"#));
        let person = NewPerson {
            name: "Grace".to_string(),
            ..Default::default()
        };
        let message = c.save_person(&person).await.unwrap_err().to_string();
        assert!(message.contains("/persons"), "{message}");
        assert!(message.contains(r#""error":"bad""#), "{message}");
    }

    // -----------------------------------------------------------------------
    // Deal
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_deal_sanitizes_message_into_custom_field() {
        let c = client(StubTransport::replying(r#"{"data":{"id":77}}"#));
        let deal = NewDeal {
            title: "Renewal".to_string(),
            user_id: Some(1),
            person_id: Some(5),
            org_id: Some(101),
            stage_id: Some(3),
            message: Some("He said \u{201C}hi\u{201D}\u{7}".to_string()),
        };
        assert_eq!(c.save_deal(&deal).await.unwrap(), 77);

        let body = sent_body(c.transport());
        assert_eq!(body[DEFAULT_DEAL_MESSAGE_FIELD], "He said hi");
        assert_eq!(body["title"], "Renewal");
        assert_eq!(body["user_id"], 1);
        assert_eq!(body["person_id"], 5);
        assert_eq!(body["org_id"], 101);
        assert_eq!(body["stage_id"], 3);
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn save_deal_without_message_has_no_custom_field() {
        let c = client(StubTransport::replying(r#"{"data":{"id":78}}"#));
        let deal = NewDeal {
            title: "Plain".to_string(),
            ..Default::default()
        };
        c.save_deal(&deal).await.unwrap();
        assert_eq!(sent_body(c.transport()), serde_json::json!({ "title": "Plain" }));
    }

    #[tokio::test]
    async fn save_deal_with_empty_message_has_no_custom_field() {
        let c = client(StubTransport::replying(r#"{"data":{"id":79}}"#));
        let deal = NewDeal {
            title: "T".to_string(),
            message: Some(String::new()),
            ..Default::default()
        };
        c.save_deal(&deal).await.unwrap();
        assert_eq!(sent_body(c.transport()), serde_json::json!({ "title": "T" }));
    }

    #[tokio::test]
    async fn save_organization_omits_zero_owner() {
        let c = client(StubTransport::replying(r#"{"data":{"id":1}}"#));
        let org = NewOrganization {
            name: "A".to_string(),
            owner_id: Some(0),
        };
        c.save_organization(&org).await.unwrap();
        assert_eq!(sent_body(c.transport()), serde_json::json!({ "name": "A" }));
    }

    #[tokio::test]
    async fn save_deal_uses_configured_field_key() {
        let config = ClientConfig::new("secret").with_deal_message_field("custom_key");
        let c = PipedriveClient::with_transport(config, StubTransport::replying(r#"{"data":{"id":1}}"#));
        let deal = NewDeal {
            title: "T".to_string(),
            message: Some("note".to_string()),
            ..Default::default()
        };
        c.save_deal(&deal).await.unwrap();
        assert_eq!(sent_body(c.transport())["custom_key"], "note");
    }

    #[tokio::test]
    async fn save_deal_rejects_string_id() {
        let c = client(StubTransport::replying(r#"{"data":{"id":"abc"}}"#));
        let deal = NewDeal {
            title: "T".to_string(),
            ..Default::default()
        };
        let err = c.save_deal(&deal).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse { ref endpoint, .. } if endpoint == "/deals"));
    }

    // -----------------------------------------------------------------------
    // Stage move and notes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn move_deal_to_stage_puts_stage_id() {
        let c = client(StubTransport::replying(r#"{"success":true,"data":{"id":42}}"#));
        assert!(c.move_deal_to_stage(42, 7).await.unwrap());

        let request = c.transport().last_request();
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.path, "https://api.example.com/v1/deals/42?api_token=secret");
        assert_eq!(sent_body(c.transport()), serde_json::json!({ "stage_id": 7 }));
    }

    #[tokio::test]
    async fn move_deal_to_stage_rejects_success_false() {
        let c = client(StubTransport::replying(r#"{"success":false}"#));
        let err = c.move_deal_to_stage(42, 7).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { action: "move deal", .. }));
        assert_eq!(err.to_string(), r#"could not move deal: {"success":false}"#);
    }

    #[tokio::test]
    async fn move_deal_to_stage_rejects_malformed_bodies() {
        for body in ["null", "[]", "17", r#"{"data":{}}"#, r#"{"success":"true"}"#] {
            let c = client(StubTransport::replying(body));
            let err = c.move_deal_to_stage(1, 2).await.unwrap_err();
            assert!(matches!(err, ApiError::Rejected { .. }), "{body}: {err:?}");
        }
    }

    #[tokio::test]
    async fn add_note_to_deal_posts_content_and_deal() {
        let c = client(StubTransport::replying(r#"{"success":true,"data":{"id":900}}"#));
        assert!(c.add_note_to_deal(42, "Called the client").await.unwrap());

        let request = c.transport().last_request();
        assert_eq!(request.path, "https://api.example.com/v1/notes?api_token=secret");
        assert_eq!(
            sent_body(c.transport()),
            serde_json::json!({ "content": "Called the client", "deal_id": 42 })
        );
    }

    #[tokio::test]
    async fn add_note_to_deal_rejects_missing_success() {
        let c = client(StubTransport::replying(r#"{"data":{"id":900}}"#));
        let message = c.add_note_to_deal(42, "x").await.unwrap_err().to_string();
        assert_eq!(message, r#"could not add note: {"data":{"id":900}}"#);
    }

    // -----------------------------------------------------------------------
    // Failures shared by every operation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transport_error_propagates_from_every_operation() {
        let c = client(StubTransport::failing("ECONNRESET"));
        let org = NewOrganization {
            name: "Acme".to_string(),
            owner_id: None,
        };
        let person = NewPerson {
            name: "Grace".to_string(),
            ..Default::default()
        };
        let deal = NewDeal {
            title: "T".to_string(),
            ..Default::default()
        };

        let errors = vec![
            c.save_organization(&org).await.unwrap_err(),
            c.save_person(&person).await.unwrap_err(),
            c.save_deal(&deal).await.unwrap_err(),
            c.move_deal_to_stage(1, 2).await.map(|_| ()).unwrap_err(),
            c.add_note_to_deal(1, "n").await.map(|_| ()).unwrap_err(),
        ];
        for err in errors {
            match &err {
                ApiError::Transport { source, .. } => {
                    assert!(matches!(source, TransportError::Connection(m) if m == "ECONNRESET"));
                }
                other => panic!("expected transport error, got {other:?}"),
            }
            assert!(err.to_string().contains("ECONNRESET"), "{err}");
        }
    }

    #[tokio::test]
    async fn invalid_json_is_a_deserialization_error() {
        let c = client(StubTransport::replying("<html>502</html>"));
        let err = c.add_note_to_deal(1, "n").await.unwrap_err();
        assert!(matches!(err, ApiError::Deserialization { ref endpoint, .. } if endpoint == "/notes"));
    }

    // -----------------------------------------------------------------------
    // Raw gateway access
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn send_normalizes_method_and_appends_query() {
        let c = client(StubTransport::replying(r#"{"success":true,"data":[]}"#));
        let value = c
            .send::<Value>("/deals", "get", None, Some(&[("start", "0"), ("limit", "10")]))
            .await
            .unwrap();
        assert_eq!(value["success"], true);

        let request = c.transport().last_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.path.ends_with("&start=0&limit=10"), "{}", request.path);
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn send_rejects_unknown_method_without_io() {
        let c = client(StubTransport::replying("{}"));
        let err = c.send::<Value>("/deals", "patch", None, None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidMethod(_)));
        assert!(c.transport().requests.lock().unwrap().is_empty());
    }
}
