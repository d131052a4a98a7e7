//! In-memory stand-in for the Pipedrive endpoints the client talks to.
//!
//! Every route checks the `api_token` query parameter and answers with
//! Pipedrive's `{"success": ..., "data"|"error": ...}` envelope. Records are
//! stored as raw JSON objects so custom fields survive untouched.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;

pub type Reply = (StatusCode, Json<Value>);

type Params = Query<HashMap<String, String>>;

#[derive(Debug, Default)]
struct Store {
    last_id: u64,
    organizations: BTreeMap<u64, Map<String, Value>>,
    persons: BTreeMap<u64, Map<String, Value>>,
    deals: BTreeMap<u64, Map<String, Value>>,
    notes: BTreeMap<u64, Map<String, Value>>,
}

#[derive(Debug, Clone, Copy)]
enum Table {
    Organizations,
    Persons,
    Deals,
    Notes,
}

impl Store {
    fn table_mut(&mut self, table: Table) -> &mut BTreeMap<u64, Map<String, Value>> {
        match table {
            Table::Organizations => &mut self.organizations,
            Table::Persons => &mut self.persons,
            Table::Deals => &mut self.deals,
            Table::Notes => &mut self.notes,
        }
    }

    /// Assign the next id, store the record and return it with its id.
    fn insert(&mut self, table: Table, mut record: Map<String, Value>) -> Value {
        self.last_id += 1;
        let id = self.last_id;
        record.insert("id".to_string(), json!(id));
        self.table_mut(table).insert(id, record.clone());
        Value::Object(record)
    }
}

/// Shared handle to the accepted token and the stored records.
#[derive(Clone, Debug)]
pub struct AppState {
    api_token: Arc<str>,
    store: Arc<RwLock<Store>>,
}

impl AppState {
    pub fn new(api_token: &str) -> Self {
        Self {
            api_token: Arc::from(api_token),
            store: Arc::default(),
        }
    }

    pub async fn deal(&self, id: u64) -> Option<Value> {
        let store = self.store.read().await;
        store.deals.get(&id).cloned().map(Value::Object)
    }

    pub async fn person(&self, id: u64) -> Option<Value> {
        let store = self.store.read().await;
        store.persons.get(&id).cloned().map(Value::Object)
    }

    pub async fn organization(&self, id: u64) -> Option<Value> {
        let store = self.store.read().await;
        store.organizations.get(&id).cloned().map(Value::Object)
    }

    pub async fn notes_for_deal(&self, deal_id: u64) -> Vec<Value> {
        let store = self.store.read().await;
        store
            .notes
            .values()
            .filter(|note| note.get("deal_id") == Some(&json!(deal_id)))
            .cloned()
            .map(Value::Object)
            .collect()
    }

    fn authorize(&self, params: &HashMap<String, String>) -> Result<(), Reply> {
        match params.get("api_token") {
            Some(token) if token.as_str() == &*self.api_token => Ok(()),
            _ => Err(failure(StatusCode::UNAUTHORIZED, "unauthorized")),
        }
    }
}

pub fn app(api_token: &str) -> Router {
    app_with_state(AppState::new(api_token))
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/v1/organizations", post(create_organization))
        .route("/v1/persons", post(create_person))
        .route("/v1/deals", get(list_deals).post(create_deal))
        .route("/v1/deals/{id}", get(get_deal).put(update_deal))
        .route("/v1/notes", post(create_note))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn created(data: Value) -> Reply {
    (StatusCode::CREATED, Json(json!({ "success": true, "data": data })))
}

fn ok(data: Value) -> Reply {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

fn failure(status: StatusCode, error: &str) -> Reply {
    (status, Json(json!({ "success": false, "error": error })))
}

fn require_str(record: &Map<String, Value>, field: &str, error: &str) -> Result<(), Reply> {
    match record.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(failure(StatusCode::BAD_REQUEST, error)),
    }
}

async fn create_organization(
    State(state): State<AppState>,
    Query(params): Params,
    Json(body): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    require_str(&body, "name", "Name must be given.")?;
    let data = state.store.write().await.insert(Table::Organizations, body);
    Ok(created(data))
}

async fn create_person(
    State(state): State<AppState>,
    Query(params): Params,
    Json(body): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    require_str(&body, "name", "Name must be given.")?;
    let data = state.store.write().await.insert(Table::Persons, body);
    Ok(created(data))
}

async fn create_deal(
    State(state): State<AppState>,
    Query(params): Params,
    Json(body): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    require_str(&body, "title", "Title must be given.")?;
    let data = state.store.write().await.insert(Table::Deals, body);
    Ok(created(data))
}

async fn list_deals(State(state): State<AppState>, Query(params): Params) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    let start = params.get("start").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(100);
    let store = state.store.read().await;
    let deals: Vec<Value> = store
        .deals
        .values()
        .skip(start)
        .take(limit)
        .cloned()
        .map(Value::Object)
        .collect();
    Ok(ok(Value::Array(deals)))
}

async fn get_deal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(params): Params,
) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    state
        .deal(id)
        .await
        .map(ok)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Deal not found"))
}

async fn update_deal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(params): Params,
    Json(body): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    let mut store = state.store.write().await;
    let deal = store
        .deals
        .get_mut(&id)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Deal not found"))?;
    for (key, value) in body {
        if key != "id" {
            deal.insert(key, value);
        }
    }
    Ok(ok(Value::Object(deal.clone())))
}

async fn create_note(
    State(state): State<AppState>,
    Query(params): Params,
    Json(body): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    state.authorize(&params)?;
    require_str(&body, "content", "Content must be given.")?;
    let mut store = state.store.write().await;
    let deal_exists = body
        .get("deal_id")
        .and_then(Value::as_u64)
        .is_some_and(|id| store.deals.contains_key(&id));
    if !deal_exists {
        return Err(failure(StatusCode::NOT_FOUND, "Deal not found"));
    }
    let data = store.insert(Table::Notes, body);
    Ok(created(data))
}
