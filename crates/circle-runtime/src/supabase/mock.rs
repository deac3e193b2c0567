//! In-process stand-in for the PostgREST and auth endpoints
//!
//! Understands the subset of the REST dialect the stores send: `eq.`,
//! `ilike.`, `is.` and `in.(..)` filters, `order=<col>.desc`, `limit`,
//! `on_conflict` with the `Prefer` resolutions, PATCH and DELETE.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::SupabaseConfig;

pub const SERVICE_KEY: &str = "service-key";

type Row = Map<String, Value>;
type Params = Vec<(String, String)>;

const RESERVED: [&str; 4] = ["select", "order", "limit", "on_conflict"];

pub struct MockUser {
    pub id: String,
    pub email: String,
    pub password: String,
}

#[derive(Default)]
pub struct MockDb {
    pub tables: HashMap<String, Vec<Row>>,
    pub users: Vec<MockUser>,
    /// Sign-ups return a session instead of mailing a link
    pub autoconfirm: bool,
    /// Every REST call answers with this status while set
    pub fail_with: Option<StatusCode>,
    pub last_redirect: Option<String>,
    pub requests: usize,
}

impl MockDb {
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn seed(&mut self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    fn admit(&mut self, headers: &HeaderMap) -> Option<Response> {
        self.requests += 1;
        if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(SERVICE_KEY) {
            return Some(StatusCode::UNAUTHORIZED.into_response());
        }
        self.fail_with.map(IntoResponse::into_response)
    }
}

#[derive(Clone, Default)]
pub struct Mock(Arc<Mutex<MockDb>>);

impl Mock {
    pub fn db(&self) -> MutexGuard<'_, MockDb> {
        self.0.lock().unwrap()
    }
}

/// Serve the mock on an ephemeral local port
pub async fn start() -> (SupabaseConfig, Mock) {
    let mock = Mock::default();
    let app = Router::new()
        .route(
            "/rest/v1/{table}",
            get(select).post(insert).patch(update).delete(remove),
        )
        .route("/auth/v1/user", get(auth_user))
        .route("/auth/v1/token", post(auth_token))
        .route("/auth/v1/signup", post(auth_signup))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (SupabaseConfig::new(format!("http://{addr}"), SERVICE_KEY), mock)
}

pub fn token_for(user_id: &str) -> String {
    format!("tok-{user_id}")
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn matches(row: &Row, params: &Params) -> bool {
    params
        .iter()
        .filter(|(k, _)| !RESERVED.contains(&k.as_str()))
        .all(|(column, expr)| {
            let actual = row.get(column).map_or_else(|| "null".to_string(), cell);
            if let Some(v) = expr.strip_prefix("eq.") {
                actual == v
            } else if let Some(v) = expr.strip_prefix("ilike.") {
                actual.eq_ignore_ascii_case(v)
            } else if let Some(v) = expr.strip_prefix("is.") {
                actual == v
            } else if let Some(list) = expr.strip_prefix("in.(").and_then(|l| l.strip_suffix(')')) {
                list.split(',').any(|v| v == actual)
            } else {
                false
            }
        })
}

fn prefer(headers: &HeaderMap) -> String {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn select(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let mut db = mock.db();
    if let Some(denied) = db.admit(&headers) {
        return denied;
    }

    let mut rows: Vec<Row> = db
        .rows(&table)
        .into_iter()
        .filter(|r| matches(r, &params))
        .collect();
    if let Some(column) = param(&params, "order").and_then(|o| o.strip_suffix(".desc")) {
        rows.sort_by(|a, b| cell(&b[column]).cmp(&cell(&a[column])));
    }
    if let Some(limit) = param(&params, "limit").and_then(|l| l.parse().ok()) {
        rows.truncate(limit);
    }
    Json(rows).into_response()
}

async fn insert(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = mock.db();
    if let Some(denied) = db.admit(&headers) {
        return denied;
    }

    let prefer = prefer(&headers);
    let conflict = param(&params, "on_conflict");
    let items = match body {
        Value::Array(items) => items,
        other => vec![other],
    };

    let table = db.tables.entry(table).or_default();
    let mut out = Vec::new();
    for item in items {
        let Value::Object(mut row) = item else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        row.entry("id")
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));
        row.entry("created_at")
            .or_insert_with(|| json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)));

        let position = conflict.and_then(|column| {
            let key = row.get(column);
            table.iter().position(|r| r.get(column) == key)
        });
        match position {
            Some(_) if prefer.contains("ignore-duplicates") => {}
            Some(i) if prefer.contains("merge-duplicates") => {
                for (k, v) in row {
                    if k != "id" && k != "created_at" {
                        table[i].insert(k, v);
                    }
                }
                out.push(table[i].clone());
            }
            Some(_) => {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({"code": "23505", "message": "duplicate key"})),
                )
                    .into_response();
            }
            None => {
                table.push(row.clone());
                out.push(row);
            }
        }
    }
    (StatusCode::CREATED, Json(out)).into_response()
}

async fn update(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = mock.db();
    if let Some(denied) = db.admit(&headers) {
        return denied;
    }
    let Value::Object(changes) = body else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut out = Vec::new();
    for row in db
        .tables
        .entry(table)
        .or_default()
        .iter_mut()
        .filter(|r| matches(r, &params))
    {
        for (k, v) in &changes {
            row.insert(k.clone(), v.clone());
        }
        out.push(row.clone());
    }
    Json(out).into_response()
}

async fn remove(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let mut db = mock.db();
    if let Some(denied) = db.admit(&headers) {
        return denied;
    }
    let rows = db.tables.entry(table).or_default();
    let (removed, kept): (Vec<Row>, Vec<Row>) =
        rows.drain(..).partition(|r| matches(r, &params));
    *rows = kept;
    Json(removed).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn session(user: &MockUser) -> Value {
    json!({
        "access_token": token_for(&user.id),
        "token_type": "bearer",
        "user": {"id": user.id, "email": user.email},
    })
}

async fn auth_user(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let db = mock.db();
    let token = bearer(&headers);
    match db
        .users
        .iter()
        .find(|u| Some(token_for(&u.id)) == token)
    {
        Some(user) => Json(json!({"id": user.id, "email": user.email})).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))).into_response(),
    }
}

async fn auth_token(
    State(mock): State<Mock>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> Response {
    let db = mock.db();
    if param(&params, "grant_type") != Some("password") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match db
        .users
        .iter()
        .find(|u| body["email"] == json!(u.email) && body["password"] == json!(u.password))
    {
        Some(user) => Json(session(user)).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials",
            })),
        )
            .into_response(),
    }
}

async fn auth_signup(
    State(mock): State<Mock>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> Response {
    let mut db = mock.db();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if db.users.iter().any(|u| u.email == email) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "code": 422,
                "error_code": "user_already_exists",
                "msg": "User already registered",
            })),
        )
            .into_response();
    }

    db.last_redirect = param(&params, "redirect_to").map(str::to_string);
    let user = MockUser {
        id: Uuid::new_v4().to_string(),
        email,
        password: body["password"].as_str().unwrap_or_default().to_string(),
    };
    let reply = if db.autoconfirm {
        session(&user)
    } else {
        json!({"id": user.id, "email": user.email, "confirmation_sent_at": Utc::now()})
    };
    db.users.push(user);
    Json(reply).into_response()
}
