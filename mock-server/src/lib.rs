//! In-memory emulation of the device cloud API, used by the client's
//! integration tests.
//!
//! Besides the device and token endpoints it serves a few diagnostic routes:
//! `/v1/echo` reflects the request back as JSON, `/v1/slow?ms=N` answers after
//! a delay and `/v1/garbage` answers with a body that is not JSON.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, delete, get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "secret";
pub const ACCESS_TOKEN: &str = "test-token";
pub const DEVICE_ID: &str = "dev1";
pub const UNCLAIMED_DEVICE_ID: &str = "dev2";

const TOKEN_LIFETIME_SECS: u64 = 7_776_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub connected: bool,
    pub owner: Option<String>,
    pub variables: HashMap<String, Value>,
    pub functions: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenRecord {
    pub token: String,
    pub username: String,
    pub expires_in: u64,
}

#[derive(Debug, Default)]
pub struct Cloud {
    pub users: HashMap<String, String>,
    pub tokens: HashMap<String, TokenRecord>,
    pub devices: HashMap<String, Device>,
}

impl Cloud {
    /// One user with one token, one owned device and one unclaimed device.
    pub fn seeded() -> Self {
        let mut cloud = Cloud::default();
        cloud.users.insert(USERNAME.to_string(), PASSWORD.to_string());
        cloud.tokens.insert(
            ACCESS_TOKEN.to_string(),
            TokenRecord {
                token: ACCESS_TOKEN.to_string(),
                username: USERNAME.to_string(),
                expires_in: TOKEN_LIFETIME_SECS,
            },
        );
        cloud.devices.insert(
            DEVICE_ID.to_string(),
            Device {
                id: DEVICE_ID.to_string(),
                name: "lamp".to_string(),
                connected: true,
                owner: Some(USERNAME.to_string()),
                variables: HashMap::from([("temperature".to_string(), json!(21.5))]),
                functions: vec!["led".to_string(), "fail".to_string()],
            },
        );
        cloud.devices.insert(
            UNCLAIMED_DEVICE_ID.to_string(),
            Device {
                id: UNCLAIMED_DEVICE_ID.to_string(),
                name: "spare".to_string(),
                connected: false,
                owner: None,
                variables: HashMap::new(),
                functions: Vec::new(),
            },
        );
        cloud
    }
}

pub type Db = Arc<RwLock<Cloud>>;

/// A JSON error in the cloud's `{code, error, error_description}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    description: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, description: impl Into<String>) -> Self {
        Self {
            status,
            error,
            description: description.into(),
        }
    }

    fn not_found(description: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", description)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.status.as_u16(),
            "error": self.error,
            "error_description": self.description,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

pub fn app() -> Router {
    app_with(Cloud::seeded())
}

pub fn app_with(cloud: Cloud) -> Router {
    let db: Db = Arc::new(RwLock::new(cloud));
    Router::new()
        .route("/v1/devices", get(list_devices).post(claim_device))
        .route(
            "/v1/devices/{id}",
            get(get_device).put(rename_device).delete(remove_device),
        )
        .route("/v1/devices/{id}/{name}", get(get_variable).post(call_function))
        .route("/v1/access_tokens", get(list_tokens))
        .route("/v1/access_tokens/{token}", delete(delete_token))
        .route("/v1/oauth/token", post(issue_token))
        .route("/v1/echo", any(echo))
        .route("/v1/slow", get(slow))
        .route("/v1/garbage", get(garbage))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn bearer(headers: &HeaderMap, cloud: &Cloud) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    cloud
        .tokens
        .get(token)
        .map(|record| record.username.clone())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "The access token provided is invalid.",
            )
        })
}

fn basic(headers: &HeaderMap, cloud: &Cloud) -> Result<String, ApiError> {
    let rejected = || {
        ApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "Client authentication failed",
        )
    };
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or_else(rejected)?;
    let decoded = STANDARD.decode(encoded).map_err(|_| rejected())?;
    let decoded = String::from_utf8(decoded).map_err(|_| rejected())?;
    let (user, pass) = decoded.split_once(':').ok_or_else(rejected)?;
    match cloud.users.get(user) {
        Some(expected) if expected == pass => Ok(user.to_string()),
        _ => Err(rejected()),
    }
}

fn owned_device<'a>(cloud: &'a Cloud, user: &str, id: &str) -> Result<&'a Device, ApiError> {
    cloud
        .devices
        .get(id)
        .filter(|d| d.owner.as_deref() == Some(user))
        .ok_or_else(|| ApiError::not_found("no such device"))
}

fn summary(device: &Device) -> Value {
    json!({"id": device.id, "name": device.name, "connected": device.connected})
}

async fn list_devices(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    let cloud = db.read().await;
    let user = bearer(&headers, &cloud)?;
    let mut devices: Vec<&Device> = cloud
        .devices
        .values()
        .filter(|d| d.owner.as_deref() == Some(user.as_str()))
        .collect();
    devices.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(Value::Array(devices.into_iter().map(summary).collect())))
}

#[derive(Deserialize)]
pub struct ClaimForm {
    pub id: String,
}

async fn claim_device(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(input): Form<ClaimForm>,
) -> ApiResult {
    let mut cloud = db.write().await;
    let user = bearer(&headers, &cloud)?;
    let device = cloud
        .devices
        .get_mut(&input.id)
        .ok_or_else(|| ApiError::not_found("no such device"))?;
    if device.owner.as_deref().is_some_and(|owner| owner != user) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "device is claimed by someone else",
        ));
    }
    device.owner = Some(user.clone());
    Ok(Json(json!({"ok": true, "id": device.id, "user_id": user})))
}

async fn get_device(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    let cloud = db.read().await;
    let user = bearer(&headers, &cloud)?;
    let device = owned_device(&cloud, &user, &id)?;
    let mut info = summary(device);
    info["variables"] = json!(device.variables.keys().collect::<Vec<_>>());
    info["functions"] = json!(device.functions);
    Ok(Json(info))
}

#[derive(Deserialize)]
pub struct RenameForm {
    pub name: String,
}

async fn rename_device(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(input): Form<RenameForm>,
) -> ApiResult {
    let mut cloud = db.write().await;
    let user = bearer(&headers, &cloud)?;
    owned_device(&cloud, &user, &id)?;
    let device = cloud
        .devices
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found("no such device"))?;
    device.name = input.name;
    Ok(Json(json!({"id": device.id, "name": device.name})))
}

async fn remove_device(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    let mut cloud = db.write().await;
    let user = bearer(&headers, &cloud)?;
    owned_device(&cloud, &user, &id)?;
    if let Some(device) = cloud.devices.get_mut(&id) {
        device.owner = None;
    }
    Ok(Json(json!({"ok": true})))
}

async fn get_variable(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult {
    let cloud = db.read().await;
    let user = bearer(&headers, &cloud)?;
    let device = owned_device(&cloud, &user, &id)?;
    let result = device
        .variables
        .get(&name)
        .ok_or_else(|| ApiError::not_found("Variable not found"))?;
    Ok(Json(json!({"name": name, "result": result, "coreInfo": summary(device)})))
}

#[derive(Deserialize)]
pub struct FunctionForm {
    pub args: Option<String>,
}

/// `led` answers 1 for `on`, 0 for `off` and -1 otherwise; `fail` always
/// answers -1.
async fn call_function(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, name)): Path<(String, String)>,
    form: Result<Form<FunctionForm>, FormRejection>,
) -> ApiResult {
    let cloud = db.read().await;
    let user = bearer(&headers, &cloud)?;
    let device = owned_device(&cloud, &user, &id)?;
    if !device.functions.contains(&name) {
        return Err(ApiError::not_found("Function not found"));
    }
    let args = form.ok().and_then(|Form(f)| f.args);
    debug!(device = %id, function = %name, ?args, "function call");
    let return_value = match (name.as_str(), args.as_deref()) {
        ("led", Some("on")) => 1,
        ("led", Some("off")) => 0,
        _ => -1,
    };
    Ok(Json(json!({
        "id": device.id,
        "name": device.name,
        "connected": device.connected,
        "return_value": return_value,
    })))
}

async fn list_tokens(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    let cloud = db.read().await;
    let user = basic(&headers, &cloud)?;
    let mut tokens: Vec<&TokenRecord> =
        cloud.tokens.values().filter(|t| t.username == user).collect();
    tokens.sort_by(|a, b| a.token.cmp(&b.token));
    Ok(Json(json!(tokens)))
}

async fn delete_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> ApiResult {
    let mut cloud = db.write().await;
    let user = basic(&headers, &cloud)?;
    if !cloud.tokens.get(&token).is_some_and(|t| t.username == user) {
        return Err(ApiError::not_found("no such token"));
    }
    cloud.tokens.remove(&token);
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub username: String,
    pub password: String,
}

async fn issue_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(input): Form<TokenForm>,
) -> ApiResult {
    let mut cloud = db.write().await;
    basic(&headers, &cloud)?;
    if input.grant_type != "password" {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Only the password grant is supported",
        ));
    }
    if cloud.users.get(&input.username) != Some(&input.password) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "User credentials are invalid",
        ));
    }
    let token = Uuid::new_v4().simple().to_string();
    cloud.tokens.insert(
        token.clone(),
        TokenRecord {
            token: token.clone(),
            username: input.username,
            expires_in: TOKEN_LIFETIME_SECS,
        },
    );
    Ok(Json(json!({
        "token_type": "bearer",
        "access_token": token,
        "expires_in": TOKEN_LIFETIME_SECS,
    })))
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let headers: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

#[derive(Deserialize)]
pub struct SlowQuery {
    #[serde(default)]
    pub ms: u64,
}

async fn slow(Query(query): Query<SlowQuery>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(query.ms)).await;
    Json(json!({"ok": true}))
}

async fn garbage() -> &'static str {
    "not json"
}
