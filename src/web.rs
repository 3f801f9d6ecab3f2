// Web layer - JSON API over the entity store
//
// Reads are public. Every mutating route needs a bearer token obtained from
// POST /api/login; sessions live in process memory and expire after the
// configured TTL.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use crate::entities::{
    account, aspect, hero, phase, result, villain, Aspect, Hero, HeroForm, MatchResult, Phase,
    ResultForm, Verdict, Villain, VillainForm,
};
use crate::error::StoreError;
use crate::matchups::{self, Marker, MatchupGrid, PhaseSummary, Record};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone)]
struct Session {
    account_id: i64,
    username: String,
    expires_at: DateTime<Utc>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    session_ttl: Duration,
}

impl AppState {
    pub fn new(conn: Connection, session_ttl: Duration) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            session_ttl,
        }
    }

    fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, ApiError> {
        self.sessions
            .lock()
            .map_err(|_| ApiError::Internal("session lock poisoned".to_string()))
    }

    /// Issue a token for `account`, sweeping out expired sessions first.
    fn open_session(&self, account: &account::Account) -> Result<(String, Session), ApiError> {
        let now = Utc::now();
        let token = uuid::Uuid::new_v4().to_string();
        let session = Session {
            account_id: account.id,
            username: account.username.clone(),
            expires_at: now + self.session_ttl,
        };
        let mut sessions = self.sessions()?;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session.clone());
        Ok((token, session))
    }

    /// Live session for a token; expired ones are dropped on sight.
    fn session(&self, token: &str) -> Result<Option<Session>, ApiError> {
        let mut sessions = self.sessions()?;
        match sessions.get(token) {
            Some(s) if s.expires_at > Utc::now() => Ok(Some(s.clone())),
            Some(_) => {
                sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn close_session(&self, token: &str) -> Result<(), ApiError> {
        self.sessions()?.remove(token);
        Ok(())
    }
}

// ============================================================================
// RESPONSES AND ERRORS
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            field: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(error: String, field: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            field,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    /// Input rejected before it reached the store
    Invalid { field: &'static str, message: String },
    /// Body that could not be read as the expected JSON
    Body(JsonRejection),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Body(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, field) = match self {
            ApiError::Store(e) => match &e {
                StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string(), None),
                StoreError::ConstraintViolation(v) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    v.to_string(),
                    Some(v.field().to_string()),
                ),
                StoreError::AuthenticationFailure | StoreError::AuthorizationRequired => {
                    (StatusCode::UNAUTHORIZED, e.to_string(), None)
                }
                StoreError::Storage(_) | StoreError::Credential(_) | StoreError::Import(_) => {
                    error!("request failed: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal error".to_string(),
                        None,
                    )
                }
            },
            ApiError::Invalid { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                message,
                Some(field.to_string()),
            ),
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text(), None),
            ApiError::Internal(message) => {
                error!("request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    None,
                )
            }
        };
        (status, Json(ApiResponse::err(message, field))).into_response()
    }
}

/// `Json` whose rejections come back in the `ApiResponse` envelope.
struct JsonBody<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Invalid {
            field,
            message: format!("{} is required", field),
        });
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Extractor for routes that need a logged-in account.
pub struct CurrentAccount {
    pub account_id: i64,
    pub username: String,
    token: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts).ok_or(StoreError::AuthorizationRequired)?;
        let session = state
            .session(token)?
            .ok_or(StoreError::AuthorizationRequired)?;
        Ok(CurrentAccount {
            account_id: session.account_id,
            username: session.username,
            token: token.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    username: String,
    expires_at: DateTime<Utc>,
}

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<LoginForm>,
) -> ApiResult<LoginResponse> {
    let found = {
        let conn = state.db()?;
        account::load_credentials(&conn, &form.username)?
    };
    // hashing runs off the executor and outside the database lock
    let account = tokio::task::spawn_blocking(move || {
        account::verify_credentials(found, &form.username, &form.password)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("login task failed: {}", e)))??;
    let (token, session) = state.open_session(&account)?;
    info!("'{}' logged in", account.username);

    Ok(Json(ApiResponse::ok(LoginResponse {
        token,
        username: session.username,
        expires_at: session.expires_at,
    })))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, current: CurrentAccount) -> ApiResult<&'static str> {
    state.close_session(&current.token)?;
    info!("'{}' logged out", current.username);
    Ok(Json(ApiResponse::ok("logged out")))
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

#[derive(Deserialize)]
struct NameForm {
    name: String,
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

async fn list_phases(State(state): State<AppState>) -> ApiResult<Vec<Phase>> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(phase::list(&conn)?)))
}

async fn create_phase(
    State(state): State<AppState>,
    _current: CurrentAccount,
    JsonBody(form): JsonBody<NameForm>,
) -> Result<(StatusCode, Json<ApiResponse<Phase>>), ApiError> {
    let name = required("name", &form.name)?;
    let conn = state.db()?;
    let created = phase::create(&conn, &name)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn list_aspects(State(state): State<AppState>) -> ApiResult<Vec<Aspect>> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(aspect::list(&conn)?)))
}

async fn create_aspect(
    State(state): State<AppState>,
    _current: CurrentAccount,
    JsonBody(form): JsonBody<NameForm>,
) -> Result<(StatusCode, Json<ApiResponse<Aspect>>), ApiError> {
    let name = required("name", &form.name)?;
    let conn = state.db()?;
    let created = aspect::create(&conn, &name)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

// ============================================================================
// VILLAINS
// ============================================================================

async fn list_villains(State(state): State<AppState>) -> ApiResult<Vec<Villain>> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(villain::list(&conn)?)))
}

async fn show_villain(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Villain> {
    let conn = state.db()?;
    let found = villain::get(&conn, id)?.ok_or(StoreError::not_found("villain", id))?;
    Ok(Json(ApiResponse::ok(found)))
}

async fn create_villain(
    State(state): State<AppState>,
    _current: CurrentAccount,
    JsonBody(form): JsonBody<VillainForm>,
) -> Result<(StatusCode, Json<ApiResponse<Villain>>), ApiError> {
    let form = VillainForm::new(&required("name", &form.name)?, form.phase_id);
    let conn = state.db()?;
    let created = villain::create(&conn, &form)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn update_villain(
    State(state): State<AppState>,
    _current: CurrentAccount,
    Path(id): Path<i64>,
    JsonBody(form): JsonBody<VillainForm>,
) -> ApiResult<Villain> {
    let form = VillainForm::new(&required("name", &form.name)?, form.phase_id);
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(villain::update(&conn, id, &form)?)))
}

async fn delete_villain(
    State(state): State<AppState>,
    current: CurrentAccount,
    Path(id): Path<i64>,
) -> ApiResult<i64> {
    let conn = state.db()?;
    villain::delete(&conn, id)?;
    warn!("villain {} deleted by '{}'", id, current.username);
    Ok(Json(ApiResponse::ok(id)))
}

// ============================================================================
// HEROES
// ============================================================================

async fn list_heroes(State(state): State<AppState>) -> ApiResult<Vec<Hero>> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(hero::list(&conn)?)))
}

async fn show_hero(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Hero> {
    let conn = state.db()?;
    let found = hero::get(&conn, id)?.ok_or(StoreError::not_found("hero", id))?;
    Ok(Json(ApiResponse::ok(found)))
}

async fn create_hero(
    State(state): State<AppState>,
    _current: CurrentAccount,
    JsonBody(form): JsonBody<HeroForm>,
) -> Result<(StatusCode, Json<ApiResponse<Hero>>), ApiError> {
    let form = HeroForm::new(&required("name", &form.name)?, form.phase_id, form.aspect_id);
    let conn = state.db()?;
    let created = hero::create(&conn, &form)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn update_hero(
    State(state): State<AppState>,
    _current: CurrentAccount,
    Path(id): Path<i64>,
    JsonBody(form): JsonBody<HeroForm>,
) -> ApiResult<Hero> {
    let form = HeroForm::new(&required("name", &form.name)?, form.phase_id, form.aspect_id);
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(hero::update(&conn, id, &form)?)))
}

async fn delete_hero(
    State(state): State<AppState>,
    current: CurrentAccount,
    Path(id): Path<i64>,
) -> ApiResult<i64> {
    let conn = state.db()?;
    hero::delete(&conn, id)?;
    warn!("hero {} deleted by '{}'", id, current.username);
    Ok(Json(ApiResponse::ok(id)))
}

// ============================================================================
// RESULTS AND STATS
// ============================================================================

async fn list_results(State(state): State<AppState>) -> ApiResult<Vec<MatchResult>> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(result::list(&conn)?)))
}

async fn create_result(
    State(state): State<AppState>,
    _current: CurrentAccount,
    JsonBody(form): JsonBody<ResultForm>,
) -> Result<(StatusCode, Json<ApiResponse<MatchResult>>), ApiError> {
    let conn = state.db()?;
    let created = result::create(&conn, &form)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

#[derive(Serialize)]
struct MatchupResponse {
    hero_id: i64,
    villain_id: i64,
    verdict: Option<Verdict>,
    marker: Marker,
    symbol: &'static str,
}

/// GET /api/matchups/:hero_id/:villain_id
async fn show_matchup(
    State(state): State<AppState>,
    Path((hero_id, villain_id)): Path<(i64, i64)>,
) -> ApiResult<MatchupResponse> {
    let conn = state.db()?;
    if hero::get(&conn, hero_id)?.is_none() {
        return Err(StoreError::not_found("hero", hero_id).into());
    }
    if villain::get(&conn, villain_id)?.is_none() {
        return Err(StoreError::not_found("villain", villain_id).into());
    }

    let verdict = matchups::lookup_verdict(&conn, hero_id, villain_id)?;
    let marker = matchups::render_verdict(verdict);
    Ok(Json(ApiResponse::ok(MatchupResponse {
        hero_id,
        villain_id,
        verdict,
        marker,
        symbol: marker.symbol(),
    })))
}

async fn show_grid(State(state): State<AppState>) -> ApiResult<MatchupGrid> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(matchups::matchup_grid(&conn)?)))
}

#[derive(Serialize)]
struct StatsResponse {
    phases: Vec<PhaseSummary>,
    heroes: Vec<Record>,
    villains: Vec<Record>,
}

async fn show_stats(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let conn = state.db()?;
    Ok(Json(ApiResponse::ok(StatsResponse {
        phases: matchups::phase_summaries(&conn)?,
        heroes: matchups::hero_records(&conn)?,
        villains: matchups::villain_records(&conn)?,
    })))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/phases", get(list_phases).post(create_phase))
        .route("/aspects", get(list_aspects).post(create_aspect))
        .route("/villains", get(list_villains).post(create_villain))
        .route(
            "/villains/:id",
            get(show_villain).put(update_villain).delete(delete_villain),
        )
        .route("/heroes", get(list_heroes).post(create_hero))
        .route(
            "/heroes/:id",
            get(show_hero).put(update_hero).delete(delete_hero),
        )
        .route("/results", get(list_results).post(create_result))
        .route("/matchups/:hero_id/:villain_id", get(show_matchup))
        .route("/grid", get(show_grid))
        .route("/stats", get(show_stats))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app(ttl: Duration) -> Router {
        let conn = open_in_memory().unwrap();
        account::create(&conn, "TestUser", "test@example.com", "TestPass").unwrap();
        phase::create(&conn, "Phase 1").unwrap();
        aspect::create(&conn, "Aggression").unwrap();
        router(AppState::new(conn, ttl))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login_token(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "TestUser", "password": "TestPass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Duration::minutes(5));
        let (status, body) = send(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let app = test_app(Duration::minutes(5));
        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "TestUser", "password": "BadPass"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_writes_require_login() {
        let app = test_app(Duration::minutes(5));
        let form = json!({"name": "Bob", "phase_id": 1});

        let (status, _) = send(&app, "POST", "/api/villains", None, Some(form.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            send(&app, "POST", "/api/villains", Some("not-a-token"), Some(form)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "DELETE", "/api/heroes/1", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, body) = send(&app, "GET", "/api/villains", None, None).await;
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_villain_crud() {
        let app = test_app(Duration::minutes(5));
        let token = login_token(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/villains",
            Some(&token),
            Some(json!({"name": "Bob", "phase_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(&app, "GET", &format!("/api/villains/{}", id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Bob");
        assert_eq!(body["data"]["phase"]["name"], "Phase 1");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/villains/{}", id),
            Some(&token),
            Some(json!({"name": "Rhino", "phase_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Rhino");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/villains/2",
            Some(&token),
            Some(json!({"name": "Klaw", "phase_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&app, "DELETE", &format!("/api/villains/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", &format!("/api/villains/{}", id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_constraint_violations_name_the_field() {
        let app = test_app(Duration::minutes(5));
        let token = login_token(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/heroes",
            Some(&token),
            Some(json!({"name": "Widow", "phase_id": 1, "aspect_id": 99})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "aspect_id");

        let (status, body) = send(
            &app,
            "POST",
            "/api/heroes",
            Some(&token),
            Some(json!({"name": "   ", "phase_id": 1, "aspect_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "name");

        let (status, _) = send(
            &app,
            "POST",
            "/api/phases",
            Some(&token),
            Some(json!({"name": "Phase 1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_results_matchups_and_stats() {
        let app = test_app(Duration::minutes(5));
        let token = login_token(&app).await;

        send(
            &app,
            "POST",
            "/api/heroes",
            Some(&token),
            Some(json!({"name": "Cap", "phase_id": 1, "aspect_id": 1})),
        )
        .await;
        send(
            &app,
            "POST",
            "/api/villains",
            Some(&token),
            Some(json!({"name": "Thanos", "phase_id": 1})),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/results",
            Some(&token),
            Some(json!({"hero_id": 1, "villain_id": 1, "verdict": "WIN"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["verdict"], "WIN");

        let (status, body) = send(&app, "GET", "/api/matchups/1/1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verdict"], "WIN");
        assert_eq!(body["data"]["marker"], "positive");
        assert_eq!(body["data"]["symbol"], "W");

        let (status, _) = send(&app, "GET", "/api/matchups/1/9", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, "GET", "/api/grid", None, None).await;
        assert_eq!(body["data"]["rows"][0]["cells"], json!(["WIN"]));

        let (_, body) = send(&app, "GET", "/api/stats", None, None).await;
        assert_eq!(body["data"]["heroes"][0]["wins"], 1);
        assert_eq!(body["data"]["villains"][0]["losses"], 1);
        assert_eq!(body["data"]["phases"][0]["villain_count"], 1);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = test_app(Duration::minutes(5));
        let token = login_token(&app).await;

        let (status, _) = send(&app, "POST", "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "POST",
            "/api/aspects",
            Some(&token),
            Some(json!({"name": "Justice"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_open_session_sweeps_expired_sessions() {
        let state = AppState::new(open_in_memory().unwrap(), Duration::minutes(-1));
        let account = account::Account {
            id: 1,
            username: "TestUser".to_string(),
            email: "test@example.com".to_string(),
        };

        for _ in 0..100 {
            state.open_session(&account).unwrap();
        }
        // only the session just issued survives the sweep
        assert_eq!(state.sessions().unwrap().len(), 1);

        let live = AppState {
            session_ttl: Duration::minutes(5),
            ..state.clone()
        };
        let (token, _) = live.open_session(&account).unwrap();
        let sessions = state.sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&token));
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let app = test_app(Duration::minutes(5));
        let token = login_token(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/villains",
            Some(&token),
            Some(json!({"name": "Bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("phase_id"));

        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "TestUser", "password": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);

        let request = Request::builder()
            .method("POST")
            .uri("/api/login")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let app = test_app(Duration::minutes(-1));
        let token = login_token(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/aspects",
            Some(&token),
            Some(json!({"name": "Justice"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
