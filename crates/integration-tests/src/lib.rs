//! Integration tests for the ad console.
//!
//! Everything runs in-process. [`MockBackend`] serves the advertising REST
//! API from memory and records every call it receives; [`TestConsole`]
//! serves the console against it on an ephemeral port and drives it with a
//! cookie-keeping client that does not follow redirects.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ad-console-integration-tests
//! ```
//!
//! # Fixture
//!
//! [`fixture`] seeds three users:
//!
//! | username | password   | role        | accounts                          |
//! |----------|------------|-------------|-----------------------------------|
//! | `a`      | `b`        | user        | 7 (ad operator), 9 (site admin)   |
//! | `root`   | `rootpw`   | super-admin | 7 (site admin)                    |
//! | `viewer` | `viewerpw` | user        | none                              |
//!
//! Account 7 holds plans "Spring sale" and "Summer launch" and the groups
//! "Brand" (bound to "Spring sale") and "Dormant" (empty). Account 9 holds
//! the plan "Autumn promo".

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use ad_console::api::{ApiClient, NEW_TOKEN_HEADER};
use ad_console::config::ConsoleConfig;
use ad_console::state::AppState;
use ad_console_core::{
    Account, AccountId, AccountRole, AdGroup, AdGroupId, AdPlan, AdPlanId, ManagedUser, Role,
    UserId, UserProfile,
};

type Shared = Arc<Mutex<MockData>>;

// =============================================================================
// Mock data
// =============================================================================

/// A backend user and their password.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub profile: UserProfile,
    pub password: String,
    pub ban: bool,
}

/// One request as the mock backend saw it. Paths are relative to `/api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

impl RecordedCall {
    /// Value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// State behind the mock backend.
#[derive(Debug, Default)]
pub struct MockData {
    pub users: Vec<MockUser>,
    /// Live bearer tokens.
    pub tokens: HashMap<String, UserId>,
    /// Accounts visible to each user.
    pub accounts: HashMap<UserId, Vec<Account>>,
    pub ad_plans: Vec<(AccountId, AdPlan)>,
    pub ad_groups: Vec<(AccountId, AdGroup)>,
    pub calls: Vec<RecordedCall>,
    /// Rotate the caller's token to this value on the next authenticated
    /// success.
    pub rotate_token: Option<String>,
    /// Answer the next request with `success: false` and this message.
    pub reject_next: Option<String>,
    issued: u32,
    last_id: i64,
}

impl MockData {
    pub fn add_user(&mut self, profile: UserProfile, password: &str) {
        self.users.push(MockUser {
            profile,
            password: password.to_string(),
            ban: false,
        });
    }

    /// Issue the next token (`t1`, `t2`, ...) for `user`.
    pub fn issue_token(&mut self, user: UserId) -> String {
        self.issued += 1;
        let token = format!("t{}", self.issued);
        self.tokens.insert(token.clone(), user);
        token
    }

    /// Names of the plans stored for `account`.
    #[must_use]
    pub fn plan_names(&self, account: AccountId) -> Vec<String> {
        self.ad_plans
            .iter()
            .filter(|(owner, _)| *owner == account)
            .map(|(_, plan)| plan.name.clone())
            .collect()
    }

    #[must_use]
    pub fn has_group(&self, id: AdGroupId) -> bool {
        self.ad_groups.iter().any(|(_, group)| group.id == id)
    }

    fn profile(&self, id: UserId) -> Option<UserProfile> {
        self.users
            .iter()
            .find(|u| u.profile.id == id)
            .map(|u| u.profile.clone())
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<UserProfile, Response> {
        bearer(headers)
            .and_then(|token| self.tokens.get(token))
            .and_then(|id| self.profile(*id))
            .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "token expired"))
    }

    fn next_id(&mut self) -> i64 {
        self.last_id = self.last_id.max(1000) + 1;
        self.last_id
    }
}

/// A profile as the backend returns it.
#[must_use]
pub fn profile(id: i64, username: &str, name: &str, role: Role) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        name: name.to_string(),
        username: Some(username.to_string()),
        email: None,
        role,
        avatar: None,
    }
}

/// An account with the given role for the viewing user.
#[must_use]
pub fn account(id: i64, name: &str, role: Option<AccountRole>) -> Account {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "balance": "1000",
        "daily_budget": "100",
        "today_cost": "0",
    }))
    .map(|account: Account| Account {
        user_role: role,
        ..account
    })
    .expect("account fixture")
}

#[must_use]
pub fn plan(id: i64, name: &str) -> AdPlan {
    serde_json::from_value(json!({ "id": id, "name": name, "budget": "500" }))
        .expect("plan fixture")
}

#[must_use]
pub fn group(id: i64, name: &str, plans: Vec<AdPlan>) -> AdGroup {
    AdGroup {
        id: AdGroupId::new(id),
        name: name.to_string(),
        ad_plans: plans,
    }
}

/// The standard data set described in the crate docs.
#[must_use]
pub fn fixture() -> MockData {
    let mut data = MockData::default();
    data.add_user(profile(1, "a", "A", Role::User), "b");
    data.add_user(profile(2, "root", "Root", Role::SuperAdmin), "rootpw");
    data.add_user(profile(3, "viewer", "Viewer", Role::User), "viewerpw");

    data.accounts.insert(
        UserId::new(1),
        vec![
            account(7, "North", Some(AccountRole::AdOperator)),
            account(9, "South", Some(AccountRole::SiteAdmin)),
        ],
    );
    data.accounts.insert(
        UserId::new(2),
        vec![account(7, "North", Some(AccountRole::SiteAdmin))],
    );

    let north = AccountId::new(7);
    data.ad_plans = vec![
        (north, plan(100, "Spring sale")),
        (north, plan(101, "Summer launch")),
        (AccountId::new(9), plan(200, "Autumn promo")),
    ];
    data.ad_groups = vec![
        (north, group(300, "Brand", vec![plan(100, "Spring sale")])),
        (north, group(301, "Dormant", Vec::new())),
    ];
    data
}

// =============================================================================
// Mock backend
// =============================================================================

/// The advertising backend, in memory.
pub struct MockBackend {
    data: Shared,
    addr: SocketAddr,
}

impl MockBackend {
    pub async fn start(data: MockData) -> Self {
        let data = Arc::new(Mutex::new(data));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let app = router(Arc::clone(&data));
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Self { data, addr }
    }

    /// REST root, e.g. `http://127.0.0.1:40123/api`.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// A console API client pointed at this backend.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.api_url(), Duration::from_secs(5)).expect("api client")
    }

    pub fn data(&self) -> MutexGuard<'_, MockData> {
        lock(&self.data)
    }

    /// Recorded calls matching `method` and `path`.
    #[must_use]
    pub fn calls(&self, method: &str, path: &str) -> Vec<RecordedCall> {
        self.data()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .cloned()
            .collect()
    }
}

fn lock(data: &Shared) -> MutexGuard<'_, MockData> {
    data.lock().expect("mock backend state")
}

fn router(data: Shared) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/validate-token", post(validate_token))
        .route("/users/accounts", get(my_accounts))
        .route("/home", get(home))
        .route("/admin/account", get(account_overview))
        .route("/ad-plans", get(list_plans).post(create_plan))
        .route("/ad-plans/{id}", delete(delete_plan))
        .route("/ad-plans/ad-groups", get(list_groups).post(create_group))
        .route("/ad-plans/ad-groups/{id}", delete(delete_group))
        .route("/ad-plans/ad-groups/{id}/plans", post(bind_plans))
        .route("/ad-creatives", get(list_creatives))
        .route("/admin/users", get(list_users));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(Arc::clone(&data), record))
        .with_state(data)
}

/// Record the call, apply a queued rejection, rotate the token if asked.
async fn record(State(data): State<Shared>, request: Request, next: Next) -> Response {
    let call = RecordedCall {
        method: request.method().to_string(),
        path: request
            .uri()
            .path()
            .trim_start_matches("/api")
            .to_string(),
        query: request.uri().query().map(str::to_string),
    };
    let token = bearer(request.headers()).map(str::to_string);

    let rejection = {
        let mut data = lock(&data);
        data.calls.push(call);
        data.reject_next.take()
    };
    if let Some(message) = rejection {
        return rejected(&message);
    }

    let mut response = next.run(request).await;
    if response.status().is_success()
        && let Some(old) = token
    {
        let mut data = lock(&data);
        if let Some(new) = data.rotate_token.take() {
            if let Some(user) = data.tokens.remove(&old) {
                data.tokens.insert(new.clone(), user);
            }
            if let Ok(value) = HeaderValue::from_str(&new) {
                response.headers_mut().insert(NEW_TOKEN_HEADER, value);
            }
        }
    }
    response
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn ok(data: impl Serialize) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

fn rejected(message: &str) -> Response {
    Json(json!({ "success": false, "message": message })).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(data): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let mut data = lock(&data);
    let user = data
        .users
        .iter()
        .find(|u| {
            u.profile.username.as_deref() == Some(body.username.as_str())
                && u.password == body.password
                && !u.ban
        })
        .map(|u| u.profile.clone());
    let Some(user) = user else {
        return rejected("invalid username or password");
    };
    let token = data.issue_token(user.id);
    ok(json!({ "token": token, "userInfo": user }))
}

async fn logout(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let mut data = lock(&data);
    if let Some(token) = bearer(&headers) {
        data.tokens.remove(token);
    }
    ok(Value::Null)
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

async fn validate_token(State(data): State<Shared>, Json(body): Json<TokenBody>) -> Response {
    let data = lock(&data);
    match data
        .tokens
        .get(&body.token)
        .and_then(|id| data.profile(*id))
    {
        Some(user) => ok(json!({ "valid": true, "userInfo": user })),
        None => ok(json!({ "valid": false })),
    }
}

async fn my_accounts(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let data = lock(&data);
    match data.authorize(&headers) {
        Ok(user) => ok(data.accounts.get(&user.id).cloned().unwrap_or_default()),
        Err(response) => response,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParams {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
    name: Option<String>,
    #[serde(rename = "accountId")]
    account_id: Option<i64>,
}

impl ListParams {
    fn account(&self) -> Option<AccountId> {
        self.account_id.map(AccountId::new)
    }
}

impl MockData {
    /// One of the user's accounts.
    fn user_account(&self, user: UserId, account: Option<AccountId>) -> Option<Account> {
        self.accounts
            .get(&user)
            .and_then(|accounts| accounts.iter().find(|a| Some(a.id) == account))
            .cloned()
    }
}

async fn home(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let data = lock(&data);
    let user = match data.authorize(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let account = data.user_account(user.id, params.account());
    let plans: Vec<&AdPlan> = data
        .ad_plans
        .iter()
        .filter(|(owner, _)| Some(*owner) == params.account())
        .map(|(_, plan)| plan)
        .collect();
    ok(json!({ "account": account, "adPlans": plans, "adCreatives": [] }))
}

async fn account_overview(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let data = lock(&data);
    let user = match data.authorize(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match data.user_account(user.id, params.account()) {
        Some(account) => ok(account),
        None => failure(StatusCode::NOT_FOUND, "account not found"),
    }
}

async fn list_plans(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let keyword = params.name.clone().unwrap_or_default();
    let matching: Vec<&AdPlan> = data
        .ad_plans
        .iter()
        .filter(|(owner, plan)| Some(*owner) == params.account() && plan.name.contains(&keyword))
        .map(|(_, plan)| plan)
        .collect();

    let page = params.page.unwrap_or(1).max(1);
    let size = params.page_size.unwrap_or(20).max(1);
    let items: Vec<&AdPlan> = matching
        .iter()
        .skip(((page - 1) * size) as usize)
        .take(size as usize)
        .copied()
        .collect();
    ok(json!({
        "ad_plans": items,
        "pagination": { "total": matching.len(), "page": page, "pageSize": size },
    }))
}

fn body_account(body: &Value) -> Option<AccountId> {
    body.get("accountId")
        .and_then(Value::as_i64)
        .map(AccountId::new)
}

async fn create_plan(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let mut data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let Some(account) = body_account(&body) else {
        return failure(StatusCode::BAD_REQUEST, "accountId is required");
    };
    body["id"] = json!(data.next_id());
    let plan: AdPlan = match serde_json::from_value(body) {
        Ok(plan) => plan,
        Err(e) => return failure(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    data.ad_plans.push((account, plan.clone()));
    ok(json!({ "ad_plan": plan }))
}

async fn delete_plan(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let id = AdPlanId::new(id);
    data.ad_plans.retain(|(_, plan)| plan.id != id);
    ok(Value::Null)
}

async fn list_groups(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let groups: Vec<&AdGroup> = data
        .ad_groups
        .iter()
        .filter(|(owner, _)| Some(*owner) == params.account())
        .map(|(_, group)| group)
        .collect();
    ok(json!({ "ad_groups": groups }))
}

async fn create_group(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let (Some(account), Some(name)) = (body_account(&body), body.get("name").and_then(Value::as_str))
    else {
        return failure(StatusCode::BAD_REQUEST, "name and accountId are required");
    };
    let created = group(data.next_id(), name, Vec::new());
    data.ad_groups.push((account, created.clone()));
    ok(json!({ "ad_group": created }))
}

async fn delete_group(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let id = AdGroupId::new(id);
    data.ad_groups.retain(|(_, group)| group.id != id);
    ok(Value::Null)
}

#[derive(Deserialize)]
struct BindBody {
    #[serde(rename = "planIds")]
    plan_ids: Vec<AdPlanId>,
}

async fn bind_plans(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<BindBody>,
) -> Response {
    let mut data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    let plans: Vec<AdPlan> = data
        .ad_plans
        .iter()
        .filter(|(_, plan)| body.plan_ids.contains(&plan.id))
        .map(|(_, plan)| plan.clone())
        .collect();
    let id = AdGroupId::new(id);
    match data.ad_groups.iter_mut().find(|(_, group)| group.id == id) {
        Some((_, group)) => {
            group.bind_plans(plans);
            ok(Value::Null)
        }
        None => failure(StatusCode::NOT_FOUND, "ad group not found"),
    }
}

async fn list_creatives(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let data = lock(&data);
    if let Err(response) = data.authorize(&headers) {
        return response;
    }
    ok(json!({ "ad_creatives": [], "pagination": { "total": 0 } }))
}

async fn list_users(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let data = lock(&data);
    let user = match data.authorize(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if user.role != Role::SuperAdmin {
        return failure(StatusCode::FORBIDDEN, "forbidden");
    }
    let users: Vec<ManagedUser> = data
        .users
        .iter()
        .map(|u| ManagedUser {
            id: u.profile.id,
            username: u.profile.username.clone().unwrap_or_default(),
            name: Some(u.profile.name.clone()),
            email: u.profile.email.clone(),
            role: u.profile.role,
            ban: u.ban,
        })
        .collect();
    ok(users)
}

// =============================================================================
// Console under test
// =============================================================================

/// Console configuration pointed at `api_base_url`.
#[must_use]
pub fn console_config(api_base_url: &str) -> ConsoleConfig {
    ConsoleConfig {
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: Url::parse("http://127.0.0.1").expect("base url"),
        api_base_url: Url::parse(api_base_url).expect("api base url"),
        api_timeout: Duration::from_secs(5),
        page_size: 20,
        title: "Ad Console".to_string(),
        feature_admin: true,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
        tls: None,
    }
}

/// A running console and the backend behind it.
pub struct TestConsole {
    pub backend: MockBackend,
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestConsole {
    /// Start against [`fixture`] data.
    pub async fn start() -> Self {
        Self::with_data(fixture()).await
    }

    pub async fn with_data(data: MockData) -> Self {
        let backend = MockBackend::start(data).await;
        let state = AppState::new(console_config(&backend.api_url())).expect("console state");
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind console");
        let addr = listener.local_addr().expect("console address");
        let app = ad_console::app(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client");
        Self {
            backend,
            addr,
            client,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    /// GET a page that must render, returning its body.
    pub async fn page(&self, path: &str) -> String {
        let response = self.get(path).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK, "GET {path}");
        response.text().await.expect("response body")
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> reqwest::Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.client
            .post(self.url(path))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .expect("POST request")
    }

    /// Log in and land on `/`.
    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_form(
            "/login",
            &[("username", username), ("password", password), ("next", "/")],
        )
        .await
    }
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()
}
