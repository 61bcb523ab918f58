//! In-process stand-in for the recipe backend.
//!
//! Speaks the contract the client layer assumes: a GET on the CSRF route
//! sets a `csrftoken` cookie, mutating routes demand that token back in the
//! `X-CSRFToken` header, successes carry `{"data": ...}` or `{"message":
//! ...}` and validation failures carry `{"message", "errors": {field:
//! [messages]}}`.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";
pub const MAX_AUTOCOMPLETE_MATCHES: usize = 10;
/// Oldest tokens stop being accepted once this many newer ones exist.
pub const MAX_ISSUED_TOKENS: usize = 1024;
pub const MAX_TITLE_LENGTH: usize = 256;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const UNITS: [&str; 12] = [
    "cup",
    "cups",
    "gram",
    "kilogram",
    "liter",
    "milliliter",
    "ounce",
    "pinch",
    "pound",
    "tablespoon",
    "teaspoon",
    "fluid ounce",
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: u64,
    pub title: String,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub servings: Option<f64>,
    pub equipment: Vec<Equipment>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Equipment {
    pub id: u64,
    pub description: String,
}

#[derive(Deserialize)]
pub struct Signup {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateRecipe {
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize)]
pub struct AssociateEquipment {
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct Search {
    #[serde(default)]
    pub search_term: String,
}

#[derive(Debug, Default)]
pub struct Store {
    recipes: HashMap<u64, Recipe>,
    users: HashSet<String>,
    issued_tokens: IssuedTokens,
    next_id: u64,
}

impl Store {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Tokens handed out by the CSRF route, bounded to the newest
/// `MAX_ISSUED_TOKENS`.
#[derive(Debug, Default)]
struct IssuedTokens {
    order: VecDeque<String>,
    live: HashSet<String>,
}

impl IssuedTokens {
    fn issue(&mut self, token: String) {
        if self.order.len() == MAX_ISSUED_TOKENS {
            if let Some(oldest) = self.order.pop_front() {
                self.live.remove(&oldest);
            }
        }
        self.live.insert(token.clone());
        self.order.push_back(token);
    }

    fn contains(&self, token: &str) -> bool {
        self.live.contains(token)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/api/csrf_token/", get(csrf_token))
        .route("/api/signup/", post(signup))
        .route("/api/recipe/", post(create_recipe))
        .route("/api/recipe/{id}/", get(get_recipe))
        .route("/api/recipe/{id}/equipment/", post(associate_equipment))
        .route("/api/unit_search/", get(unit_search))
        .route("/api/equipment_search/", get(equipment_search))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn csrf_token(State(db): State<Db>) -> impl IntoResponse {
    let token = Uuid::new_v4().simple().to_string();
    db.write().await.issued_tokens.issue(token.clone());
    tracing::debug!("issued CSRF token");
    (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Lax"),
        )],
    )
}

async fn signup(State(db): State<Db>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = verify_csrf(&db, &headers).await {
        return rejection;
    }
    let input: Signup = match parse_json(&body) {
        Ok(input) => input,
        Err(rejection) => return rejection,
    };

    let mut store = db.write().await;
    let mut errors = FieldErrors::default();
    let email = input.email.trim().to_lowercase();
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
    } else if !email.contains('@') {
        errors.add("email", "Enter a valid email address.");
    } else if store.users.contains(&email) {
        errors.add("email", "A user with that email already exists.");
    }
    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }
    if !errors.is_empty() {
        return errors.into_response("Your account could not be created.");
    }

    store.users.insert(email);
    (
        StatusCode::CREATED,
        Json(json!({"message": "Your account was created."})),
    )
        .into_response()
}

async fn create_recipe(State(db): State<Db>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = verify_csrf(&db, &headers).await {
        return rejection;
    }
    let input: CreateRecipe = match parse_json(&body) {
        Ok(input) => input,
        Err(rejection) => return rejection,
    };

    let title = input.title.trim();
    let mut errors = FieldErrors::default();
    if title.is_empty() {
        errors.add("title", "This field may not be blank.");
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        errors.add(
            "title",
            format!("Ensure this field has no more than {MAX_TITLE_LENGTH} characters."),
        );
    }
    if !errors.is_empty() {
        return errors.into_response("Your recipe could not be created.");
    }

    let mut store = db.write().await;
    let recipe = Recipe {
        id: store.allocate_id(),
        title: title.to_string(),
        notes: None,
        rating: None,
        servings: None,
        equipment: Vec::new(),
    };
    store.recipes.insert(recipe.id, recipe.clone());
    (StatusCode::CREATED, Json(json!({"data": recipe}))).into_response()
}

async fn get_recipe(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    match store.recipes.get(&id) {
        Some(recipe) => Json(json!({"data": recipe})).into_response(),
        None => not_found(),
    }
}

async fn associate_equipment(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = verify_csrf(&db, &headers).await {
        return rejection;
    }
    let input: AssociateEquipment = match parse_json(&body) {
        Ok(input) => input,
        Err(rejection) => return rejection,
    };

    let description = input.description.trim();
    if description.is_empty() {
        let mut errors = FieldErrors::default();
        errors.add("description", "This field may not be blank.");
        return errors.into_response("The equipment could not be added.");
    }

    let mut store = db.write().await;
    if !store.recipes.contains_key(&id) {
        return not_found();
    }
    let equipment = Equipment {
        id: store.allocate_id(),
        description: description.to_string(),
    };
    if let Some(recipe) = store.recipes.get_mut(&id) {
        recipe.equipment.push(equipment.clone());
    }
    (StatusCode::CREATED, Json(json!({"data": equipment}))).into_response()
}

async fn unit_search(Query(search): Query<Search>) -> Json<Value> {
    let matches = autocomplete(UNITS.iter().map(|unit| unit.to_string()), &search.search_term);
    Json(json!({"data": {"matches": matches}}))
}

async fn equipment_search(State(db): State<Db>, Query(search): Query<Search>) -> Json<Value> {
    let store = db.read().await;
    let known: HashSet<String> = store
        .recipes
        .values()
        .flat_map(|recipe| recipe.equipment.iter().map(|e| e.description.clone()))
        .collect();
    let matches = autocomplete(known.into_iter(), &search.search_term);
    Json(json!({"data": {"matches": matches}}))
}

/// Case-insensitive substring matches, shortest first, capped.
pub fn autocomplete(candidates: impl Iterator<Item = String>, term: &str) -> Vec<String> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }
    let mut matches: Vec<String> = candidates
        .filter(|candidate| candidate.to_lowercase().contains(&term))
        .collect();
    matches.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    matches.truncate(MAX_AUTOCOMPLETE_MATCHES);
    matches
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

async fn verify_csrf(db: &Db, headers: &HeaderMap) -> Result<(), Response> {
    let submitted = headers.get(CSRF_HEADER).and_then(|value| value.to_str().ok());
    let cookie = request_cookie(headers, CSRF_COOKIE);
    let valid = match (submitted, cookie.as_deref()) {
        (Some(submitted), Some(cookie)) if submitted == cookie => {
            db.read().await.issued_tokens.contains(submitted)
        }
        _ => false,
    };
    if valid {
        return Ok(());
    }
    tracing::info!("rejected request with missing or incorrect CSRF token");
    Err((
        StatusCode::FORBIDDEN,
        Json(json!({"detail": "CSRF Failed: CSRF token missing or incorrect."})),
    )
        .into_response())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "malformed request body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Your request could not be read."})),
        )
            .into_response()
    })
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not found."}))).into_response()
}

#[derive(Default)]
struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_response(self, message: &str) -> Response {
        tracing::debug!(fields = ?self.0.keys().collect::<Vec<_>>(), "validation failed");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": message, "errors": self.0})),
        )
            .into_response()
    }
}
