// In the Apple Developer portal
// - Create a Services ID with Sign in with Apple enabled
// - Register the return URL: https://your-domain/auth/callback
// Enable the Apple provider in the Firebase console.
// Set .env file
// ```.env
// api_key="your_firebase_web_api_key"
// client_id="your_services_id"
// redirect_uri="https://your-domain/auth/callback"
// ```
// finally ```cargo run --example axum_server```
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use http::StatusCode;
use tiny_apple_signin::{
    authorization::{AppleIdRequest, AuthorizationError, UnCheckedAuthorizationResponse},
    backend::FirebaseBackend,
    config::{Config, ConfigBuilder},
    csrf_token::CSRFToken,
    refresh_token::RefreshToken,
    service::{AuthService, PendingAppleSignIn},
    session::AuthState,
};
use tracing::error;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log settings
    tracing_subscriber::fmt::init();

    // Read environment
    let api_key = read_env("api_key")?;
    let client_id = read_env("client_id")?;
    let redirect_uri = read_env("redirect_uri")?;

    // Build Config
    let config = ConfigBuilder::new()
        .api_key(&api_key)
        .client_id(&client_id)
        .redirect_uri(&redirect_uri)
        .build();

    let app_state = AppState::new(&config);
    let listener = tokio::net::TcpListener::bind("0.0.0.0:80").await?;
    // '/': start Sign in with Apple
    // '/auth/callback': Apple posts the authorization result here (form_post)
    let app = Router::new()
        .route("/", get(start_auth))
        .route("/auth/callback", post(call_back))
        .route("/me", get(me))
        .route("/sign_out", post(sign_out))
        .with_state(Arc::new(app_state));

    axum::serve(listener, app).await?;
    anyhow::Ok(())
}

static COOKIE_KEY: &str = "apple_sign_in";
static SESSION_KEY: &str = "session";
// Sign-ins abandoned on the Apple page are dropped after this
const PENDING_TTL: Duration = Duration::from_secs(600);

async fn start_auth(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, StatusCode> {
    // State token for the callback, nonce for the identity token
    let state = CSRFToken::new().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut request = AppleIdRequest::new();
    let sign_in = app_state
        .service()
        .configure_apple_request(&mut request)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    request.set_state(&state);
    let url = request
        .into_url(&app_state.config)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // Cookie_Key -- Pending_Key
    //               Pending_Key -- (CSRF_Token, raw nonce, created) (in memory or redis)
    let pending_key = Uuid::new_v4().to_string();
    let now = Instant::now();
    app_state.insert_pending(
        pending_key.clone(),
        Pending {
            state,
            sign_in,
            created: now,
        },
        now,
    );

    // Apple posts back cross-site
    let cookie = Cookie::build((COOKIE_KEY, pending_key))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/auth/callback");
    Ok((jar.add(cookie), Redirect::to(&url)))
}

async fn call_back(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    body: String,
) -> Result<impl IntoResponse, StatusCode> {
    let pending_key = jar
        .get(COOKIE_KEY)
        .ok_or(StatusCode::BAD_REQUEST)?
        .value()
        .to_string();
    let pending = app_state.take_pending(&pending_key, Instant::now());

    let response = UnCheckedAuthorizationResponse::from_form(&body).map_err(|e| {
        error!("Failed to parse callback: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    let (sign_in, result) = match pending {
        Some(pending) => (Some(pending.sign_in), response.verify(&pending.state)),
        None => (None, Err(AuthorizationError::StateMismatch)),
    };
    let outcome = app_state
        .service()
        .sign_in_with_apple(sign_in, result)
        .await;

    let removal = Cookie::build(COOKIE_KEY).path("/auth/callback");
    let jar = store_session(jar.remove(removal), &outcome.state);
    Ok((jar, Json(outcome)))
}

// Restores the visitor's own session from the session cookie
async fn me(State(app_state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let state = app_state.restore_session(&jar).await;
    (store_session(jar, &state), Json(state))
}

async fn sign_out(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(SESSION_KEY).path("/")),
        StatusCode::NO_CONTENT,
    )
}

// Keeps the (possibly rotated) refresh token, or forgets it once signed out
fn store_session(jar: CookieJar, state: &AuthState) -> CookieJar {
    match state.user() {
        Some(user) => {
            let cookie = Cookie::build((SESSION_KEY, user.refresh_token().value()))
                .http_only(true)
                .secure(true)
                .same_site(SameSite::Lax)
                .path("/");
            jar.add(cookie)
        }
        None => jar.remove(Cookie::build(SESSION_KEY).path("/")),
    }
}

// Get env from .env file
fn read_env(key: &str) -> anyhow::Result<String> {
    dotenvy::var(key).context("Failed to read env")
}

struct Pending {
    state: CSRFToken,
    sign_in: PendingAppleSignIn,
    created: Instant,
}

impl Pending {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created) >= PENDING_TTL
    }
}

// No user is kept here; each request gets its own service
struct AppState {
    config: Config,
    backend: FirebaseBackend,
    pending: Mutex<HashMap<String, Pending>>,
}

impl AppState {
    fn new(config: &Config) -> Self {
        Self {
            config: config.to_owned(),
            backend: FirebaseBackend::new(config),
            pending: Mutex::default(),
        }
    }

    fn service(&self) -> AuthService<FirebaseBackend> {
        AuthService::new(&self.config, self.backend.clone())
    }

    fn insert_pending(&self, key: String, pending: Pending, now: Instant) {
        let mut map = self.pending.lock().unwrap();
        map.retain(|_, p| !p.is_expired(now));
        map.insert(key, pending);
    }

    fn take_pending(&self, key: &str, now: Instant) -> Option<Pending> {
        let pending = self.pending.lock().unwrap().remove(key);
        pending.filter(|p| !p.is_expired(now))
    }

    async fn restore_session(&self, jar: &CookieJar) -> AuthState {
        let refresh_token = jar
            .get(SESSION_KEY)
            .map(|cookie| RefreshToken::new(cookie.value()));
        self.service()
            .restore_previous_sign_in(refresh_token.as_ref())
            .await
    }
}
