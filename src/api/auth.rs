//! Optional single-account login gate
//!
//! Sessions are opaque random tokens kept in memory with a fixed lifetime.
//! The cookie identifies the session only; it never carries file state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::server::AppState;
use crate::config::LoginConfig;
use crate::error::SheetError;

pub const SESSION_COOKIE: &str = "sheetdesk_session";

const LOGIN_HTML: &str = include_str!("static/login.html");

/// Live sessions for the configured account
pub struct SessionStore {
    login: LoginConfig,
    sessions: RwLock<HashMap<String, Instant>>,
}

impl SessionStore {
    pub fn new(login: LoginConfig) -> Self {
        Self {
            login,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn check_credentials(&self, user: &str, password: &str) -> bool {
        user == self.login.user && password == self.login.password
    }

    /// Open a session and return its token. Expired sessions are purged here.
    pub fn create(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + self.login.session_ttl);
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        let now = Instant::now();
        let expired = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            match sessions.get(token) {
                Some(expires) if *expires > now => return true,
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.revoke(token);
        }
        false
    }

    pub fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token);
    }

    pub fn active(&self) -> usize {
        let now = Instant::now();
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.values().filter(|expires| **expires > now).count()
    }
}

/// True when the gate is off or the request carries a live session
pub fn is_authorized(state: &AppState, jar: &CookieJar) -> bool {
    match &state.sessions {
        None => true,
        Some(sessions) => jar
            .get(SESSION_COOKIE)
            .map(|cookie| sessions.is_valid(cookie.value()))
            .unwrap_or(false),
    }
}

/// Middleware for the spreadsheet routes: 401 JSON without a session
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if is_authorized(&state, &jar) {
        next.run(request).await
    } else {
        SheetError::Unauthorized.into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub error: Option<String>,
}

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    if !state.login_enabled() {
        return Redirect::to("/").into_response();
    }
    let notice = if query.error.is_some() {
        r#"<p class="error">Invalid username or password</p>"#
    } else {
        ""
    };
    Html(LOGIN_HTML.replace("{{notice}}", notice)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(sessions) = &state.sessions else {
        return Redirect::to("/").into_response();
    };

    if !sessions.check_credentials(&form.username, &form.password) {
        warn!(user = %form.username, "login rejected");
        return Redirect::to("/login?error=1").into_response();
    }

    let token = sessions.create();
    info!(user = %form.username, active = sessions.active(), "login accepted");
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), Redirect::to("/")).into_response()
}

/// GET /logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let (Some(sessions), Some(cookie)) = (&state.sessions, jar.get(SESSION_COOKIE)) {
        sessions.revoke(cookie.value());
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login")).into_response()
}
