use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "ausweis_session";
/// Shown as the denominator of the attempt counter. Nothing locks out.
pub const ATTEMPTS_SHOWN: u32 = 3;

/// Optional password gate in front of the form. Sessions live in memory
/// and end with the process.
pub struct AccessGate {
    password: Option<String>,
    delay: Duration,
    sessions: Mutex<HashSet<String>>,
}

impl AccessGate {
    pub fn new(password: Option<String>, delay: Duration) -> Self {
        Self {
            password,
            delay,
            sessions: Mutex::new(HashSet::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Checks a password after the configured delay. Returns a new session
    /// token on success.
    pub async fn verify(&self, attempt: &str) -> Option<String> {
        let expected = self.password.as_deref()?;
        tokio::time::sleep(self.delay).await;
        if !constant_time_eq(attempt.as_bytes(), expected.as_bytes()) {
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.sessions().insert(token.clone());
        Some(token)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.sessions().contains(token)
    }

    pub fn revoke(&self, token: &str) {
        self.sessions().remove(token);
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(Cookie::value)
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

/// Removal cookie; the path has to match the one the session was set with.
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

fn is_public(path: &str) -> bool {
    path == "/login" || path.starts_with("/static/")
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let gate = &state.gate;
    if !gate.enabled() || is_public(request.uri().path()) {
        return next.run(request).await;
    }
    let jar = CookieJar::from_headers(request.headers());
    match session_token(&jar) {
        Some(token) if gate.is_valid(token) => next.run(request).await,
        _ => Redirect::to("/login").into_response(),
    }
}
