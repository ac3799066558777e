use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tera::Context;

use crate::auth::{expired_cookie, session_cookie, session_token, ATTEMPTS_SHOWN};
use crate::card::{read_card, CardRecord};
use crate::preview::PreviewModel;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct IndexQuery {
    sample: Option<String>,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> impl IntoResponse {
    let record = match query.sample.as_deref() {
        Some("1" | "true") => CardRecord::sample(chrono::Local::now().date_naive()),
        _ => CardRecord::default(),
    };

    let mut ctx = Context::new();
    ctx.insert("card", &record);
    ctx.insert("preview", &preview_model(&state, &record));
    ctx.insert("gate_enabled", &state.gate.enabled());
    render_template("index.html", ctx)
}

/// Preview fragment for the posted form; the page swaps it in on every edit.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let record = match read_card(multipart).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable preview form");
            return (e.status(), e.to_string()).into_response();
        }
    };

    let mut ctx = Context::new();
    ctx.insert("preview", &preview_model(&state, &record));
    render_template("preview.html", ctx).into_response()
}

fn preview_model(state: &AppState, record: &CardRecord) -> PreviewModel {
    let codes = state.codes.derive(&record.id_number, &record.barcode);
    PreviewModel::build(record, &codes, state.logo.as_ref())
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    password: String,
    #[serde(default)]
    attempts: u32,
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> Response {
    if !state.gate.enabled() {
        return Redirect::to("/").into_response();
    }
    login_form(0).into_response()
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.gate.enabled() {
        return Redirect::to("/").into_response();
    }

    match state.gate.verify(&form.password).await {
        Some(token) => {
            tracing::info!("login succeeded");
            (CookieJar::new().add(session_cookie(token)), Redirect::to("/")).into_response()
        }
        None => {
            let attempts = form.attempts.saturating_add(1);
            tracing::warn!(attempts, "login failed");
            (StatusCode::UNAUTHORIZED, login_form(attempts)).into_response()
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar) {
        state.gate.revoke(token);
    }
    (jar.remove(expired_cookie()), Redirect::to("/login")).into_response()
}

fn login_form(attempts: u32) -> Html<String> {
    let mut ctx = Context::new();
    ctx.insert("attempts", &attempts);
    ctx.insert("attempts_shown", &ATTEMPTS_SHOWN);
    render_template("login.html", ctx)
}

fn render_template(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera.render(name, &ctx).unwrap_or_else(|e| {
        tracing::error!(template = name, error = ?e, "template rendering failed");
        format!("Template error: {}", name)
    });
    Html(rendered)
}
