//! HTTP surface of the credential self-service subsystem: `POST
//! /request-batch`, the signed-link form (`GET`/`POST /batch/:batch_id`),
//! and `DELETE /key/:provider`.
use super::email::EmailSender;
use super::model::{Batch, ProviderEntry, ProviderStatus};
use super::sign;
use super::store::BatchStore;
use crate::config::BasePaths;
use crate::credentials::{self, CredentialBundle};
use crate::manifest::Manifest;
use axum::extract::{ConnectInfo, Path as AxPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

pub struct CredsServiceState {
    pub store: BatchStore,
    pub manifest: Manifest,
    pub paths: BasePaths,
    pub sign_secret: String,
    pub bearer_secret: String,
    pub admin_email: String,
    pub link_base_url: String,
    pub email: Arc<dyn EmailSender>,
}

pub fn router(state: Arc<CredsServiceState>) -> Router {
    Router::new()
        .route("/request-batch", post(request_batch))
        .route("/batch/:batch_id", get(show_form).post(submit_form))
        .route("/key/:provider", delete(delete_key))
        .with_state(state)
}

#[derive(Deserialize)]
struct RequestBatchBody {
    providers: Vec<String>,
}

#[derive(Serialize)]
struct RequestBatchResponse {
    batch_id: String,
    providers: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Collects the requested providers that are still missing credentials,
/// creates a 24-hour batch, and emails the admin a signed link. The batch
/// is persisted only once the email send succeeds.
async fn request_batch(
    State(state): State<Arc<CredsServiceState>>,
    Json(body): Json<RequestBatchBody>,
) -> Response {
    let mut providers = Vec::new();
    for key in &body.providers {
        let Some(cloud) = state.manifest.clouds.get(key) else {
            continue;
        };
        let Ok(env_vars) = cloud.required_env_vars() else {
            continue;
        };
        if env_vars.is_empty() {
            continue;
        }
        let bundle = credentials::load_bundle(&state.paths.credential_file(key));
        if credentials::missing_required(&env_vars, &bundle).is_empty() {
            continue;
        }
        providers.push(ProviderEntry {
            key: key.clone(),
            display_name: cloud.display_name.clone(),
            env_vars,
            help_url: cloud.homepage.clone(),
            status: ProviderStatus::Pending,
        });
    }

    if providers.is_empty() {
        return (StatusCode::OK, Json(RequestBatchResponse { batch_id: String::new(), providers: Vec::new() }))
            .into_response();
    }

    let mut batch = Batch::new(providers);
    let (exp, sig) = sign::sign(&state.sign_secret, &batch.batch_id, batch.expires_at);
    let link = format!("{}/batch/{}?exp={}&sig={}", state.link_base_url, batch.batch_id, exp, sig);
    let body = format!("Credentials are needed for: {}.\n\nFill them in here: {link}\n(valid 24 hours)",
        batch.providers.iter().map(|p| p.display_name.as_str()).collect::<Vec<_>>().join(", "));

    match state.email.send_signed_link(&state.admin_email, "spawn: credentials needed", &body) {
        Ok(()) => {
            batch.emailed_at = Some(chrono::Utc::now());
            let keys: Vec<String> = batch.providers.iter().map(|p| p.key.clone()).collect();
            let batch_id = batch.batch_id.clone();
            if let Err(err) = state.store.insert(batch) {
                warn!(%err, "failed to persist credential batch after email was accepted");
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: "store_failed" })).into_response();
            }
            info!(batch_id, "emailed signed credential link");
            (StatusCode::OK, Json(RequestBatchResponse { batch_id, providers: keys })).into_response()
        }
        Err(err) => {
            warn!(%err, "failed to email credential batch link, batch not persisted");
            (StatusCode::BAD_GATEWAY, Json(ErrorBody { error: "email_failed" })).into_response()
        }
    }
}

#[derive(Deserialize)]
struct SignedLinkQuery {
    exp: i64,
    sig: String,
}

const SECURITY_HEADERS: [(&str, &str); 2] =
    [("content-security-policy", "default-src 'self'"), ("x-content-type-options", "nosniff")];

fn with_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, value.parse().expect("static header value"));
    }
    response
}

async fn show_form(
    State(state): State<Arc<CredsServiceState>>,
    AxPath(batch_id): AxPath<String>,
    Query(query): Query<SignedLinkQuery>,
) -> Response {
    if sign::verify(&state.sign_secret, &batch_id, query.exp, &query.sig, chrono::Utc::now()).is_err() {
        return with_security_headers((StatusCode::FORBIDDEN, Json(ErrorBody { error: "invalid_or_expired_link" })).into_response());
    }
    match state.store.get(&batch_id) {
        Some(batch) => with_security_headers((StatusCode::OK, Json(batch)).into_response()),
        None => with_security_headers((StatusCode::NOT_FOUND, Json(ErrorBody { error: "unknown_batch" })).into_response()),
    }
}

#[derive(Deserialize)]
struct SubmitFormBody {
    exp: i64,
    sig: String,
    /// `provider_key` -> `{ env_var_name: value }`.
    values: HashMap<String, HashMap<String, String>>,
}

/// Rejects any submitted value containing a shell metacharacter, validated
/// char-by-char against a blacklist.
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '<', '>', '\n', '\r', '\\', '"', '\''];

fn contains_shell_metacharacter(value: &str) -> bool {
    value.chars().any(|c| SHELL_METACHARACTERS.contains(&c))
}

async fn submit_form(
    State(state): State<Arc<CredsServiceState>>,
    AxPath(batch_id): AxPath<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SubmitFormBody>,
) -> Response {
    if sign::verify(&state.sign_secret, &batch_id, body.exp, &body.sig, chrono::Utc::now()).is_err() {
        return with_security_headers((StatusCode::FORBIDDEN, Json(ErrorBody { error: "invalid_or_expired_link" })).into_response());
    }
    if !state.store.allow_client(&addr.ip().to_string()) || !state.store.allow_batch(&batch_id) {
        return with_security_headers((StatusCode::TOO_MANY_REQUESTS, Json(ErrorBody { error: "rate_limited" })).into_response());
    }
    for values in body.values.values() {
        for value in values.values() {
            if contains_shell_metacharacter(value) {
                return with_security_headers(
                    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: "disallowed_characters" })).into_response(),
                );
            }
        }
    }

    let Some(mut batch) = state.store.get(&batch_id) else {
        return with_security_headers((StatusCode::NOT_FOUND, Json(ErrorBody { error: "unknown_batch" })).into_response());
    };

    let mut fulfilled = Vec::new();
    for (provider_key, submitted) in &body.values {
        if batch.try_fulfill(provider_key, submitted) {
            fulfilled.push(provider_key.clone());
        }
    }

    for provider_key in &fulfilled {
        let submitted = &body.values[provider_key];
        let mut bundle = CredentialBundle::default();
        for (var, value) in submitted {
            if let Err(err) = bundle.insert(var, value) {
                warn!(%err, provider = %provider_key, "rejecting submitted credential field");
                return with_security_headers(
                    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: "invalid_field" })).into_response(),
                );
            }
        }
        if let Err(err) = credentials::save_bundle(&state.paths.credential_file(provider_key), &bundle) {
            warn!(%err, provider = %provider_key, "failed to write credential file");
            return with_security_headers(
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: "write_failed" })).into_response(),
            );
        }
    }

    if let Err(err) = state.store.update(batch) {
        warn!(%err, "failed to persist batch after fulfillment");
        return with_security_headers((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: "store_failed" })).into_response());
    }

    with_security_headers((StatusCode::OK, Json(fulfilled)).into_response())
}

async fn delete_key(
    State(state): State<Arc<CredsServiceState>>,
    AxPath(provider): AxPath<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.bearer_secret) {
        return (StatusCode::UNAUTHORIZED, Json(ErrorBody { error: "unauthorized" })).into_response();
    }
    let path = state.paths.credential_file(&provider);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            info!(provider, "removed credential file");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(%err, provider, "failed to remove credential file");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: "delete_failed" })).into_response()
        }
    }
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(token) = header.strip_prefix("Bearer ") else {
        return false;
    };
    let expected = secret.as_bytes();
    let actual = token.as_bytes();
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}
