//! Axum routes for the update endpoint
//!
//! Routes:
//! - `GET <update path>`: Dyndns2 update (default `/nic/update`)
//! - `GET /openapi.json`: OpenAPI description of the update endpoint
//! - `GET /docs`: Human-readable API page
//!
//! This layer only translates HTTP into `UpdateHandler` calls and `Reply`
//! values back into responses. Every decision lives in dynr-core.

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Basic;
use dynr_core::handler::AuthDecision;
use dynr_core::protocol::render;
use dynr_core::{ClientCredentials, Reply, UpdateHandler, UpdateOutcome, UpdateQuery};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Challenge sent with every `badauth` reply
pub const AUTH_CHALLENGE: &str = r#"Basic realm="dynr""#;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Route settings
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Paths answering Dyndns2 updates
    pub update_paths: Vec<String>,
    /// Serve documentation without authentication
    pub public_docs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            update_paths: vec!["/nic/update".to_string()],
            public_docs: false,
        }
    }
}

#[derive(Clone)]
struct AppState {
    handler: UpdateHandler,
    public_docs: bool,
    update_paths: Arc<[String]>,
}

type BasicAuth = TypedHeader<Authorization<Basic>>;

/// Build the router for a handler
pub fn router(handler: UpdateHandler, settings: &HttpSettings) -> Router {
    let state = AppState {
        handler,
        public_docs: settings.public_docs,
        update_paths: settings.update_paths.clone().into(),
    };

    let mut router = Router::new()
        .route("/openapi.json", get(openapi))
        .route("/docs", get(docs));

    for path in &settings.update_paths {
        info!("Serving Dyndns2 updates on {}", path);
        router = router.route(path, get(update));
    }

    router.with_state(state)
}

async fn update(
    State(state): State<AppState>,
    query: Result<Query<UpdateQuery>, QueryRejection>,
    auth: Option<BasicAuth>,
    headers: HeaderMap,
) -> Response {
    let credentials = credentials(auth);

    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            if let Some(denied) = reject_unauthenticated(&state, credentials.as_ref()).await {
                return denied;
            }
            info!("Unparseable update query: {}", rejection);
            return respond(render(&UpdateOutcome::NumHost));
        }
    };

    let reply = state
        .handler
        .handle(&query, credentials, forwarded_for(&headers))
        .await;
    respond(reply)
}

async fn openapi(State(state): State<AppState>, auth: Option<BasicAuth>) -> Response {
    if let Some(denied) = guard_docs(&state, auth).await {
        return denied;
    }
    Json(openapi_document(&state.update_paths)).into_response()
}

async fn docs(State(state): State<AppState>, auth: Option<BasicAuth>) -> Response {
    if let Some(denied) = guard_docs(&state, auth).await {
        return denied;
    }
    Html(docs_page(&state.update_paths)).into_response()
}

/// Documentation is public or behind the update credentials
async fn guard_docs(state: &AppState, auth: Option<BasicAuth>) -> Option<Response> {
    if state.public_docs {
        return None;
    }
    reject_unauthenticated(state, credentials(auth).as_ref()).await
}

/// `badauth` (or `dnserr`) response unless the credentials are accepted
async fn reject_unauthenticated(
    state: &AppState,
    credentials: Option<&ClientCredentials>,
) -> Option<Response> {
    match state.handler.authenticate(credentials).await {
        AuthDecision::Granted => None,
        AuthDecision::Denied => Some(respond(render(&UpdateOutcome::BadAuth))),
        AuthDecision::Unavailable => Some(respond(render(&UpdateOutcome::DnsError))),
    }
}

fn credentials(auth: Option<BasicAuth>) -> Option<ClientCredentials> {
    auth.map(|TypedHeader(Authorization(basic))| {
        ClientCredentials::new(basic.username(), basic.password())
    })
}

/// First address of `X-Forwarded-For`, if it parses
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    match first.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            debug!("Ignoring unparseable X-Forwarded-For entry");
            None
        }
    }
}

fn respond(reply: Reply) -> Response {
    let challenge = reply.is_auth_challenge();
    let mut response = (
        reply.status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(PLAIN_TEXT))],
        reply.body,
    )
        .into_response();

    if challenge {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(AUTH_CHALLENGE),
        );
    }
    response
}

fn openapi_document(update_paths: &[String]) -> serde_json::Value {
    let reply = |description: &str| {
        json!({
            "description": description,
            "content": { "text/plain": { "schema": { "type": "string" } } }
        })
    };
    let param = |name: &str, required: bool, description: &str| {
        json!({
            "name": name,
            "in": "query",
            "required": required,
            "description": description,
            "schema": { "type": "string" }
        })
    };

    let operation = json!({
        "get": {
            "summary": "Update the address records of one or more hostnames",
            "parameters": [
                param("hostname", true, "Comma-separated fully qualified hostnames"),
                param("myip", false, "IPv4 and/or IPv6 address, comma-separated"),
                param("myip6", false, "IPv6 address"),
                param("ipv6", false, "IPv6 address (alias of myip6)"),
            ],
            "responses": {
                "200": reply("good <ip> or nochg <ip>"),
                "400": reply("numhost: malformed request"),
                "401": reply("badauth: missing or wrong credentials"),
                "403": reply("abuse: hostname is blocked"),
                "404": reply("nohost: hostname not in the allow-list"),
                "502": reply("dnserr: record store failure")
            }
        }
    });

    let paths: serde_json::Map<String, serde_json::Value> = update_paths
        .iter()
        .map(|path| (path.clone(), operation.clone()))
        .collect();

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "dynr",
            "description": "Dyndns2-compatible dynamic DNS update endpoint",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "components": {
            "securitySchemes": {
                "basicAuth": { "type": "http", "scheme": "basic" }
            }
        },
        "security": [{ "basicAuth": [] }],
        "paths": paths,
    })
}

fn docs_page(update_paths: &[String]) -> String {
    let examples: String = update_paths
        .iter()
        .map(|path| {
            format!(
                "<pre>GET {}?hostname=vpn.example.com&amp;myip=203.0.113.5\n\
                 Authorization: Basic &lt;username:password&gt;</pre>\n",
                escape_html(path)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>dynr</title></head>
<body>
<h1>dynr</h1>
<p>Dyndns2-compatible dynamic DNS update endpoint.</p>
<h2>Update</h2>
{examples}<table>
<tr><th>Reply</th><th>Status</th><th>Meaning</th></tr>
<tr><td><code>good &lt;ip&gt;</code></td><td>200</td><td>Record updated</td></tr>
<tr><td><code>nochg &lt;ip&gt;</code></td><td>200</td><td>Record already held the address</td></tr>
<tr><td><code>numhost</code></td><td>400</td><td>Malformed request</td></tr>
<tr><td><code>badauth</code></td><td>401</td><td>Missing or wrong credentials</td></tr>
<tr><td><code>abuse</code></td><td>403</td><td>Hostname is blocked</td></tr>
<tr><td><code>nohost</code></td><td>404</td><td>Hostname not in the allow-list</td></tr>
<tr><td><code>dnserr</code></td><td>502</td><td>Record store failure</td></tr>
</table>
<p>Machine-readable description: <a href="/openapi.json">/openapi.json</a></p>
</body>
</html>
"#
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
