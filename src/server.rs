//! HTTP Boundary
//!
//! Minimal sync HTTP front for the gateway, built on tiny_http. Routing is a
//! pure function ([`AuthServer::handle`]) so it can be exercised without a
//! socket; [`AuthServer::serve`] only shuttles bytes.

use crate::auth::AuthGateway;
use crate::clock::{Clock, SystemClock};
use crate::store::UserStore;
use crate::types::{AuthError, Credentials, Principal, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Read;
use tiny_http::{Header, Response, Server as TinyServer};

/// Role given to self-registered users that ask for none
pub const DEFAULT_ROLE: &str = "USER";

/// Largest request body read from the socket
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Status code and JSON body for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(err: &AuthError) -> Self {
        Self {
            status: err.status_code(),
            body: err.to_json(),
        }
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    #[serde(default)]
    roles: Vec<String>,
}

pub struct AuthServer<S: UserStore, C: Clock = SystemClock> {
    gateway: AuthGateway<S, C>,
}

impl<S: UserStore, C: Clock> AuthServer<S, C> {
    pub fn new(gateway: AuthGateway<S, C>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &AuthGateway<S, C> {
        &self.gateway
    }

    /// Route one request
    ///
    /// `path` may carry a query string; it is ignored.
    pub fn handle(
        &self,
        method: &str,
        path: &str,
        authorization: Option<&str>,
        body: &str,
    ) -> Reply {
        let path = path.split('?').next().unwrap_or(path);

        let result = match (method, path) {
            ("POST", "/api/auth/login") => self.login(body),
            ("POST", "/api/auth/register") => self.register(body),
            ("GET", "/api/auth/me") => self.me(authorization),
            _ => {
                let message = format!("No route for {} {}", method, path);
                return Reply::ok(
                    404,
                    json!({ "error": { "code": "NOT_FOUND", "message": message } }),
                );
            }
        };

        result.unwrap_or_else(|e| Reply::error(&e))
    }

    fn login(&self, body: &str) -> Result<Reply> {
        let credentials: Credentials = parse_body(body)?;
        let token = self.gateway.login(&credentials)?;
        Ok(Reply::ok(200, serde_json::to_value(token).map_err(internal)?))
    }

    fn register(&self, body: &str) -> Result<Reply> {
        let request: RegisterRequest = parse_body(body)?;
        let roles = if request.roles.is_empty() {
            vec![DEFAULT_ROLE.to_string()]
        } else {
            request.roles
        };

        let record = self
            .gateway
            .register(Credentials::new(request.username, request.password), roles)?;
        Ok(Reply::ok(
            201,
            json!({ "username": record.username, "roles": record.roles }),
        ))
    }

    fn me(&self, authorization: Option<&str>) -> Result<Reply> {
        let header = authorization.ok_or(AuthError::MissingToken)?;
        let principal: Principal = self.gateway.authorize_header(header)?;
        Ok(Reply::ok(200, serde_json::to_value(principal).map_err(internal)?))
    }

    /// Serve requests on `addr` until the listener fails
    ///
    /// Requests are handled one at a time on the calling thread.
    pub fn serve(&self, addr: &str) -> Result<()> {
        let server = TinyServer::http(addr).map_err(|e| AuthError::Internal(e.to_string()))?;
        tracing::info!(%addr, "auth server listening");

        for mut request in server.incoming_requests() {
            let method = request.method().to_string();
            let url = request.url().to_string();
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_string());

            let reply = match read_body(request.as_reader(), MAX_BODY_BYTES) {
                Ok(body) => self.handle(&method, &url, authorization.as_deref(), &body),
                Err(e) => Reply::error(&e),
            };
            tracing::debug!(%method, %url, status = reply.status, "request handled");

            let mut response =
                Response::from_string(reply.body.to_string()).with_status_code(reply.status);
            if let Ok(content_type) =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            {
                response.add_header(content_type);
            }
            if let Err(e) = request.respond(response) {
                tracing::warn!(error = %e, "failed to write response");
            }
        }

        Ok(())
    }
}

/// Read a request body of at most `limit` bytes
///
/// Stops one byte past the limit, so an oversized body is never buffered whole.
fn read_body<R: Read>(reader: R, limit: u64) -> Result<String> {
    let mut body = String::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_string(&mut body)
        .map_err(|e| AuthError::InvalidRequest(format!("unreadable body: {}", e)))?;
    if body.len() as u64 > limit {
        return Err(AuthError::PayloadTooLarge { limit });
    }
    Ok(body)
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| AuthError::InvalidRequest(e.to_string()))
}

fn internal(e: serde_json::Error) -> AuthError {
    AuthError::Internal(e.to_string())
}
