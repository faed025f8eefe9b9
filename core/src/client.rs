//! Request builder, response normalizer and async glue for the admin API.
//!
//! # Design
//! Every call is split into a pure `build_*` step that produces an
//! `HttpRequest` and a pure `parse_*` / `normalize_response` step that
//! consumes an `HttpResponse`. The async methods only connect the two
//! through the configured `Transport`.
//!
//! Three call paths exist because the backend has three response contracts:
//! - the generic JSON path (`request`), which tolerates empty and non-JSON
//!   success bodies and reports failures as `ApiError::Request`;
//! - the token endpoint (`login`), which never carries a bearer token and
//!   reports failures as `ApiError::Login`;
//! - multipart uploads, which carry only the bearer header and report
//!   failures as `ApiError::Upload`.
//!
//! The access token is read from the `TokenStore` each time a request is
//! built. A request built before a logout keeps the token it was built with.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{ApiError, ErrorBody};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody};
use crate::payload::Payload;
use crate::storage::TokenStore;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Credentials, LoginResponse, User};

const CONTENT_TYPE: &str = "content-type";
const AUTHORIZATION: &str = "authorization";
const JSON_MIME: &str = "application/json";

/// Verb, extra headers and optional JSON body for a generic request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(body: Value) -> Self {
        Self::with_body(HttpMethod::Post, body)
    }

    pub fn patch(body: Value) -> Self {
        Self::with_body(HttpMethod::Patch, body)
    }

    pub fn put(body: Value) -> Self {
        Self::with_body(HttpMethod::Put, body)
    }

    pub fn delete() -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::get()
        }
    }

    pub fn with_body(method: HttpMethod, body: Value) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// Async client for the admin backend.
///
/// Cheap to clone when the transport is; clones share the token store.
#[derive(Clone)]
pub struct ApiClient<T = ReqwestTransport> {
    base_url: String,
    transport: T,
    tokens: Arc<dyn TokenStore>,
}

impl<T> fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient<ReqwestTransport> {
    /// Client over `reqwest` for the configured base URL.
    pub fn from_config(config: &Config, tokens: Arc<dyn TokenStore>) -> Self {
        Self::new(&config.base_url, ReqwestTransport::new(), tokens)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(base_url: &str, transport: T, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Option<String> {
        self.tokens.access_token().map(|token| format!("Bearer {token}"))
    }

    // -----------------------------------------------------------------------
    // Generic JSON path
    // -----------------------------------------------------------------------

    /// Build the envelope for a generic request.
    ///
    /// Header order: the JSON content type, then caller headers (a caller
    /// header replaces a default of the same name), then the bearer token if
    /// one is stored.
    pub fn build_request(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![(CONTENT_TYPE.to_string(), JSON_MIME.to_string())];
        for (name, value) in &options.headers {
            set_header(&mut headers, name, value);
        }
        if let Some(bearer) = self.bearer() {
            set_header(&mut headers, AUTHORIZATION, &bearer);
        }

        let body = match &options.body {
            Some(value) => Some(RequestBody::Json(
                serde_json::to_string(value).map_err(|e| ApiError::Serialize(e.to_string()))?,
            )),
            None => None,
        };

        Ok(HttpRequest {
            method: options.method,
            url: self.url(path),
            headers,
            body,
        })
    }

    /// Issue a generic request and normalize its response.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Payload, ApiError> {
        let request = self.build_request(path, &options)?;
        debug!(
            method = %request.method,
            url = %request.url,
            authenticated = request.header(AUTHORIZATION).is_some(),
            "api request"
        );
        let response = self.transport.execute(request).await?;
        normalize_response(response)
    }

    /// Issue a generic request and decode the payload into `R`.
    pub async fn request_as<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.request(path, options).await?.decode()
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Build `POST /accounts/token/`. No bearer token is attached.
    pub fn build_login(&self, username: &str, password: &str) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(&Credentials { username, password })
            .map_err(|e| ApiError::Serialize(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url("/accounts/token/"),
            headers: vec![(CONTENT_TYPE.to_string(), JSON_MIME.to_string())],
            body: Some(RequestBody::Json(body)),
        })
    }

    /// Exchange credentials for a token pair. The returned `user` is a
    /// placeholder; fetch `current_user` for the real profile.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self.build_login(username, password)?;
        debug!(url = %request.url, username, "login request");
        let response = self.transport.execute(request).await?;
        parse_login(response, username)
    }

    /// `GET /accounts/me/`.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.request_as("/accounts/me/", RequestOptions::get()).await
    }

    // -----------------------------------------------------------------------
    // Multipart path
    // -----------------------------------------------------------------------

    /// Build a multipart POST. Only the bearer header is set; the transport
    /// supplies the multipart content type and boundary.
    pub fn build_upload(&self, path: &str, form: MultipartForm) -> HttpRequest {
        let headers = self
            .bearer()
            .map(|bearer| vec![(AUTHORIZATION.to_string(), bearer)])
            .unwrap_or_default();
        HttpRequest {
            method: HttpMethod::Post,
            url: self.url(path),
            headers,
            body: Some(RequestBody::Multipart(form)),
        }
    }

    pub(crate) async fn upload(&self, path: &str, form: MultipartForm) -> Result<Value, ApiError> {
        let request = self.build_upload(path, form);
        debug!(
            url = %request.url,
            authenticated = request.header(AUTHORIZATION).is_some(),
            "upload request"
        );
        let response = self.transport.execute(request).await?;
        parse_upload(response)
    }
}

/// Serialize a typed payload into the JSON body of a request.
pub(crate) fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Serialize(e.to_string()))
}

/// Replace a header of the same name (case-insensitive) or append it.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    match headers.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value.to_string(),
        None => headers.push((name, value.to_string())),
    }
}

/// Normalize a generic-path response.
///
/// Non-2xx fails with `ApiError::Request`. Success never fails: 204 and empty
/// bodies are `Payload::Empty`, JSON is parsed, anything else is returned as
/// text.
pub fn normalize_response(response: HttpResponse) -> Result<Payload, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Request {
            status: response.status,
            status_text: response.status_text,
            body: ErrorBody::parse(&response.body),
        });
    }
    Ok(Payload::from_body(response.status, &response.body))
}

#[derive(Deserialize)]
struct TokenResponse {
    access: String,
    refresh: String,
}

/// Parse the token endpoint's response.
pub fn parse_login(response: HttpResponse, username: &str) -> Result<LoginResponse, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Login {
            status: response.status,
            body: ErrorBody::parse_json_only(&response.body),
        });
    }
    let tokens: TokenResponse =
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(LoginResponse {
        access: tokens.access,
        refresh: tokens.refresh,
        user: User::placeholder(username),
    })
}

/// Parse a multipart upload response into opaque JSON.
pub fn parse_upload(response: HttpResponse) -> Result<Value, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Upload {
            status: response.status,
            status_text: response.status_text,
            body: ErrorBody::parse(&response.body),
        });
    }
    Ok(Payload::from_body(response.status, &response.body).into_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryTokenStore, TokenPair};
    use serde_json::json;

    /// Transport that must never be reached; these tests stay on the pure
    /// build/parse functions.
    struct Unreachable;

    impl Transport for Unreachable {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
            Err(ApiError::Transport("unreachable".to_string()))
        }
    }

    fn client_with(tokens: MemoryTokenStore) -> ApiClient<Unreachable> {
        ApiClient::new("http://localhost:8000/api/", Unreachable, Arc::new(tokens))
    }

    fn anonymous() -> ApiClient<Unreachable> {
        client_with(MemoryTokenStore::new())
    }

    fn signed_in() -> ApiClient<Unreachable> {
        client_with(MemoryTokenStore::with_pair(&TokenPair {
            access: "tok-1".to_string(),
            refresh: "ref-1".to_string(),
        }))
    }

    fn response(status: u16, status_text: &str, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_request_joins_base_url_and_path() {
        let req = anonymous()
            .build_request("/admin/orders/", &RequestOptions::get())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/api/admin/orders/");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn build_request_attaches_stored_token() {
        let req = signed_in()
            .build_request("/accounts/me/", &RequestOptions::get())
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer tok-1"));
    }

    #[test]
    fn caller_headers_override_defaults() {
        let options = RequestOptions::get()
            .header("Content-Type", "text/plain")
            .header("X-Trace", "abc");
        let req = anonymous().build_request("/x/", &options).unwrap();
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.headers.len(), 2);
    }

    #[test]
    fn stored_token_wins_over_caller_authorization() {
        let options = RequestOptions::get().header("Authorization", "Bearer stale");
        let req = signed_in().build_request("/x/", &options).unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer tok-1"));
    }

    #[test]
    fn build_request_serializes_body() {
        let req = anonymous()
            .build_request("/admin/orders/5/", &RequestOptions::patch(json!({"is_paid": true})))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.body, Some(RequestBody::Json(r#"{"is_paid":true}"#.to_string())));
    }

    #[test]
    fn normalize_non_success_keeps_status_and_body() {
        let err = normalize_response(response(400, "Bad Request", r#"{"name":["required"]}"#))
            .unwrap_err();
        match err {
            ApiError::Request { status, status_text, body } => {
                assert_eq!(status, 400);
                assert_eq!(status_text, "Bad Request");
                assert_eq!(body, ErrorBody::Json(json!({"name": ["required"]})));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn normalize_html_error_page() {
        let err = normalize_response(response(502, "Bad Gateway", "<h1>502</h1>")).unwrap_err();
        assert!(err.to_string().contains("502"));
        assert_eq!(err.body(), Some(&ErrorBody::Text("<h1>502</h1>".to_string())));
    }

    #[test]
    fn build_login_has_no_bearer() {
        let req = signed_in().build_login("alice", "pw").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/api/accounts/token/");
        assert!(req.header("authorization").is_none());
        let Some(RequestBody::Json(body)) = req.body else {
            panic!("expected JSON body");
        };
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"username": "alice", "password": "pw"}));
    }

    #[test]
    fn parse_login_synthesizes_placeholder_user() {
        let login = parse_login(
            response(200, "OK", r#"{"access":"a","refresh":"r"}"#),
            "alice",
        )
        .unwrap();
        assert_eq!(login.access, "a");
        assert_eq!(login.refresh, "r");
        assert_eq!(login.user, User::placeholder("alice"));
    }

    #[test]
    fn parse_login_failure_with_text_body_is_empty() {
        let err = parse_login(response(500, "Internal Server Error", "boom"), "bob").unwrap_err();
        match err {
            ApiError::Login { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, ErrorBody::Empty);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_login_missing_tokens_is_decode_error() {
        let err = parse_login(response(200, "OK", r#"{"access":"a"}"#), "bob").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn build_upload_sets_only_bearer() {
        let req = signed_in().build_upload(
            "/catalog/admin/products/1/upload-image/",
            MultipartForm::new().text("color", "Red"),
        );
        assert_eq!(
            req.headers,
            vec![("authorization".to_string(), "Bearer tok-1".to_string())]
        );
        assert!(req.header("content-type").is_none());

        let req = anonymous().build_upload("/x/", MultipartForm::new());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn parse_upload_empty_error_body() {
        let err = parse_upload(response(500, "Internal Server Error", "")).unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(matches!(err, ApiError::Upload { status: 500, body: ErrorBody::Empty, .. }));
    }

    #[test]
    fn parse_upload_success_is_opaque_json() {
        let value = parse_upload(response(201, "Created", r#"{"id":9,"image":"/m/a.png"}"#)).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(parse_upload(response(201, "Created", "")).unwrap(), json!({}));
    }
}
