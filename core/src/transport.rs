//! Network execution of `HttpRequest` values.
//!
//! # Design
//! `ApiClient` never talks to the network directly. It hands a fully built
//! `HttpRequest` to a `Transport` and normalizes the `HttpResponse` it gets
//! back. The production transport wraps `reqwest`; tests plug in canned
//! transports to exercise normalization without sockets.
//!
//! A transport reports a response for every status code. Only failures that
//! produce no response at all become `ApiError::Transport`.

use std::future::Future;

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, PartValue, RequestBody};

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ApiError>> + Send;
}

/// `Transport` backed by a shared `reqwest::Client`.
///
/// No timeout is configured; requests run until the transport's own
/// defaults give up.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self.client.request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Json(text)) => builder.body(text),
            Some(RequestBody::Multipart(form)) => builder.multipart(to_reqwest_form(form)?),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        // An unreadable body is treated as empty, same as a missing one.
        let body = response.text().await.unwrap_or_default();

        debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            "response received"
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<Form, ApiError> {
    let mut out = Form::new();
    for part in form.parts {
        out = match part.value {
            PartValue::Text(text) => out.text(part.name, text),
            PartValue::File(file) => {
                let body = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.content_type)
                    .map_err(|e| ApiError::Serialize(e.to_string()))?;
                out.part(part.name, body)
            }
        };
    }
    Ok(out)
}
