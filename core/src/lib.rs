//! Async API client and session core for the shop admin backend.
//!
//! # Overview
//! `ApiClient` builds `HttpRequest` values, hands them to a `Transport`, and
//! normalizes the `HttpResponse` that comes back into either a decoded
//! payload or one tagged `ApiError`. `Session` sits on top of the client and
//! tracks the logged-in user, restoring it from the persisted token pair on
//! startup.
//!
//! # Design
//! - Building and parsing are pure functions over plain-data envelopes, so
//!   every header and normalization rule is testable without a server.
//! - The access token lives in a `TokenStore` shared by the client and the
//!   session; the client re-reads it for every request it builds.
//! - Typed endpoint families (`resources`) decode into the DTOs in `types`;
//!   uploads return opaque JSON.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod payload;
pub mod report;
pub mod resources;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod upload;

pub use client::{normalize_response, parse_login, parse_upload, ApiClient, RequestOptions};
pub use config::Config;
pub use error::{ApiError, ErrorBody};
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody, UploadFile};
pub use payload::Payload;
pub use report::{filter_subscribers, subscribers_csv, DashboardSummary, SubscriberCounts};
pub use session::{Session, SessionPhase, SessionSnapshot};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::*;
pub use upload::{BlogImageUpload, ProductImageUpload};
