//! Check request building and response normalization against the JSON
//! vectors in `test-vectors/`.
//!
//! Bodies are compared as parsed JSON so key order never matters.

use std::sync::Arc;

use admin_core::{
    normalize_response, parse_login, parse_upload, ApiClient, ApiError, ErrorBody, HttpMethod,
    HttpResponse, MemoryTokenStore, Payload, ReqwestTransport, RequestBody, RequestOptions,
    TokenPair, TokenStore,
};
use serde_json::Value;

const BASE_URL: &str = "http://localhost:8000/api";

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn header_pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let pair = h.as_array().unwrap();
            (
                pair[0].as_str().unwrap().to_string(),
                pair[1].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

fn error_body(expected: &Value) -> ErrorBody {
    if expected == "empty" {
        return ErrorBody::Empty;
    }
    if let Some(json) = expected.get("json") {
        return ErrorBody::Json(json.clone());
    }
    if let Some(text) = expected.get("text") {
        return ErrorBody::Text(text.as_str().unwrap().to_string());
    }
    panic!("unknown error body: {expected}")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let store = MemoryTokenStore::new();
        if let Some(token) = case["token"].as_str() {
            store
                .store(&TokenPair {
                    access: token.to_string(),
                    refresh: "r".to_string(),
                })
                .unwrap();
        }
        let client = ApiClient::new(BASE_URL, ReqwestTransport::new(), Arc::new(store));

        let input = &case["options"];
        let options = RequestOptions {
            method: parse_method(input["method"].as_str().unwrap()),
            headers: header_pairs(&input["headers"]),
            body: (!input["body"].is_null()).then(|| input["body"].clone()),
        };
        let req = client
            .build_request(case["path"].as_str().unwrap(), &options)
            .unwrap();

        let expected = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.headers, header_pairs(&expected["headers"]), "{name}: headers");

        match (&req.body, &expected["body"]) {
            (None, Value::Null) => {}
            (Some(RequestBody::Json(body)), want) => {
                let got: Value = serde_json::from_str(body).unwrap();
                assert_eq!(&got, want, "{name}: body");
            }
            (other, want) => panic!("{name}: body {other:?} does not match {want}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            status_text: sim["status_text"].as_str().unwrap().to_string(),
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().to_string(),
        };
        let expected = &case["expected"];

        let result: Result<Payload, ApiError> = match case["path"].as_str().unwrap() {
            "request" => normalize_response(response),
            "login" => parse_login(response, "admin")
                .map(|login| Payload::Json(serde_json::json!({ "access": login.access, "refresh": login.refresh }))),
            "upload" => parse_upload(response).map(Payload::Json),
            other => panic!("{name}: unknown path {other}"),
        };

        if let Some(want) = expected.get("error") {
            let err = result.unwrap_err();
            let kind = match &err {
                ApiError::Request { .. } => "request",
                ApiError::Login { .. } => "login",
                ApiError::Upload { .. } => "upload",
                other => panic!("{name}: unexpected error {other:?}"),
            };
            assert_eq!(kind, want["kind"].as_str().unwrap(), "{name}: kind");
            assert_eq!(err.status(), want["status"].as_u64().map(|s| s as u16), "{name}: status");
            assert_eq!(err.body(), Some(&error_body(&want["body"])), "{name}: body");
            continue;
        }

        let payload = result.unwrap();
        if expected["payload"] == "empty" {
            assert_eq!(payload, Payload::Empty, "{name}: payload");
        } else if let Some(json) = expected.get("json") {
            assert_eq!(payload, Payload::Json(json.clone()), "{name}: payload");
        } else if let Some(text) = expected.get("text") {
            assert_eq!(payload, Payload::Text(text.as_str().unwrap().to_string()), "{name}: payload");
        } else {
            panic!("{name}: no expectation");
        }
    }
}
