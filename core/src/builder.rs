//! Turns an [`Operation`] plus the client's credentials into an
//! [`HttpRequest`]. No I/O happens here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::{ClientConfig, API_PREFIX};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::operation::{AuthMode, Body, Operation};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Build the request for `op`.
///
/// Caller headers are merged last and replace any computed header with the
/// same (case-insensitive) name, including `Authorization`.
pub fn build_request(
    op: &Operation,
    credentials: &Credentials,
    config: &ClientConfig,
) -> Result<HttpRequest> {
    let mut headers = Vec::new();

    headers.push(("Authorization".to_string(), authorization(op.auth_mode, credentials)?));
    headers.push((
        "User-Agent".to_string(),
        op.user_agent.clone().unwrap_or_else(|| config.user_agent.clone()),
    ));

    let body = op.body.as_ref().map(encode_body);
    if op.method != HttpMethod::Get {
        if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
            let content_type = op.content_type.as_deref().unwrap_or(FORM_CONTENT_TYPE);
            headers.push(("Content-Type".to_string(), content_type.to_string()));
            headers.push(("Content-Length".to_string(), body.len().to_string()));
        }
    }

    for (name, value) in &op.headers {
        match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(existing) => *existing = (name.clone(), value.clone()),
            None => headers.push((name.clone(), value.clone())),
        }
    }

    Ok(HttpRequest {
        method: op.method,
        host: config.api_root.trim_end_matches('/').to_string(),
        path: resolve_path(&op.path, &op.query),
        headers,
        body: body.filter(|b| !b.is_empty()),
    })
}

fn authorization(mode: AuthMode, credentials: &Credentials) -> Result<String> {
    match mode {
        AuthMode::Basic => {
            let (user, pass) = credentials
                .basic()
                .ok_or(Error::MissingCredentials("username and password are required"))?;
            Ok(format!("Basic {}", STANDARD.encode(format!("{user}:{pass}"))))
        }
        // An absent token is sent as-is and left for the server to reject.
        AuthMode::Bearer => Ok(format!(
            "Bearer {}",
            credentials.access_token.as_deref().unwrap_or_default()
        )),
    }
}

fn resolve_path(path: &str, query: &[(String, String)]) -> String {
    let mut resolved = format!("{API_PREFIX}/{}", path.trim_start_matches('/'));
    if !query.is_empty() {
        resolved.push('?');
        resolved.push_str(&encode_pairs(query));
    }
    resolved
}

fn encode_body(body: &Body) -> String {
    match body {
        Body::Form(pairs) => encode_pairs(pairs),
        Body::Raw(raw) => raw.clone(),
    }
}

/// `k=v&k=v`, both sides percent-encoded.
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode one caller-supplied path segment.
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::default().with_api_root("http://localhost:3000")
    }

    fn token() -> Credentials {
        Credentials::from_token("tok")
    }

    fn decode_pairs(encoded: &str) -> Vec<(String, String)> {
        encoded
            .split('&')
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap();
                (
                    urlencoding::decode(k).unwrap().into_owned(),
                    urlencoding::decode(v).unwrap().into_owned(),
                )
            })
            .collect()
    }

    #[test]
    fn get_without_body_has_no_content_headers() {
        let req = build_request(&Operation::get("devices"), &token(), &config()).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.host, "http://localhost:3000");
        assert_eq!(req.path, "/v1/devices");
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
        assert!(req.header("content-length").is_none());
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        assert_eq!(req.header("user-agent"), Some(config().user_agent.as_str()));
    }

    #[test]
    fn post_form_sets_content_headers() {
        let op = Operation::post("devices/abc/led").form("args", "on");
        let req = build_request(&op, &token(), &config()).unwrap();
        assert_eq!(req.body.as_deref(), Some("args=on"));
        assert_eq!(req.header("content-type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(req.header("content-length"), Some("7"));
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let op = Operation::put("devices/abc").raw_body("name=café");
        let req = build_request(&op, &token(), &config()).unwrap();
        assert_eq!(req.body.as_deref(), Some("name=café"));
        assert_eq!(req.header("content-length"), Some("10"));
    }

    #[test]
    fn post_without_body_has_no_content_headers() {
        let req = build_request(&Operation::post("devices/abc/reset"), &token(), &config()).unwrap();
        assert!(req.body.is_none());
        assert!(req.header("content-length").is_none());
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn content_type_override() {
        let op = Operation::post("x")
            .raw_body(r#"{"a":1}"#)
            .content_type("application/json");
        let req = build_request(&op, &token(), &config()).unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn caller_headers_win() {
        let op = Operation::post("x")
            .form("a", "b")
            .header("content-length", "999")
            .header("authorization", "Custom xyz")
            .header("X-Extra", "1");
        let req = build_request(&op, &token(), &config()).unwrap();
        assert_eq!(req.header("Content-Length"), Some("999"));
        assert_eq!(req.header("Authorization"), Some("Custom xyz"));
        assert_eq!(req.header("x-extra"), Some("1"));
        let auth_count = req
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("authorization"))
            .count();
        assert_eq!(auth_count, 1);
    }

    #[test]
    fn user_agent_override() {
        let op = Operation::get("devices").user_agent("custom/1.0");
        let req = build_request(&op, &token(), &config()).unwrap();
        assert_eq!(req.header("user-agent"), Some("custom/1.0"));
    }

    #[test]
    fn basic_auth_encodes_username_and_password() {
        let creds = Credentials::from_password("user", "pass");
        let req = build_request(&Operation::get("access_tokens").basic_auth(), &creds, &config())
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn basic_auth_without_password_fails() {
        let creds = Credentials {
            username: Some("user".to_string()),
            ..Credentials::default()
        };
        let err = build_request(&Operation::get("access_tokens").basic_auth(), &creds, &config())
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredentials(_)));
    }

    #[test]
    fn missing_bearer_token_is_passed_through() {
        let req = build_request(&Operation::get("devices"), &Credentials::default(), &config())
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer "));
    }

    #[test]
    fn query_round_trips() {
        let op = Operation::get("devices").query("a", "1").query("b", "two words");
        let req = build_request(&op, &token(), &config()).unwrap();
        let (path, query) = req.path.split_once('?').unwrap();
        assert_eq!(path, "/v1/devices");
        assert_eq!(
            decode_pairs(query),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two words".to_string()),
            ]
        );
    }

    #[test]
    fn trailing_slash_on_api_root_is_ignored() {
        let config = ClientConfig {
            api_root: "http://localhost:3000/".to_string(),
            ..ClientConfig::default()
        };
        let req = build_request(&Operation::get("devices"), &token(), &config).unwrap();
        assert_eq!(req.url(), "http://localhost:3000/v1/devices");
    }

    #[test]
    fn leading_slash_in_path_is_tolerated() {
        let req = build_request(&Operation::get("/devices"), &token(), &config()).unwrap();
        assert_eq!(req.path, "/v1/devices");
    }

    #[test]
    fn segment_escapes_reserved_characters() {
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
