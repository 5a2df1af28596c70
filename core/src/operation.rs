//! Caller-side description of one API call, before HTTP encoding.

use std::time::Duration;

use crate::http::HttpMethod;

/// Which credential authenticates the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    Basic,
    #[default]
    Bearer,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Key/value pairs, form-urlencoded by the builder.
    Form(Vec<(String, String)>),
    /// Already encoded; sent unchanged.
    Raw(String),
}

/// One logical call: path relative to the versioned API prefix plus
/// everything needed to encode it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub headers: Vec<(String, String)>,
    pub auth_mode: AuthMode,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl Operation {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a form field, turning a raw body into a form if needed.
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let pair = (key.into(), value.into());
        match &mut self.body {
            Some(Body::Form(pairs)) => pairs.push(pair),
            _ => self.body = Some(Body::Form(vec![pair])),
        }
        self
    }

    pub fn raw_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(Body::Raw(body.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(mut self) -> Self {
        self.auth_mode = AuthMode::Basic;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_bearer_get() {
        let op = Operation::default();
        assert_eq!(op.method, HttpMethod::Get);
        assert_eq!(op.auth_mode, AuthMode::Bearer);
        assert!(op.body.is_none());
        assert!(op.timeout.is_none());
    }

    #[test]
    fn form_fields_accumulate() {
        let op = Operation::post("devices").form("a", "1").form("b", "2");
        assert_eq!(
            op.body,
            Some(Body::Form(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]))
        );
    }

    #[test]
    fn form_replaces_raw_body() {
        let op = Operation::post("x").raw_body("payload").form("k", "v");
        assert_eq!(
            op.body,
            Some(Body::Form(vec![("k".to_string(), "v".to_string())]))
        );
    }
}
