//! Authentication material held by one client.

use std::fmt;

use serde::Deserialize;

/// Username/password and/or a bearer token.
///
/// Username and password drive the password exchange and the Basic-auth
/// endpoints; the access token authenticates everything else.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl Credentials {
    pub fn from_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }

    pub fn from_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Both halves of the Basic pair, if set.
    pub fn basic(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }

    pub(crate) fn store_token(&mut self, token: TokenGrant) {
        self.access_token = Some(token.access_token);
        self.expires_in = token.expires_in;
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("access_token", &redact(&self.access_token))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Body of a successful password exchange.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
