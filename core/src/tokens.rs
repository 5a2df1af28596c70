//! Access token management. Everything here authenticates with Basic
//! credentials.

use crate::builder::{build_request, segment};
use crate::client::Client;
use crate::config::ClientConfig;
use crate::credentials::{Credentials, TokenGrant};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Outcome};
use crate::operation::Operation;

impl Client {
    /// List the access tokens of the account.
    pub async fn list_tokens(&self) -> Outcome {
        self.request(Operation::get("access_tokens").basic_auth()).await
    }

    /// Exchange the stored username/password for a fresh access token, which
    /// replaces the current one.
    ///
    /// Fails with [`Error::MissingCredentials`] without sending anything when
    /// username and password are not both set.
    pub async fn generate_token(&self) -> Outcome {
        let mut credentials = self.inner.credentials.write().await;
        exchange_password(&self.inner.dispatcher, &self.inner.config, &mut credentials).await
    }

    /// Revoke `token`.
    pub async fn delete_token(&self, token: &str) -> Outcome {
        let path = format!("access_tokens/{}", segment(token));
        self.request(Operation::delete(path).basic_auth()).await
    }
}

/// OAuth password grant. On success the granted token is stored in
/// `credentials` and the raw response returned.
pub(crate) async fn exchange_password(
    dispatcher: &Dispatcher,
    config: &ClientConfig,
    credentials: &mut Credentials,
) -> Outcome {
    let (username, password) = credentials
        .basic()
        .ok_or(Error::MissingCredentials("username and password are required"))?;
    let op = Operation::post("oauth/token")
        .basic_auth()
        .form("grant_type", "password")
        .form("username", username)
        .form("password", password);

    let request = build_request(&op, credentials, config)?;
    let data = dispatcher.execute(request, config.timeout()).await?;

    let grant: TokenGrant =
        serde_json::from_value(data.clone()).map_err(|source| Error::InvalidResponse {
            body: data.to_string(),
            source,
        })?;
    credentials.store_token(grant);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_without_password_sends_nothing() {
        let config = ClientConfig::default().with_api_root("http://127.0.0.1:9");
        let client = Client::with_token("tok", config).unwrap();
        let err = client.generate_token().await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials(_)));
        assert_eq!(client.credentials().await.access_token.as_deref(), Some("tok"));
    }
}
