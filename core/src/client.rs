//! The cloud client: owns the credentials, the configuration and the
//! dispatcher, and funnels every operation through [`Client::request`].
//!
//! # Design
//! Credentials sit behind a `tokio::sync::RwLock`. A client constructed from
//! username/password takes the write guard before returning and hands it to
//! the background password exchange, so every operation issued meanwhile
//! waits for the exchange and then sees the new token.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::builder::build_request;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::dispatch::{Dispatcher, PendingCall};
use crate::error::{Error, Outcome, Result};
use crate::operation::Operation;
use crate::tokens::exchange_password;

/// Asynchronous client for the device cloud API.
///
/// Cheap to clone; clones share credentials and the connection settings.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) inner: Arc<Inner>,
}

#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) credentials: Arc<RwLock<Credentials>>,
    pub(crate) config: ClientConfig,
    pub(crate) dispatcher: Dispatcher,
}

impl Client {
    /// A client authenticating with an existing access token.
    pub fn with_token(access_token: impl Into<String>, config: ClientConfig) -> Result<Self> {
        Self::new(Credentials::from_token(access_token), config)
    }

    /// A client that trades `username`/`password` for an access token in
    /// the background.
    ///
    /// Operations issued before the exchange finishes wait for it. If the
    /// exchange fails the error is logged and the client carries on without
    /// a token. Fails with [`Error::NoRuntime`] outside a Tokio runtime.
    pub fn with_password(
        username: impl Into<String>,
        password: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(Error::NoRuntime)?;
        let client = Self::new(Credentials::from_password(username, password), config)?;

        let Ok(mut guard) = Arc::clone(&client.inner.credentials).try_write_owned() else {
            unreachable!("a freshly created lock has no other holders");
        };
        let dispatcher = client.inner.dispatcher.clone();
        let config = client.inner.config.clone();
        runtime.spawn(async move {
            match exchange_password(&dispatcher, &config, &mut guard).await {
                Ok(_) => info!("password exchange completed"),
                Err(e) => error!(error = %e, "password exchange failed"),
            }
        });

        Ok(client)
    }

    /// A client over explicit credentials; no exchange is started.
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                credentials: Arc::new(RwLock::new(credentials)),
                config,
                dispatcher: Dispatcher::new()?,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Snapshot of the current credentials.
    pub async fn credentials(&self) -> Credentials {
        self.inner.credentials.read().await.clone()
    }

    /// Build and dispatch `op`, resolving to its single outcome.
    ///
    /// A missing Basic credential fails here without any I/O.
    pub async fn request(&self, op: Operation) -> Outcome {
        let request = {
            let credentials = self.inner.credentials.read().await;
            build_request(&op, &credentials, &self.inner.config)?
        };
        let deadline = op.timeout.unwrap_or_else(|| self.inner.config.timeout());
        self.inner.dispatcher.execute(request, deadline).await
    }

    /// Dispatch `op` in the background and return a handle to its outcome.
    pub fn send(&self, op: Operation) -> PendingCall {
        let client = self.clone();
        PendingCall::spawn(async move { client.request(op).await })
    }

    /// Dispatch `op` in the background and hand the outcome to `callback`.
    pub fn send_with<C>(&self, op: Operation, callback: C)
    where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.send(op).then(callback);
    }
}
