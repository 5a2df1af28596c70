//! Dispatch engine: executes one [`HttpRequest`] under a deadline and turns
//! whatever happens into exactly one [`Outcome`].
//!
//! # Design
//! The whole exchange (connect, send, headers, body) runs inside
//! `tokio::time::timeout`. When the deadline fires the exchange future is
//! dropped, which aborts the in-flight request and closes its socket.
//! Connection resets are reported as `Timeout`, not as a network error.
//!
//! Background calls hand their result over a `oneshot` channel, so a call
//! can be resolved at most once.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Outcome, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::response::classify;

/// Sends requests and classifies their responses.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
}

impl Dispatcher {
    /// Each call opens exactly one connection: idle connections are not
    /// kept and redirects are returned to the classifier, not followed.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::Network)?;
        Ok(Self { http })
    }

    /// Run one exchange, failing with [`Error::Timeout`] once `deadline`
    /// has passed.
    pub async fn execute(&self, request: HttpRequest, deadline: Duration) -> Outcome {
        let method = request.method;
        let url = request.url();
        debug!(%method, %url, ?deadline, "sending request");

        match tokio::time::timeout(deadline, self.exchange(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%method, %url, ?deadline, "deadline elapsed, request aborted");
                Err(Error::Timeout)
            }
        }
    }

    async fn exchange(&self, request: HttpRequest) -> Outcome {
        let response = self.round_trip(request).await?;
        classify(&response)
    }

    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        let transport = self.transport_request(request)?;
        let response = self.http.execute(transport).await.map_err(send_error)?;

        let status = response.status().as_u16();
        debug!(status, url = %response.url(), "received response headers");

        let bytes = response.bytes().await.map_err(body_error)?;
        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn transport_request(&self, request: HttpRequest) -> Result<reqwest::Request> {
        let url = request.url();
        let url = reqwest::Url::parse(&url)
            .map_err(|e| Error::InvalidRequest(format!("bad url `{url}`: {e}")))?;

        let mut builder = self.http.request(request.method.into(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
            .build()
            .map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}

/// Failure before the response headers arrived.
fn send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || is_connection_reset(&err) {
        warn!(error = %err, "connection reset or timed out");
        return Error::Timeout;
    }
    warn!(error = %err, "transport error");
    Error::Network(err)
}

/// Failure while the body was streaming in.
fn body_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || is_connection_reset(&err) {
        warn!(error = %err, "connection reset while reading body");
        return Error::Timeout;
    }
    warn!(error = %err, "response stream closed early");
    Error::Dropped(err.to_string())
}

fn is_connection_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// A call running in the background. Resolves to its [`Outcome`] once.
///
/// If the task driving the call goes away without an answer, the call
/// resolves to [`Error::Dropped`].
#[derive(Debug)]
pub struct PendingCall {
    rx: oneshot::Receiver<Outcome>,
}

impl PendingCall {
    /// Spawn `call` on the current Tokio runtime.
    pub(crate) fn spawn<F>(call: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = tx.send(call.await);
        });
        Self { rx }
    }

    /// Deliver the outcome to `callback` instead of awaiting it.
    pub(crate) fn then<C>(self, callback: C)
    where
        C: FnOnce(Outcome) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) });
    }
}

impl Future for PendingCall {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(Error::Dropped("call abandoned".to_string())))
        })
    }
}
