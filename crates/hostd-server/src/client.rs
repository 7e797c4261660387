//! Minimal JSON client for the daemon's Unix socket.
//!
//! One HTTP/1.1 connection per request, matching how the daemon's callers
//! talk to it.

use anyhow::Context;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::path::PathBuf;
use tokio::net::UnixStream;

#[derive(Debug, Clone)]
pub struct HostdClient {
    socket: PathBuf,
}

impl HostdClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub async fn health(&self) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::GET, "/v1/health", None).await
    }

    pub async fn busy(&self) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::GET, "/v1/busy", None).await
    }

    /// POST /v1/run. With `wait = false` a busy daemon answers 409 at once.
    pub async fn run(
        &self,
        action: &str,
        args: Value,
        wait: bool,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let path = if wait { "/v1/run?wait=1" } else { "/v1/run?wait=0" };
        let body = serde_json::json!({ "action": action, "args": args });
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .with_context(|| format!("failed to connect to {}", self.socket.display()))?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .context("HTTP handshake failed")?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "hostd connection closed with error");
            }
        });

        let payload = match body {
            Some(v) => Bytes::from(serde_json::to_vec(&v)?),
            None => Bytes::new(),
        };
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(payload))?;

        let response = sender.send_request(req).await.context("request failed")?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("daemon returned invalid JSON")?
        };
        Ok((status, json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_failure_names_socket() {
        let client = HostdClient::new("/nonexistent/hostd.sock");
        let err = client.health().await.unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/hostd.sock"));
    }
}
