//! Node transport — how a request physically reaches a management agent.
//!
//! The communicator only knows the [`NodeTransport`] trait, so tests swap in
//! scripted transports and the rest of the engine never touches a socket.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::outcome::RequestOutcome;
use super::target::Target;

/// One request, ready to send: a route under the agent's API root plus a
/// JSON body. The same request may be posted to many targets, or built per
/// target when payloads differ.
#[derive(Debug, Clone)]
pub struct NodeRequest {
    pub route: String,
    pub payload: Value,
}

impl NodeRequest {
    pub fn new(route: impl Into<String>, payload: Value) -> Self {
        Self {
            route: route.into(),
            payload,
        }
    }
}

#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Deliver `request` to `target`. Never fails in the `Result` sense;
    /// every way the send can go is a [`RequestOutcome`].
    async fn send(&self, target: &Target, request: &NodeRequest) -> RequestOutcome;
}

/// Production transport: HTTPS POST to the agent, walking the target's
/// address list until one address takes the connection.
pub struct HttpTransport {
    http: reqwest::Client,
    scheme: &'static str,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(use_tls: bool, auth_token: Option<String>) -> Result<Self> {
        // Agents present cluster-local self-signed certificates; trust is
        // the auth token, not the certificate chain.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            scheme: if use_tls { "https" } else { "http" },
            auth_token,
        })
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn send(&self, target: &Target, request: &NodeRequest) -> RequestOutcome {
        let mut last_reason = String::from("no addresses configured");
        for addr in target.addrs() {
            let url = format!(
                "{}://{}:{}/{}",
                self.scheme,
                addr,
                target.port(),
                request.route
            );
            let mut send = self.http.post(&url).json(&request.payload);
            if let Some(token) = &self.auth_token {
                send = send.bearer_auth(token);
            }
            match send.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(err) => {
                            return RequestOutcome::ConnectError {
                                reason: format!("reading response body: {err}"),
                            }
                        }
                    };
                    if status.is_success() {
                        return RequestOutcome::Success { payload: body };
                    }
                    return RequestOutcome::RemoteError {
                        status: status.as_u16(),
                        output: body,
                    };
                }
                Err(err) if err.is_timeout() => return RequestOutcome::Timeout,
                Err(err) => {
                    // Try the next address.
                    last_reason = err.to_string();
                }
            }
        }
        RequestOutcome::ConnectError {
            reason: last_reason,
        }
    }
}
