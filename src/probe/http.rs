//! HTTP probe
//!
//! Performs one HTTP request per step via `reqwest`. Redirects are followed;
//! a non-success final status is a probe failure carrying the status line,
//! and transport-level faults (DNS, refused connections, TLS errors) carry
//! the client error text. Both look identical to the engine.

use async_trait::async_trait;
use reqwest::Client;

use crate::engine::{Method, Probe, ProbeError};

/// Probe that performs real HTTP requests
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Build a probe with the default client
    pub fn new() -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(concat!("cairn/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Build a probe around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn perform(
        &self,
        method: Method,
        target: &str,
        payload: Option<&[(String, String)]>,
    ) -> Result<String, ProbeError> {
        let request = match method {
            Method::Get => self.client.get(target),
            Method::Head => self.client.head(target),
            Method::Post => {
                let pairs: &[(String, String)] = payload.unwrap_or(&[]);
                self.client.post(target).form(pairs)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = response.status();
        let line = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };

        if status.is_success() {
            Ok(line)
        } else {
            Err(ProbeError::Rejected(line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_construction() {
        assert!(HttpProbe::new().is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_transport_failure() {
        let probe = HttpProbe::new().unwrap();
        let err = probe
            .perform(Method::Get, "http://cairn-test.invalid/", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)));
    }
}
