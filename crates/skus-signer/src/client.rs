// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the signing service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use skus_config::model::SignerConfig;
use skus_core::{
    AdapterType, HealthStatus, PluginAdapter, SignedBatch, Signer, SignerError, SkusError,
};

use crate::types::{ErrorResponse, SignRequest, SignResponse};

/// Signs blinded credentials via `POST {base_url}/v1/blindedToken/{issuer}`.
#[derive(Debug, Clone)]
pub struct HttpSigner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSigner {
    pub fn new(config: &SignerConfig) -> Result<Self, SkusError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SkusError::Config(format!("invalid signer base_url: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SkusError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Endpoint for `issuer`. The issuer is one path segment, so its `?` is escaped.
    fn sign_url(&self, issuer: &str) -> Result<Url, SignerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SignerError::Terminal(format!("signer base_url {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(["v1", "blindedToken", issuer]);
        Ok(url)
    }
}

/// Statuses that will fail the same way on every retry.
pub fn is_terminal_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 401 | 403 | 409 | 500)
}

#[async_trait]
impl Signer for HttpSigner {
    async fn sign(&self, issuer: &str, blinded_creds: &[String]) -> Result<SignedBatch, SignerError> {
        let url = self.sign_url(issuer)?;
        let response = self
            .client
            .post(url)
            .json(&SignRequest {
                blinded_tokens: blinded_creds,
            })
            .send()
            .await
            .map_err(|e| SignerError::Retryable(format!("signer request failed: {e}")))?;

        let status = response.status();
        debug!(status = %status, issuer, count = blinded_creds.len(), "signer responded");

        if status.is_success() {
            let body: SignResponse = response
                .json()
                .await
                .map_err(|e| SignerError::Retryable(format!("invalid signer response: {e}")))?;
            return Ok(body.into());
        }

        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        let message = format!("signer returned {status}: {detail}");

        if is_terminal_status(status) {
            Err(SignerError::Terminal(message))
        } else {
            Err(SignerError::Retryable(message))
        }
    }
}

#[async_trait]
impl PluginAdapter for HttpSigner {
    fn name(&self) -> &str {
        "http-signer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Signer
    }

    async fn health_check(&self) -> Result<HealthStatus, SkusError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signer_for(server: &MockServer) -> HttpSigner {
        HttpSigner::new(&SignerConfig {
            base_url: server.uri(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn creds() -> Vec<String> {
        vec!["YQ==".into(), "Yg==".into()]
    }

    #[tokio::test]
    async fn signs_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/blindedToken/brave.com%3Fsku=vpn"))
            .and(body_json(serde_json::json!({"blinded_tokens": ["YQ==", "Yg=="]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "batch_proof": "proof",
                "signed_tokens": ["s1", "s2"],
                "public_key": "pk"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = signer_for(&server)
            .sign("brave.com?sku=vpn", &creds())
            .await
            .unwrap();
        assert_eq!(batch.signed_creds, vec!["s1", "s2"]);
        assert_eq!(batch.batch_proof, "proof");
        assert_eq!(batch.public_key, "pk");
    }

    #[tokio::test]
    async fn bad_request_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "bad token", "code": 400})),
            )
            .mount(&server)
            .await;

        let err = signer_for(&server).sign("i", &creds()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.message().contains("bad token"), "{}", err.message());
    }

    #[tokio::test]
    async fn unavailable_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = signer_for(&server).sign("i", &creds()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.message().contains("overloaded"));
    }

    #[tokio::test]
    async fn garbled_success_body_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = signer_for(&server).sign("i", &creds()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_signer_is_retryable() {
        let signer = HttpSigner::new(&SignerConfig {
            base_url: "http://127.0.0.1:1".into(),
            request_timeout_secs: 2,
        })
        .unwrap();

        let err = signer.sign("i", &creds()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn terminal_status_table() {
        for code in [400, 401, 403, 409, 500] {
            assert!(is_terminal_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
        for code in [404, 408, 429, 502, 503, 504] {
            assert!(!is_terminal_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }

    #[test]
    fn base_url_path_is_kept() {
        let signer = HttpSigner::new(&SignerConfig {
            base_url: "http://signer.internal/api/".into(),
            request_timeout_secs: 5,
        })
        .unwrap();
        let url = signer.sign_url("m?sku=s").unwrap();
        assert_eq!(url.as_str(), "http://signer.internal/api/v1/blindedToken/m%3Fsku=s");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = HttpSigner::new(&SignerConfig {
            base_url: "not a url".into(),
            request_timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, SkusError::Config(_)));
    }

    #[test]
    fn adapter_identity() {
        let signer = HttpSigner::new(&SignerConfig::default()).unwrap();
        assert_eq!(signer.name(), "http-signer");
        assert_eq!(signer.adapter_type(), AdapterType::Signer);
    }
}
