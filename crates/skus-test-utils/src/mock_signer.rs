// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted signer for deterministic tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use skus_core::{SignedBatch, Signer, SignerError};

/// A signer that answers from a FIFO script.
///
/// Once the script is empty every call succeeds, signing each blinded
/// credential `c` as `signed-c`.
#[derive(Clone, Default)]
pub struct MockSigner {
    script: Arc<Mutex<VecDeque<Result<SignedBatch, SignerError>>>>,
    calls: Arc<Mutex<Vec<SignCall>>>,
    delay: Option<Duration>,
}

/// One recorded [`Signer::sign`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignCall {
    pub issuer: String,
    pub blinded_creds: Vec<String>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Result<SignedBatch, SignerError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(script))),
            ..Self::default()
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the answer for a future call.
    pub async fn push(&self, result: Result<SignedBatch, SignerError>) {
        self.script.lock().await.push_back(result);
    }

    pub async fn calls(&self) -> Vec<SignCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// The batch the default path produces for `creds`.
    pub fn echo(creds: &[String]) -> SignedBatch {
        SignedBatch {
            signed_creds: creds.iter().map(|c| format!("signed-{c}")).collect(),
            batch_proof: "mock-proof".into(),
            public_key: "mock-public-key".into(),
        }
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, issuer: &str, blinded_creds: &[String]) -> Result<SignedBatch, SignerError> {
        self.calls.lock().await.push(SignCall {
            issuer: issuer.to_string(),
            blinded_creds: blinded_creds.to_vec(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().await.pop_front();
        scripted.unwrap_or_else(|| Ok(Self::echo(blinded_creds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_then_echo() {
        let signer = MockSigner::with_script(vec![Err(SignerError::Retryable("busy".into()))]);
        let creds = vec!["a".to_string()];

        assert!(signer.sign("m?sku=s", &creds).await.unwrap_err().is_retryable());
        let batch = signer.sign("m?sku=s", &creds).await.unwrap();
        assert_eq!(batch.signed_creds, vec!["signed-a"]);

        let calls = signer.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].issuer, "m?sku=s");
    }

    #[tokio::test]
    async fn delayed_signer_records_the_call_first() {
        let signer = MockSigner::new().with_delay(Duration::from_millis(200));
        let creds = vec!["a".to_string()];

        let pending = tokio::spawn({
            let signer = signer.clone();
            async move { signer.sign("i", &creds).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(signer.call_count().await, 1);
        assert!(pending.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn pushed_results_are_consumed_in_order() {
        let signer = MockSigner::new();
        signer.push(Err(SignerError::Terminal("first".into()))).await;
        signer.push(Err(SignerError::Retryable("second".into()))).await;
        let creds = vec!["a".to_string()];

        assert_eq!(signer.sign("i", &creds).await.unwrap_err().message(), "first");
        assert_eq!(signer.sign("i", &creds).await.unwrap_err().message(), "second");
        assert!(signer.sign("i", &creds).await.is_ok());
    }
}
