// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the SKUs credential service.


use strum::Display;
use thiserror::Error;

use crate::types::{CredentialType, OrderStatus};

/// The primary error type returned by every credential operation and collaborator.
#[derive(Debug, Error)]
pub enum SkusError {
    /// Bad input shape or missing fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// A submitted blinded credential is not valid base64.
    #[error("blinded credential at index {index} is not valid base64")]
    InvalidBlindedCredential { index: usize },

    /// The number of blinded credentials is not acceptable for the item.
    #[error("invalid number of blinded credentials: {0}")]
    InvalidCredentialCount(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order item not found: {0}")]
    ItemNotFound(String),

    /// The order exists but payment has not been confirmed.
    #[error("order is not paid (status {status})")]
    OrderNotPaid { status: OrderStatus },

    #[error("unsupported credential type: {0}")]
    UnsupportedCredentialType(CredentialType),

    /// Item metadata lacks `numIntervals`.
    #[error("numIntervals is not set")]
    NumIntervalsNotSet,

    /// Item metadata lacks `numPerInterval`.
    #[error("numPerInterval is not set")]
    NumPerIntervalNotSet,

    #[error("invalid numIntervals value: {0}")]
    InvalidNumIntervals(String),

    #[error("invalid numPerInterval value: {0}")]
    InvalidNumPerInterval(String),

    /// No signing request exists for the given item and request id.
    #[error("credentials not found")]
    CredentialsNotFound,

    /// The item already has as many active signing requests as its policy allows.
    #[error("too many active credential requests: {active} active, limit {limit}")]
    TooManyActive { active: usize, limit: usize },

    /// The request id was already used with a different set of blinded credentials.
    #[error("credentials already submitted with different blinded credentials")]
    CredentialsMismatch,

    /// The request id belongs to a different order.
    #[error("request id does not belong to the order")]
    WrongOrderForRequest,

    #[error("merchant does not own the order")]
    MerchantMismatch,

    /// Signing ended in a terminal failure; a fresh request id is required.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure reported by a [`Signer`](crate::traits::Signer).
///
/// The variant alone decides whether the dispatcher retries the entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Temporary failure (network, overload, timeout); the entry is retried.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Permanent failure (malformed input, rejected issuer); the entry is errored.
    #[error("terminal: {0}")]
    Terminal(String),
}

impl SignerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SignerError::Retryable(_))
    }

    pub fn message(&self) -> &str {
        match self {
            SignerError::Retryable(m) | SignerError::Terminal(m) => m,
        }
    }
}

/// Coarse classification used by the transport layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    PolicyViolation,
    NotFound,
    TransientStore,
    Signer,
    Internal,
}

impl ErrorKind {
    /// Default HTTP status for this kind of failure.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::PolicyViolation => 409,
            ErrorKind::NotFound => 404,
            ErrorKind::TransientStore => 503,
            ErrorKind::Signer => 502,
            ErrorKind::Internal => 500,
        }
    }
}

impl SkusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SkusError::Validation(_)
            | SkusError::InvalidBlindedCredential { .. }
            | SkusError::InvalidCredentialCount(_)
            | SkusError::NumIntervalsNotSet
            | SkusError::NumPerIntervalNotSet
            | SkusError::InvalidNumIntervals(_)
            | SkusError::InvalidNumPerInterval(_)
            | SkusError::WrongOrderForRequest => ErrorKind::Validation,
            SkusError::OrderNotPaid { .. }
            | SkusError::UnsupportedCredentialType(_)
            | SkusError::TooManyActive { .. }
            | SkusError::CredentialsMismatch
            | SkusError::MerchantMismatch => ErrorKind::PolicyViolation,
            SkusError::OrderNotFound(_)
            | SkusError::ItemNotFound(_)
            | SkusError::CredentialsNotFound => ErrorKind::NotFound,
            SkusError::Storage { .. } => ErrorKind::TransientStore,
            SkusError::Signer(_) | SkusError::SigningFailed(_) => ErrorKind::Signer,
            SkusError::Config(_) | SkusError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Status code the boundary layer should answer with.
    ///
    /// Same as the kind's status, except that exceeding the active-request
    /// limit is unprocessable rather than a conflict.
    pub fn http_status(&self) -> u16 {
        match self {
            SkusError::TooManyActive { .. } => 422,
            other => other.kind().http_status(),
        }
    }

    /// Short stable label, used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            SkusError::Validation(_) => "validation",
            SkusError::InvalidBlindedCredential { .. } => "invalid_blinded_credential",
            SkusError::InvalidCredentialCount(_) => "invalid_credential_count",
            SkusError::OrderNotFound(_) => "order_not_found",
            SkusError::ItemNotFound(_) => "item_not_found",
            SkusError::OrderNotPaid { .. } => "order_not_paid",
            SkusError::UnsupportedCredentialType(_) => "unsupported_credential_type",
            SkusError::NumIntervalsNotSet => "num_intervals_not_set",
            SkusError::NumPerIntervalNotSet => "num_per_interval_not_set",
            SkusError::InvalidNumIntervals(_) => "invalid_num_intervals",
            SkusError::InvalidNumPerInterval(_) => "invalid_num_per_interval",
            SkusError::CredentialsNotFound => "credentials_not_found",
            SkusError::TooManyActive { .. } => "too_many_active",
            SkusError::CredentialsMismatch => "credentials_mismatch",
            SkusError::WrongOrderForRequest => "wrong_order_for_request",
            SkusError::MerchantMismatch => "merchant_mismatch",
            SkusError::SigningFailed(_) => "signing_failed",
            SkusError::Storage { .. } => "storage",
            SkusError::Signer(_) => "signer",
            SkusError::Config(_) => "config",
            SkusError::Internal(_) => "internal",
        }
    }

    /// Convenience constructor for storage failures.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SkusError::Storage {
            source: Box::new(err),
        }
    }
}
