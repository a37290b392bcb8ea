// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issuance and retrieval against a real SQLite outbox.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use skus_core::{
    CredentialType, ItemId, Order, OrderId, OrderStatus, OutboxKey, OutboxState, OutboxStore,
    RequestId, SignerError, SkusError,
};
use skus_issuance::{CredentialsOutcome, RequestIdResolution, RequestOutcome};
use skus_test_utils::{MockSigner, OrderFixture, TestHarness, blinded_creds};

/// Paid TLV2 `vpn` order: 3 intervals of 2, valid for an hour.
fn vpn() -> OrderFixture {
    OrderFixture::tlv2("vpn")
        .intervals(3, 2)
        .valid_for_secs(Some(3600))
}

async fn harness_with_order(fixture: OrderFixture) -> (TestHarness, Order) {
    let harness = TestHarness::builder().build().await.unwrap();
    let order = harness.create_order(fixture).await.unwrap();
    (harness, order)
}

#[tokio::test]
async fn identical_resubmission_creates_one_entry() {
    let (h, order) = harness_with_order(vpn()).await;
    let item = order.items[0].id;
    let request = RequestId::new();

    let first = h
        .issuer
        .request_credentials(&order.id, &item, &request, blinded_creds("a", 4))
        .await
        .unwrap();
    let second = h
        .issuer
        .request_credentials(&order.id, &item, &request, blinded_creds("a", 4))
        .await
        .unwrap();

    assert_eq!(first, RequestOutcome::Enqueued);
    assert_eq!(second, RequestOutcome::AlreadyRequested);
    assert_eq!(h.storage.count_active(&item, Utc::now()).await.unwrap(), 1);
}

#[tokio::test]
async fn different_creds_for_same_request_are_rejected() {
    let (h, order) = harness_with_order(vpn()).await;
    let item = order.items[0].id;
    let request = RequestId::new();

    h.issuer
        .request_credentials(&order.id, &item, &request, blinded_creds("a", 4))
        .await
        .unwrap();
    h.dispatch().await.unwrap();

    let err = h
        .issuer
        .request_credentials(&order.id, &item, &request, blinded_creds("b", 4))
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::CredentialsMismatch));

    let stored = h
        .storage
        .get_by_key(&OutboxKey::new(item, request))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.blinded_creds, blinded_creds("a", 4), "must never overwrite");
}

#[tokio::test]
async fn signed_batch_replay_under_new_request_id_is_idempotent() {
    let (h, order) = harness_with_order(vpn()).await;
    let item = order.items[0].id;

    h.issuer
        .request_credentials(&order.id, &item, &RequestId::new(), blinded_creds("a", 6))
        .await
        .unwrap();
    h.dispatch().await.unwrap();

    let outcome = h
        .issuer
        .request_credentials(&order.id, &item, &RequestId::new(), blinded_creds("a", 6))
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::AlreadyRequested);
    assert_eq!(h.storage.count_active(&item, Utc::now()).await.unwrap(), 1);
}

#[tokio::test]
async fn order_preconditions() {
    let (h, paid) = harness_with_order(vpn()).await;
    let pending = h
        .create_order(vpn().status(OrderStatus::Pending))
        .await
        .unwrap();

    let err = h
        .issuer
        .request_credentials(
            &pending.id,
            &pending.items[0].id,
            &RequestId::new(),
            blinded_creds("a", 2),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SkusError::OrderNotPaid {
            status: OrderStatus::Pending
        }
    ));

    let err = h
        .issuer
        .request_credentials(
            &OrderId::new(),
            &paid.items[0].id,
            &RequestId::new(),
            blinded_creds("a", 2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::OrderNotFound(_)));

    // Item of another order.
    let err = h
        .issuer
        .request_credentials(
            &paid.id,
            &pending.items[0].id,
            &RequestId::new(),
            blinded_creds("a", 2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::ItemNotFound(_)));
}

#[tokio::test]
async fn malformed_creds_are_rejected_before_lookup() {
    let h = TestHarness::builder().build().await.unwrap();
    let err = h
        .issuer
        .request_credentials(
            &OrderId::new(),
            &ItemId::new(),
            &RequestId::new(),
            vec!["YWJj".into(), "***".into()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::InvalidBlindedCredential { index: 1 }));
}

#[tokio::test]
async fn active_limit_is_enforced() {
    let h = TestHarness::builder()
        .with_active_limit("vpn", 10)
        .build()
        .await
        .unwrap();
    let order = h.create_order(vpn()).await.unwrap();
    let item = order.items[0].id;

    for i in 0..10 {
        let outcome = h
            .issuer
            .request_credentials(
                &order.id,
                &item,
                &RequestId::new(),
                blinded_creds(&format!("r{i}"), 2),
            )
            .await
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Enqueued, "request {i}");
    }

    let err = h
        .issuer
        .request_credentials(&order.id, &item, &RequestId::new(), blinded_creds("r10", 2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SkusError::TooManyActive {
            active: 10,
            limit: 10
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_exceed_the_limit() {
    let h = Arc::new(
        TestHarness::builder()
            .with_active_limit("vpn", 1)
            .build()
            .await
            .unwrap(),
    );
    let order = Arc::new(h.create_order(vpn()).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let h = h.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            h.issuer
                .request_credentials(
                    &order.id,
                    &order.items[0].id,
                    &RequestId::new(),
                    blinded_creds(&format!("c{i}"), 2),
                )
                .await
        }));
    }

    let mut enqueued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(RequestOutcome::Enqueued) => enqueued += 1,
            Ok(other) => panic!("unexpected outcome {other:?}"),
            Err(SkusError::TooManyActive { active: 1, limit: 1 }) => {}
            Err(e) => panic!("unexpected error {e}"),
        }
    }
    assert_eq!(enqueued, 1);
    assert_eq!(
        h.storage
            .count_active(&order.items[0].id, Utc::now())
            .await
            .unwrap(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_single_use_requests_admit_one() {
    let h = Arc::new(TestHarness::builder().build().await.unwrap());
    let order = Arc::new(
        h.create_order(OrderFixture::single_use("user-wallet-vote", 3))
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let h = h.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            h.issuer
                .request_credentials(
                    &order.id,
                    &order.items[0].id,
                    &RequestId::new(),
                    blinded_creds(&format!("v{i}"), 3),
                )
                .await
        }));
    }

    let mut enqueued = 0;
    for handle in handles {
        if let Ok(RequestOutcome::Enqueued) = handle.await.unwrap() {
            enqueued += 1;
        }
    }
    assert_eq!(enqueued, 1);
}

#[tokio::test]
async fn zero_limit_rejects_first_request() {
    let h = TestHarness::builder()
        .with_active_limit("vpn", 0)
        .build()
        .await
        .unwrap();
    let order = h.create_order(vpn()).await.unwrap();

    let err = h
        .issuer
        .request_credentials(
            &order.id,
            &order.items[0].id,
            &RequestId::new(),
            blinded_creds("a", 2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::TooManyActive { active: 0, limit: 0 }));
}

#[tokio::test]
async fn single_use_allows_one_request_per_item() {
    let (h, order) = harness_with_order(OrderFixture::single_use("user-wallet-vote", 3)).await;
    let item = order.items[0].id;
    let legacy = RequestId::from(item);

    h.issuer
        .request_credentials(&order.id, &item, &legacy, blinded_creds("a", 3))
        .await
        .unwrap();
    let again = h
        .issuer
        .request_credentials(&order.id, &item, &legacy, blinded_creds("a", 3))
        .await
        .unwrap();
    assert_eq!(again, RequestOutcome::AlreadyRequested);

    let err = h
        .issuer
        .request_credentials(&order.id, &item, &RequestId::new(), blinded_creds("b", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::TooManyActive { limit: 1, .. }));

    let err = h
        .issuer
        .request_credentials(&order.id, &item, &RequestId::new(), blinded_creds("c", 4))
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::InvalidCredentialCount(_)));
}

#[tokio::test]
async fn capped_sku_stores_truncated_prefix() {
    let h = TestHarness::builder()
        .with_interval_ceiling("leo", 3)
        .build()
        .await
        .unwrap();
    let order = h
        .create_order(
            OrderFixture::tlv2("leo")
                .intervals(8, 192)
                .valid_for_secs(None),
        )
        .await
        .unwrap();
    let item = order.items[0].id;
    let request = RequestId::new();
    let submitted = blinded_creds("x", 1536);

    h.issuer
        .request_credentials(&order.id, &item, &request, submitted.clone())
        .await
        .unwrap();

    let stored = h
        .storage
        .get_by_key(&OutboxKey::new(item, request))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.blinded_creds.len(), 576);
    assert_eq!(stored.blinded_creds[..], submitted[..576]);

    // The same oversized submission truncates identically.
    let again = h
        .issuer
        .request_credentials(&order.id, &item, &request, submitted)
        .await
        .unwrap();
    assert_eq!(again, RequestOutcome::AlreadyRequested);
}

#[tokio::test]
async fn uncapped_sku_rejects_more_than_nominal() {
    let (h, order) = harness_with_order(vpn()).await;

    let err = h
        .issuer
        .request_credentials(
            &order.id,
            &order.items[0].id,
            &RequestId::new(),
            blinded_creds("a", 7),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::InvalidCredentialCount(_)));
}

#[tokio::test]
async fn time_limited_v1_is_unsupported() {
    let (h, order) = harness_with_order(
        OrderFixture::tlv2("talk").credential_type(CredentialType::TimeLimited),
    )
    .await;

    let err = h
        .issuer
        .request_credentials(
            &order.id,
            &order.items[0].id,
            &RequestId::new(),
            blinded_creds("a", 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SkusError::UnsupportedCredentialType(CredentialType::TimeLimited)
    ));
}

#[tokio::test]
async fn retrieval_follows_entry_state() {
    let (h, order) = harness_with_order(vpn()).await;
    let item = order.items[0].id;
    let request = RequestId::new();
    let by_request = RequestIdResolution::UseSuppliedRequestId(request);

    let err = h
        .retriever
        .get_credentials(&order.id, &item, by_request)
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::CredentialsNotFound));

    let creds = blinded_creds("a", 2);
    h.issuer
        .request_credentials(&order.id, &item, &request, creds.clone())
        .await
        .unwrap();

    let outcome = h
        .retriever
        .get_credentials(&order.id, &item, by_request)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CredentialsOutcome::NotReady {
            retry_after: Duration::from_secs(5)
        }
    );

    h.dispatch().await.unwrap();

    let CredentialsOutcome::Ready(issued) = h
        .retriever
        .get_credentials(&order.id, &item, by_request)
        .await
        .unwrap()
    else {
        panic!("expected signed credentials");
    };
    assert_eq!(issued.request_id, request);
    assert_eq!(issued.issuer, "brave.com?sku=vpn");
    assert_eq!(issued.signed_creds, MockSigner::echo(&creds).signed_creds);
    assert_eq!(issued.batch_proof.as_deref(), Some("mock-proof"));
    assert!(issued.valid_to.is_some());

    let other = h.create_order(vpn()).await.unwrap();
    let err = h
        .retriever
        .get_credentials(&other.id, &item, by_request)
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::WrongOrderForRequest));
}

#[tokio::test]
async fn errored_entry_reports_signing_failure() {
    let h = TestHarness::builder()
        .with_signer_script(vec![Err(SignerError::Terminal(
            "signer rejected batch".into(),
        ))])
        .build()
        .await
        .unwrap();
    let order = h.create_order(vpn()).await.unwrap();
    let item = order.items[0].id;
    let request = RequestId::new();

    h.issuer
        .request_credentials(&order.id, &item, &request, blinded_creds("a", 2))
        .await
        .unwrap();
    assert_eq!(h.dispatch().await.unwrap().errored, 1);

    let err = h
        .retriever
        .get_credentials(&order.id, &item, RequestIdResolution::UseSuppliedRequestId(request))
        .await
        .unwrap_err();
    match err {
        SkusError::SigningFailed(msg) => assert_eq!(msg, "signer rejected batch"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn expired_batch_returns_empty_credentials() {
    let (h, order) = harness_with_order(vpn().valid_for_secs(Some(0))).await;
    let item = order.items[0].id;
    let request = RequestId::new();

    h.issuer
        .request_credentials(&order.id, &item, &request, blinded_creds("a", 2))
        .await
        .unwrap();
    h.dispatch().await.unwrap();

    let outcome = h
        .retriever
        .get_credentials(&order.id, &item, RequestIdResolution::UseSuppliedRequestId(request))
        .await
        .unwrap();
    let CredentialsOutcome::Ready(issued) = outcome else {
        panic!("expired batches are still ready");
    };
    assert!(issued.signed_creds.is_empty());

    // Expired batches no longer count toward the limit.
    assert_eq!(h.storage.count_active(&item, Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn legacy_order_retrieval_uses_item_id() {
    let (h, order) = harness_with_order(vpn()).await;
    let item = order.items[0].id;

    h.issuer
        .request_credentials(&order.id, &item, &RequestId::from(item), blinded_creds("a", 2))
        .await
        .unwrap();
    h.dispatch().await.unwrap();

    let outcome = h.retriever.get_order_credentials(&order.id).await.unwrap();
    assert!(matches!(outcome, CredentialsOutcome::Ready(ref c) if c.signed_creds.len() == 2));

    let err = h
        .retriever
        .get_order_credentials(&OrderId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::OrderNotFound(_)));
}

#[tokio::test]
async fn delete_checks_merchant_and_scope() {
    let (h, order) = harness_with_order(vpn()).await;
    let item = order.items[0].id;
    let keep = RequestId::new();
    let drop_one = RequestId::new();

    for (request, prefix) in [(keep, "k"), (drop_one, "d")] {
        h.issuer
            .request_credentials(&order.id, &item, &request, blinded_creds(prefix, 2))
            .await
            .unwrap();
    }
    h.dispatch().await.unwrap();

    let err = h
        .issuer
        .delete_credentials(&order.id, "other.example", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SkusError::MerchantMismatch));

    let deleted = h
        .issuer
        .delete_credentials(&order.id, "brave.com", Some(&drop_one))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    let remaining = h
        .storage
        .get_by_key(&OutboxKey::new(item, keep))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining.state, OutboxState::Completed);

    let deleted = h
        .issuer
        .delete_credentials(&order.id, "brave.com", None)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(h.storage.count_active(&item, Utc::now()).await.unwrap(), 0);
}
