use solana_sdk::signature::Keypair;
use survey_x_client::ledger::KeypairSigner;
use survey_x_client::store::MemoryMetadataStore;
use survey_x_client::testing::ScriptedLedger;
use survey_x_client::{ErrorKind, SubmissionError};

pub mod common;

#[tokio::test]
async fn submit_response_fail_insufficient_funds() {
    let ctx = common::Context::new(
        ScriptedLedger::funded(10_000),
        MemoryMetadataStore::new(),
        common::settings(),
    );
    let resource_id = common::rand_resource();

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    match error {
        SubmissionError::InsufficientFunds {
            required,
            available,
        } => {
            assert_eq!(required, 500_000);
            assert_eq!(available, 10_000);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(ctx.executor_keys.calls(), 0);
    assert_eq!(ctx.store.calls(), 0);
    assert!(ctx.ledger.submitted().is_empty());
}

#[tokio::test]
async fn submit_response_exact_minimum_success() -> anyhow::Result<()> {
    let ctx = common::Context::new(
        ScriptedLedger::funded(500_000),
        MemoryMetadataStore::new(),
        common::settings(),
    );
    let resource_id = common::rand_resource();

    ctx.submit_as_identity(ctx.response(&resource_id)).await?;

    assert_eq!(ctx.live_records(&resource_id).len(), 1);
    Ok(())
}

#[tokio::test]
async fn submit_response_unfunded_on_svm_fail_insufficient_funds() {
    let ctx = common::Context::litesvm();

    let result = ctx
        .submit_as_identity(ctx.response(&common::rand_resource()))
        .await;

    assert!(result.is_err_and(common::is_kind(ErrorKind::InsufficientFunds)));
    assert_eq!(ctx.store.calls(), 0);
    assert!(!ctx.ledger.account_exists(&ctx.identity_pubkey()));
}

#[tokio::test]
async fn submit_response_balance_unreadable_fail_ledger_unavailable() {
    let ctx = common::Context::default();
    ctx.ledger.fail_balance("connection refused");

    let result = ctx
        .submit_as_identity(ctx.response(&common::rand_resource()))
        .await;

    assert!(result.is_err_and(common::is_kind(ErrorKind::LedgerUnavailable)));
    assert_eq!(ctx.executor_keys.calls(), 0);
    assert_eq!(ctx.store.calls(), 0);
}

#[tokio::test]
async fn submit_response_foreign_signer_fail_signer_mismatch() {
    let ctx = common::Context::default();
    let stranger = KeypairSigner::new(Keypair::new());

    let result = ctx
        .submit(ctx.response(&common::rand_resource()), &stranger)
        .await;

    assert!(result.is_err_and(common::is_kind(ErrorKind::SignerMismatch)));
    assert_eq!(ctx.ledger.balance_calls(), 0);
    assert_eq!(ctx.store.calls(), 0);
}
