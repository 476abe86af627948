use std::time::Duration;

use survey_x_client::store::MemoryMetadataStore;
use survey_x_client::testing::{ConfirmBehavior, RejectingSigner, ScriptedLedger};
use survey_x_client::{CoordinatorSettings, ErrorKind, RecordStatus, SubmissionError};
use tokio::time::Instant;

pub mod common;

fn assert_compensated(error: &SubmissionError) {
    let report = error.compensation().unwrap();
    assert_eq!(report.deleted.len(), 1);
    assert!(report.is_complete());
}

#[tokio::test]
async fn submit_response_signing_rejected_fail_compensated() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    let signer = RejectingSigner::new(ctx.identity_pubkey());

    let error = ctx.submit(ctx.response(&resource_id), &signer).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SigningRejected);
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
    assert!(ctx.ledger.submitted().is_empty());
}

#[tokio::test]
async fn submit_response_rejected_by_ledger_fail_compensated() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.reject_submissions("blockhash not found");

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SubmissionRejected);
    assert!(error.to_string().contains("blockhash not found"));
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
}

#[tokio::test]
async fn submit_response_blockhash_unavailable_fail_compensated() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.fail_blockhash("connection refused");

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::LedgerUnavailable);
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
    assert!(ctx.ledger.submitted().is_empty());
}

#[tokio::test]
async fn submit_response_landed_despite_transport_error_success() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.lose_submit_responses("connection reset by peer");

    let receipt = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap();

    assert_eq!(receipt.record.status, RecordStatus::Confirmed);
    assert_eq!(ctx.live_records(&resource_id), vec![receipt.record]);
    assert_eq!(ctx.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn submit_response_program_missing_on_svm_fail_compensated() {
    let ctx = common::Context::litesvm();
    let resource_id = common::rand_resource();
    ctx.ledger
        .airdrop(&ctx.identity_pubkey(), common::sol_amount(1.0));

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SubmissionRejected);
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
    assert!(ctx.ledger.account_exists(&ctx.identity_pubkey()));
}

#[tokio::test]
async fn submit_response_failed_on_chain_fail_compensated() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger
        .confirm_with(ConfirmBehavior::Failed("custom program error: 0x1771".to_string()));

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SubmissionRejected);
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
}

#[tokio::test]
async fn submit_response_never_confirmed_fail_timeout() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.confirm_with(ConfirmBehavior::Dropped);

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ConfirmationTimeout);
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
    assert_eq!(ctx.ledger.status_calls(), 1);
}

#[tokio::test]
async fn submit_response_confirmed_after_wait_success() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.confirm_with(ConfirmBehavior::ConfirmedLate);

    let receipt = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap();

    assert_eq!(receipt.record.status, RecordStatus::Confirmed);
    assert_eq!(ctx.live_records(&resource_id), vec![receipt.record]);
    assert_eq!(ctx.ledger.status_calls(), 1);
}

#[tokio::test]
async fn submit_response_deadline_bounds_confirmation_wait() {
    let settings = CoordinatorSettings {
        confirmation_timeout: Duration::from_secs(30),
        ..common::settings()
    };
    let ctx = common::Context::new(
        ScriptedLedger::funded(common::sol_amount(1.0)),
        MemoryMetadataStore::new(),
        settings,
    );
    let resource_id = common::rand_resource();
    ctx.ledger.confirm_with(ConfirmBehavior::Dropped);

    let started = Instant::now();
    let error = ctx
        .submit_with_deadline(
            ctx.response(&resource_id),
            &ctx.identity,
            started + Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ConfirmationTimeout);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_compensated(&error);
    assert!(ctx.live_records(&resource_id).is_empty());
}

#[tokio::test]
async fn submit_response_compensation_failed_keeps_root_cause() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.reject_submissions("insufficient priority fee");
    ctx.store.fail_deletes(true);

    let error = ctx
        .submit_as_identity(ctx.response(&resource_id))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SubmissionRejected);
    let report = error.compensation().unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(report.failed.len(), 1);

    let orphans = ctx.live_records(&resource_id);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].status, RecordStatus::Pending);
    assert_eq!(report.failed[0].record_id, orphans[0].id);
}

#[tokio::test]
async fn submit_response_after_orphan_fail_already_submitted() {
    let ctx = common::Context::default();
    let resource_id = common::rand_resource();
    ctx.ledger.confirm_with(ConfirmBehavior::Dropped);
    ctx.store.fail_deletes(true);

    let first = ctx.submit_as_identity(ctx.response(&resource_id)).await;
    assert!(first.is_err_and(common::is_kind(ErrorKind::ConfirmationTimeout)));

    ctx.ledger.confirm_with(ConfirmBehavior::Confirmed);
    ctx.store.fail_deletes(false);
    let retry = ctx.submit_as_identity(ctx.response(&resource_id)).await;

    assert!(retry.is_err_and(common::is_kind(ErrorKind::AlreadySubmitted)));
    assert_eq!(ctx.live_records(&resource_id).len(), 1);
    assert_eq!(ctx.ledger.submitted().len(), 1);
}
