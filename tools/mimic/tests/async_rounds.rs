mod common;

use common::{init_rounds, Fetcher};
use mimic::recorder::RecorderMode;
use mimic::{current_recorder, eq, every_async, verify_async, MockError, VerifyOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn deferred_stub_ignores_the_completion_token() {
    init_rounds(65);
    let fetcher = &Fetcher::new("fetcher");
    every_async(|| async move { fetcher.fetch(eq("k".to_string())?).await })
        .returns(7_i64)
        .await
        .expect("stub");

    assert_eq!(fetcher.fetch("k".to_string()).await.expect("fetch"), 7);
    assert_eq!(fetcher.fetch("k".to_string()).await.expect("fetch again"), 7);
    assert_eq!(fetcher.fetch("other".to_string()).await.expect("fetch"), 0);
    assert_eq!(fetcher.double.history().len(), 3);
}

#[tokio::test]
async fn each_round_completes_before_the_next_starts() {
    init_rounds(65);
    let fetcher = &Fetcher::new("fetcher");
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    every_async(|| {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        async move {
            let round = started.fetch_add(1, Ordering::SeqCst);
            assert_eq!(finished.load(Ordering::SeqCst), round);
            let value = fetcher.fetch(eq("a".to_string())?).await?;
            tokio::task::yield_now().await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok::<_, MockError>(value)
        }
    })
    .returns(1_i64)
    .await
    .expect("stub");

    assert_eq!(started.load(Ordering::SeqCst), 65);
    assert_eq!(finished.load(Ordering::SeqCst), 65);
}

#[tokio::test]
async fn async_attempts_leave_the_thread_recorder_alone() {
    init_rounds(65);
    let fetcher = &Fetcher::new("fetcher");
    every_async(|| async move {
        assert_eq!(
            current_recorder().with(|recorder| recorder.mode()),
            RecorderMode::Stubbing
        );
        fetcher.fetch(eq("x".to_string())?).await
    })
    .returns(3_i64)
    .await
    .expect("stub");

    assert_eq!(
        current_recorder().with(|recorder| recorder.mode()),
        RecorderMode::Answering
    );
}

#[tokio::test]
async fn async_verification_matches_deferred_calls() {
    init_rounds(65);
    let fetcher = &Fetcher::new("fetcher");
    fetcher.fetch("present".to_string()).await.expect("fetch");

    verify_async(VerifyOptions::default(), || async move {
        fetcher.fetch(eq("present".to_string())?).await
    })
    .await
    .expect("verify");

    let err = verify_async(VerifyOptions::default(), || async move {
        fetcher.fetch(eq("absent".to_string())?).await
    })
    .await
    .expect_err("never fetched");
    assert!(matches!(err, MockError::Verification(message) if message.contains("fetcher.fetch(eq(\"absent\"), any())")));
}

#[tokio::test]
async fn failed_async_attempt_is_reported() {
    init_rounds(65);
    let fetcher = &Fetcher::new("fetcher");
    let err = every_async(|| async move {
        let _unused: String = eq("lost".to_string())?;
        fetcher.fetch("k".to_string()).await
    })
    .returns(1_i64)
    .await
    .expect_err("unbound matcher");
    assert!(matches!(err, MockError::Usage(message) if message.contains("not bound")));
    assert_eq!(fetcher.double.answer_count(), 0);
}
