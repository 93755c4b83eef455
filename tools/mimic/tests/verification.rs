mod common;

use common::{init_rounds, Calculator, Factory};
use mimic::{
    any, capture, eq, every, verify, verify_not, verify_ordered, verify_sequence, verify_with,
    CaptureSlot, MockError, Ordering, VerifyOptions,
};

#[test]
fn unordered_verification_names_the_missing_matcher() {
    init_rounds(65);
    let calc = Calculator::new("calc");
    calc.square(3).expect("call");
    calc.add(1, 2).expect("call");

    verify(|| calc.square(eq(3)?)).expect("square(3) happened");
    verify(|| calc.add(any()?, eq(2)?)).expect("add(_, 2) happened");
    verify(|| {
        calc.add(1, 2)?;
        calc.square(3)
    })
    .expect("order is irrelevant");

    let err = verify(|| calc.square(eq(4)?)).expect_err("square(4) never happened");
    assert!(err.is_verification());
    assert!(
        matches!(&err, MockError::Verification(message) if message.contains("calc.square(eq(4))")),
        "unexpected message: {err}"
    );
}

#[test]
fn verification_does_not_touch_history() {
    init_rounds(65);
    let calc = Calculator::new("calc");
    calc.square(1).expect("call");
    verify(|| calc.square(any()?)).expect("verify");
    assert_eq!(calc.double.history().len(), 1);
}

#[test]
fn sequence_verification_follows_timestamps() {
    init_rounds(65);
    let first = Calculator::new("first");
    let second = Calculator::new("second");
    first.square(1).expect("call");
    second.square(2).expect("call");

    verify_sequence(|| {
        first.square(eq(1)?)?;
        second.square(eq(2)?)
    })
    .expect("recorded order");

    let err = verify_sequence(|| {
        second.square(eq(2)?)?;
        first.square(eq(1)?)
    })
    .expect_err("reversed order");
    assert!(matches!(err, MockError::Verification(message) if message.contains("second.square(eq(2))")));
}

#[test]
fn sequence_verification_requires_exact_length() {
    init_rounds(65);
    let calc = Calculator::new("calc");
    calc.square(1).expect("call");
    calc.square(2).expect("call");

    let err = verify_sequence(|| calc.square(any()?)).expect_err("one call too few");
    assert!(matches!(err, MockError::Verification(message) if message.contains("expected exactly 1 calls but 2")));
}

#[test]
fn inverse_verification_fails_when_the_call_happened() {
    init_rounds(65);
    let calc = Calculator::new("calc");
    calc.square(2).expect("call");

    verify_not(|| calc.square(eq(9)?)).expect("square(9) never happened");
    let err = verify_not(|| calc.square(eq(2)?)).expect_err("square(2) happened");
    assert!(matches!(err, MockError::Verification(message) if message.contains("was expected not to be")));
}

#[test]
fn ordered_verification_always_fails() {
    init_rounds(65);
    let calc = Calculator::new("calc");
    calc.square(1).expect("call");

    let err = verify_ordered(|| calc.square(eq(1)?)).expect_err("not implemented");
    assert!(matches!(err, MockError::Verification(message) if message.contains("not implemented")));

    verify_with(
        VerifyOptions {
            ordering: Ordering::Ordered,
            inverse: true,
        },
        || calc.square(eq(1)?),
    )
    .expect("inverse of a failing verdict passes");
}

#[test]
fn capture_receives_matched_arguments_on_success() {
    init_rounds(65);
    let calc = Calculator::new("calc");
    calc.add(5, 6).expect("call");

    let left: CaptureSlot<i64> = CaptureSlot::new();
    verify(|| calc.add(capture(&left)?, eq(6)?)).expect("verify");
    assert_eq!(left.captured(), vec![5]);

    let missed: CaptureSlot<i64> = CaptureSlot::new();
    verify(|| calc.add(capture(&missed)?, eq(7)?)).expect_err("add(_, 7) never happened");
    assert!(missed.is_empty());
}

#[test]
fn failed_verification_logs_the_recorded_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("verify.jsonl");
    let mut config = mimic::MockConfig::default();
    config.recording.rounds = 4;
    config.logging.path = Some(path.clone());
    mimic::init_thread_recorder(config);

    let calc = Calculator::new("calc");
    calc.square(2).expect("call");
    verify(|| calc.square(eq(2)?)).expect("verify");
    verify(|| calc.square(eq(5)?)).expect_err("square(5) never happened");

    let text = std::fs::read_to_string(&path).expect("read log");
    let events = text
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("json line"))
        .filter(|event| event["event_type"] != "recorder.compiled")
        .collect::<Vec<_>>();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_type"], "verify.passed");
    assert_eq!(events[0]["payload"]["recorded"], serde_json::json!([]));
    assert_eq!(events[1]["event_type"], "verify.failed");
    assert_eq!(events[1]["payload"]["ordering"], "unordered");
    assert_eq!(events[1]["payload"]["recorded"][0]["args"][0], "2");
}

#[test]
fn chained_calls_verify_against_the_stubbed_child() {
    init_rounds(65);
    let factory = Factory::new("factory");
    every(|| factory.open(eq("main".to_string())?)?.id())
        .returns(42_i64)
        .expect("stub");
    let session = factory.open("main".to_string()).expect("open");
    assert_eq!(session.id().expect("id"), 42);

    verify(|| factory.open(eq("main".to_string())?)?.id()).expect("exact chain");
    verify(|| factory.open(any()?)?.id()).expect("chain through a wildcard parent");

    let err = verify(|| factory.open(eq("main".to_string())?)?.name())
        .expect_err("name was never called");
    assert!(matches!(err, MockError::Verification(message) if message.contains("Session.name()")));
    assert_eq!(factory.double.history().len(), 1);
    assert_eq!(session.double.history().len(), 1);
}
