//! Stub/verify entry points and typed matcher helpers.
//!
//! ```ignore
//! every(|| calc.add(eq(1)?, any()?)).returns(5_i64)?;
//! verify(|| calc.add(eq(1)?, eq(2)?))?;
//! ```
//!
//! Blocks run once per configured round, so they must make the same calls
//! every time and have no side effects beyond calls on doubles.

use crate::answer::Answer;
use crate::errors::MockError;
use crate::invocation::Invocation;
use crate::matcher::{CaptureSlot, Matcher};
use crate::recorder::{current_recorder, with_task_recorder, RecorderHandle};
use crate::value::{MockValue, Value};
use crate::verify::Ordering;
use std::future::Future;

// ── Typed matcher helpers ─────────────────────────────────────────────────────

pub fn eq<T: MockValue>(value: T) -> Result<T, MockError> {
    register(Matcher::Equality(value.into_value()))
}

pub fn any<T: MockValue>() -> Result<T, MockError> {
    register(Matcher::Wildcard)
}

/// Accepts arguments of `T` for which `check` holds.
pub fn matching<T, F>(description: &str, check: F) -> Result<T, MockError>
where
    T: MockValue,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    register(Matcher::predicate(description, move |value: &Value| {
        T::from_value(value.clone()).is_ok_and(|typed| check(&typed))
    }))
}

/// Accepts any argument and records it into `slot` when the call is matched.
pub fn capture<T>(slot: &CaptureSlot<T>) -> Result<T, MockError>
where
    T: MockValue + Clone + Send + 'static,
{
    register(Matcher::capture(slot.value_sink()))
}

fn register<T: MockValue>(matcher: Matcher<Value>) -> Result<T, MockError> {
    let class = T::value_class();
    let signature = current_recorder().with(|recorder| recorder.register(matcher, &class))?;
    T::from_value(signature)
}

// ── Stubbing ──────────────────────────────────────────────────────────────────

pub fn every<F, R>(block: F) -> Stubbing<F>
where
    F: FnMut() -> Result<R, MockError>,
{
    Stubbing { block }
}

#[must_use = "a stubbing has no effect until an answer is supplied"]
pub struct Stubbing<F> {
    block: F,
}

impl<F, R> Stubbing<F>
where
    F: FnMut() -> Result<R, MockError>,
{
    pub fn returns<T: MockValue>(self, value: T) -> Result<(), MockError> {
        self.then(Answer::constant(value.into_value()))
    }

    pub fn returns_many<T: MockValue>(self, values: Vec<T>) -> Result<(), MockError> {
        let values = values.into_iter().map(MockValue::into_value).collect();
        self.then(Answer::sequence(values)?)
    }

    pub fn answers<A>(self, answer: A) -> Result<(), MockError>
    where
        A: Fn(&Invocation) -> Result<Value, MockError> + Send + Sync + 'static,
    {
        self.then(Answer::lambda(answer))
    }

    pub fn fails(self, message: impl Into<String>) -> Result<(), MockError> {
        self.then(Answer::fail(message))
    }

    pub fn then(mut self, answer: Answer) -> Result<(), MockError> {
        let handle = current_recorder();
        handle.with(|recorder| recorder.start_stubbing())?;
        let result = record_rounds(&handle, &mut self.block)
            .and_then(|()| handle.with(|recorder| recorder.answer(answer)));
        settle(&handle, result)
    }
}

// ── Verification ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    pub ordering: Ordering,
    /// Fail when the calls did happen.
    pub inverse: bool,
}

impl VerifyOptions {
    pub fn ordering(ordering: Ordering) -> Self {
        Self {
            ordering,
            inverse: false,
        }
    }

    pub fn inverse() -> Self {
        Self {
            ordering: Ordering::Unordered,
            inverse: true,
        }
    }
}

pub fn verify<F, R>(block: F) -> Result<(), MockError>
where
    F: FnMut() -> Result<R, MockError>,
{
    verify_with(VerifyOptions::default(), block)
}

pub fn verify_sequence<F, R>(block: F) -> Result<(), MockError>
where
    F: FnMut() -> Result<R, MockError>,
{
    verify_with(VerifyOptions::ordering(Ordering::Sequence), block)
}

pub fn verify_ordered<F, R>(block: F) -> Result<(), MockError>
where
    F: FnMut() -> Result<R, MockError>,
{
    verify_with(VerifyOptions::ordering(Ordering::Ordered), block)
}

pub fn verify_not<F, R>(block: F) -> Result<(), MockError>
where
    F: FnMut() -> Result<R, MockError>,
{
    verify_with(VerifyOptions::inverse(), block)
}

pub fn verify_with<F, R>(options: VerifyOptions, mut block: F) -> Result<(), MockError>
where
    F: FnMut() -> Result<R, MockError>,
{
    let handle = current_recorder();
    handle.with(|recorder| recorder.start_verification())?;
    let result = record_rounds(&handle, &mut block).and_then(|()| {
        handle.with(|recorder| recorder.verify(options.ordering, options.inverse))
    });
    settle(&handle, result)
}

fn record_rounds<F, R>(handle: &RecorderHandle, block: &mut F) -> Result<(), MockError>
where
    F: FnMut() -> Result<R, MockError>,
{
    let total = handle.with(|recorder| recorder.rounds());
    for round in 0..total {
        block()?;
        handle.with(|recorder| recorder.catch_args(round, total))?;
    }
    Ok(())
}

fn settle(handle: &RecorderHandle, result: Result<(), MockError>) -> Result<(), MockError> {
    if result.is_err() {
        handle.with(|recorder| recorder.abort());
    }
    result
}

// ── Async blocks ──────────────────────────────────────────────────────────────
//
// Each attempt runs against a fork of the current recorder bound to the task,
// and every round's future is awaited to completion before the next starts.

pub fn every_async<F, Fut, R>(block: F) -> AsyncStubbing<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, MockError>>,
{
    AsyncStubbing { block }
}

#[must_use = "a stubbing has no effect until an answer is supplied"]
pub struct AsyncStubbing<F> {
    block: F,
}

impl<F, Fut, R> AsyncStubbing<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, MockError>>,
{
    pub async fn returns<T: MockValue>(self, value: T) -> Result<(), MockError> {
        self.then(Answer::constant(value.into_value())).await
    }

    pub async fn fails(self, message: impl Into<String>) -> Result<(), MockError> {
        self.then(Answer::fail(message)).await
    }

    pub async fn then(mut self, answer: Answer) -> Result<(), MockError> {
        let handle = current_recorder().fork();
        let scoped = handle.clone();
        with_task_recorder(scoped, async move {
            handle.with(|recorder| recorder.start_stubbing())?;
            let result = record_rounds_async(&handle, &mut self.block)
                .await
                .and_then(|()| handle.with(|recorder| recorder.answer(answer)));
            settle(&handle, result)
        })
        .await
    }
}

pub async fn verify_async<F, Fut, R>(options: VerifyOptions, mut block: F) -> Result<(), MockError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, MockError>>,
{
    let handle = current_recorder().fork();
    let scoped = handle.clone();
    with_task_recorder(scoped, async move {
        handle.with(|recorder| recorder.start_verification())?;
        let result = record_rounds_async(&handle, &mut block)
            .await
            .and_then(|()| {
                handle.with(|recorder| recorder.verify(options.ordering, options.inverse))
            });
        settle(&handle, result)
    })
    .await
}

async fn record_rounds_async<F, Fut, R>(
    handle: &RecorderHandle,
    block: &mut F,
) -> Result<(), MockError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, MockError>>,
{
    let total = handle.with(|recorder| recorder.rounds());
    for round in 0..total {
        block().await?;
        handle.with(|recorder| recorder.catch_args(round, total))?;
    }
    Ok(())
}
