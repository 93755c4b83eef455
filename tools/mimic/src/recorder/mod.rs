//! Per-context call recorder: the mode machine behind stubbing and verification.
//!
//! # Overview
//!
//! A recorder starts in `ANSWERING`, where intercepted calls go straight to
//! the double. `start_stubbing` / `start_verification` switch it into a
//! recording mode for one attempt:
//! 1. the driver executes the block once per round, calling `catch_args`
//!    after each execution;
//! 2. matcher helpers call `register`, which hands back a fresh signature
//!    to pass in place of the real argument;
//! 3. after the last round the recorded rounds are compiled into one
//!    `InvocationMatcher` per call-site;
//! 4. `answer` or `verify` consumes the compiled calls and returns the
//!    recorder to `ANSWERING`.
//!
//! Each thread owns its own recorder, and async attempts run against a
//! task-local one, so rounds of concurrent attempts never interleave.

mod compile;

use crate::answer::Answer;
use crate::config::MockConfig;
use crate::double::{Double, DoubleId};
use crate::errors::MockError;
use crate::instantiate::{DefaultInstantiator, Instantiator};
use crate::invocation::{Invocation, InvocationMatcher};
use crate::logging::{JsonlLogger, LogEvent};
use crate::matcher::Matcher;
use crate::records::{CompiledCallRecord, InvocationRecord, VerificationRecord};
use crate::signature::{CallRound, SignatureGenerator, SignedCall};
use crate::value::{Value, ValueClass};
use crate::verify::{verifier_for, Ordering};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderMode {
    Answering,
    Stubbing,
    Verifying,
}

impl RecorderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Answering => "ANSWERING",
            Self::Stubbing => "STUBBING",
            Self::Verifying => "VERIFYING",
        }
    }
}

pub fn validate_transition(from: RecorderMode, to: RecorderMode) -> Result<(), MockError> {
    use RecorderMode as M;

    let allowed = match from {
        M::Answering => matches!(to, M::Stubbing | M::Verifying),
        M::Stubbing | M::Verifying => to == M::Answering,
    };

    if !allowed {
        return Err(MockError::Usage(format!(
            "illegal recorder transition: {} -> {}",
            from.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}

/// One call-site's compiled matcher, bound to the double it was made on.
#[derive(Debug, Clone)]
pub struct CompiledCall {
    pub double: Double,
    pub matcher: InvocationMatcher,
    pub returned: Value,
}

impl fmt::Display for CompiledCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.matcher.render(self.double.name()))
    }
}

pub struct CallRecorder {
    mode: RecorderMode,
    config: MockConfig,
    instantiator: Arc<dyn Instantiator>,
    signatures: SignatureGenerator,
    logger: Option<JsonlLogger>,
    pending_matchers: Vec<Matcher<Value>>,
    pending_signatures: Vec<Value>,
    current_round: Vec<SignedCall>,
    rounds: Vec<CallRound>,
    compiled: Option<Vec<CompiledCall>>,
}

impl CallRecorder {
    pub fn new(config: MockConfig) -> Self {
        Self::with_instantiator(config, Arc::new(DefaultInstantiator))
    }

    pub fn with_instantiator(config: MockConfig, instantiator: Arc<dyn Instantiator>) -> Self {
        Self {
            mode: RecorderMode::Answering,
            signatures: SignatureGenerator::new(config.recording.seed),
            logger: JsonlLogger::from_config(&config.logging),
            config,
            instantiator,
            pending_matchers: Vec::new(),
            pending_signatures: Vec::new(),
            current_round: Vec::new(),
            rounds: Vec::new(),
            compiled: None,
        }
    }

    /// A fresh recorder with this one's configuration and instantiator.
    pub fn fork(&self) -> Self {
        Self::with_instantiator(self.config.clone(), Arc::clone(&self.instantiator))
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn rounds(&self) -> usize {
        self.config.recording.rounds
    }

    pub fn compiled(&self) -> &[CompiledCall] {
        self.compiled.as_deref().unwrap_or(&[])
    }

    pub fn start_stubbing(&mut self) -> Result<(), MockError> {
        self.enter(RecorderMode::Stubbing)
    }

    pub fn start_verification(&mut self) -> Result<(), MockError> {
        self.enter(RecorderMode::Verifying)
    }

    /// Draws a signature for `class` and queues `matcher` for the next call.
    pub fn register(
        &mut self,
        matcher: Matcher<Value>,
        class: &ValueClass,
    ) -> Result<Value, MockError> {
        self.require_recording("register")?;
        let signature = self.signatures.draw(class, self.instantiator.as_ref())?;
        self.pending_matchers.push(matcher);
        self.pending_signatures.push(signature.clone());
        Ok(signature)
    }

    /// Captures an intercepted call made while stubbing or verifying.
    pub fn record_call(
        &mut self,
        double: &Double,
        invocation: Invocation,
    ) -> Result<Value, MockError> {
        self.require_recording("record_call")?;
        let returned = self.instantiator.instantiate(&invocation.method.returns)?;
        self.current_round.push(SignedCall {
            double: double.clone(),
            invocation,
            matchers: std::mem::take(&mut self.pending_matchers),
            signatures: std::mem::take(&mut self.pending_signatures),
            returned: returned.clone(),
        });
        Ok(returned)
    }

    /// Closes round `round` of `total_rounds`; the last one triggers compilation.
    pub fn catch_args(&mut self, round: usize, total_rounds: usize) -> Result<(), MockError> {
        self.require_recording("catch_args")?;
        if total_rounds < 2 {
            return Err(MockError::Usage(format!(
                "at least 2 rounds are needed to correlate matchers, got {total_rounds}"
            )));
        }
        if round != self.rounds.len() || round >= total_rounds {
            return Err(MockError::Usage(format!(
                "round {round} of {total_rounds} caught out of order; expected round {}",
                self.rounds.len()
            )));
        }
        if let Some(dangling) = self.pending_matchers.first() {
            return Err(MockError::Usage(format!(
                "matcher {dangling} was registered after the last call of round {round}"
            )));
        }

        let calls = std::mem::take(&mut self.current_round);
        self.rounds.push(CallRound { calls });

        if round + 1 == total_rounds {
            let compiled = compile::compile(&self.rounds)?;
            self.log(
                "recorder.compiled",
                json!({
                    "mode": self.mode.as_str(),
                    "rounds": total_rounds,
                    "calls": CompiledCallRecord::from_compiled(&compiled),
                }),
            );
            self.compiled = Some(compiled);
        }
        Ok(())
    }

    /// Attaches `answer` to the last call-site and constant answers yielding
    /// the recorded return values to every inner one.
    pub fn answer(&mut self, answer: Answer) -> Result<(), MockError> {
        if self.mode != RecorderMode::Stubbing {
            return Err(MockError::Usage(format!(
                "answer is only valid while stubbing; the recorder is in {} mode",
                self.mode.as_str()
            )));
        }
        let mut compiled = self.compiled.take().ok_or_else(|| {
            MockError::Usage("answer called before the stubbing block finished all rounds".to_string())
        })?;
        let already_stubbed = rebind_chained_receivers(&mut compiled);

        let priority = self.config.answers.priority;
        let mut supplied = Some(answer);
        for (call, stubbed) in compiled.iter().zip(already_stubbed).rev() {
            let answer = match supplied.take() {
                Some(answer) => answer,
                None if stubbed => continue,
                None => Answer::constant(call.returned.clone()),
            };
            call.double.attach(call.matcher.clone(), answer, priority);
        }

        self.log(
            "answer.attached",
            json!({
                "priority": priority.as_str(),
                "calls": CompiledCallRecord::from_compiled(&compiled),
            }),
        );
        self.finish()
    }

    /// Checks recorded history against the compiled calls.
    pub fn verify(&mut self, ordering: Ordering, inverse: bool) -> Result<(), MockError> {
        if self.mode != RecorderMode::Verifying {
            return Err(MockError::Usage(format!(
                "verify is only valid while verifying; the recorder is in {} mode",
                self.mode.as_str()
            )));
        }
        let mut compiled = self.compiled.take().ok_or_else(|| {
            MockError::Usage(
                "verify called before the verification block finished all rounds".to_string(),
            )
        })?;
        self.finish()?;
        rebind_chained_receivers(&mut compiled);

        let failure = match (verifier_for(ordering).verify(&compiled), inverse) {
            (Ok(matched), false) => {
                for (call, invocation) in compiled.iter().zip(&matched) {
                    call.matcher.capture_args(invocation);
                }
                None
            }
            (Err(failure), false) => Some(failure.to_string()),
            (Ok(_), true) => Some(format!(
                "{} was called but was expected not to be",
                compiled.first().map(ToString::to_string).unwrap_or_default()
            )),
            (Err(_), true) => None,
        };

        let record = VerificationRecord {
            ordering,
            inverse,
            passed: failure.is_none(),
            calls: CompiledCallRecord::from_compiled(&compiled),
            recorded: if failure.is_some() {
                InvocationRecord::histories(&compiled)
            } else {
                Vec::new()
            },
            failure: failure.clone(),
        };
        let event_type = if record.passed {
            "verify.passed"
        } else {
            "verify.failed"
        };
        self.log(event_type, serde_json::to_value(&record).unwrap_or_default());

        match failure {
            Some(message) => Err(MockError::Verification(message)),
            None => Ok(()),
        }
    }

    /// Drops the in-flight attempt and returns to `ANSWERING`.
    pub fn abort(&mut self) {
        if self.mode != RecorderMode::Answering {
            self.log(
                "recorder.aborted",
                json!({ "mode": self.mode.as_str(), "rounds": self.rounds.len() }),
            );
        }
        self.reset_buffers();
        self.mode = RecorderMode::Answering;
    }

    fn enter(&mut self, mode: RecorderMode) -> Result<(), MockError> {
        if self.mode != RecorderMode::Answering {
            return Err(MockError::Usage(format!(
                "cannot start {} while the recorder is in {} mode",
                mode.as_str(),
                self.mode.as_str()
            )));
        }
        validate_transition(self.mode, mode)?;
        self.reset_buffers();
        self.mode = mode;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MockError> {
        validate_transition(self.mode, RecorderMode::Answering)?;
        self.reset_buffers();
        self.mode = RecorderMode::Answering;
        Ok(())
    }

    fn require_recording(&self, operation: &str) -> Result<(), MockError> {
        if self.mode == RecorderMode::Answering {
            return Err(MockError::Usage(format!(
                "{operation} is only valid while stubbing or verifying; the recorder is in {} mode",
                self.mode.as_str()
            )));
        }
        Ok(())
    }

    fn reset_buffers(&mut self) {
        self.pending_matchers.clear();
        self.pending_signatures.clear();
        self.current_round.clear();
        self.rounds.clear();
        self.compiled = None;
    }

    fn log(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(logger) = &self.logger {
            let _ = logger.append(&LogEvent::info(event_type, payload));
        }
    }
}

/// Points chained call-sites at the child doubles that earlier stubs already
/// hand out, so every attempt over one chain reaches the same receivers.
///
/// Returns, per call-site, whether the call is already stubbed to answer that
/// child under an equal matcher. The last call-site is never rebound as a
/// parent since its return value feeds no later call.
fn rebind_chained_receivers(compiled: &mut [CompiledCall]) -> Vec<bool> {
    let mut children: HashMap<DoubleId, Double> = HashMap::new();
    let mut already_stubbed = vec![false; compiled.len()];
    let last = compiled.len().saturating_sub(1);

    for (site, call) in compiled.iter_mut().enumerate() {
        if let Some(child) = children.get(&call.double.id()) {
            call.double = child.clone();
            call.matcher.receiver = Matcher::Equality(child.id());
        }
        if site == last {
            continue;
        }
        let Value::Double(recorded) = &call.returned else {
            continue;
        };
        let recorded = recorded.id();
        if let Some((child, stubbed)) = call.double.resolve_child(&call.matcher) {
            children.insert(recorded, child.clone());
            call.returned = Value::Double(child);
            already_stubbed[site] = stubbed;
        }
    }
    already_stubbed
}

// ── Context-local recorders ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct RecorderHandle {
    inner: Arc<Mutex<CallRecorder>>,
}

impl RecorderHandle {
    pub fn new(recorder: CallRecorder) -> Self {
        Self {
            inner: Arc::new(Mutex::new(recorder)),
        }
    }

    /// Runs `f` under the recorder lock; never call back into a double from `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut CallRecorder) -> R) -> R {
        let mut recorder = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut recorder)
    }

    /// Interception entry: records the call while stubbing or verifying,
    /// otherwise lets the double answer it.
    pub fn call(&self, double: &Double, invocation: Invocation) -> Result<Value, MockError> {
        let recorded = self.with(|recorder| {
            if recorder.mode() == RecorderMode::Answering {
                Err(invocation)
            } else {
                Ok(recorder.record_call(double, invocation))
            }
        });
        match recorded {
            Ok(result) => result,
            Err(invocation) => double.dispatch(invocation),
        }
    }

    pub fn fork(&self) -> Self {
        Self::new(self.with(|recorder| recorder.fork()))
    }
}

thread_local! {
    static THREAD_RECORDER: RefCell<RecorderHandle> =
        RefCell::new(RecorderHandle::new(CallRecorder::new(MockConfig::default())));
}

tokio::task_local! {
    static TASK_RECORDER: RecorderHandle;
}

/// The recorder bound to the running task, else to the current thread.
pub fn current_recorder() -> RecorderHandle {
    TASK_RECORDER
        .try_with(RecorderHandle::clone)
        .unwrap_or_else(|_| THREAD_RECORDER.with(|cell| cell.borrow().clone()))
}

/// Replaces the current thread's recorder with a fresh one using `config`.
pub fn init_thread_recorder(config: MockConfig) {
    install_thread_recorder(CallRecorder::new(config));
}

pub fn install_thread_recorder(recorder: CallRecorder) {
    THREAD_RECORDER.with(|cell| *cell.borrow_mut() = RecorderHandle::new(recorder));
}

/// Runs `future` with `handle` as the task's recorder.
pub async fn with_task_recorder<F: Future>(handle: RecorderHandle, future: F) -> F::Output {
    TASK_RECORDER.scope(handle, future).await
}
