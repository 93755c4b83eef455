//! Reference double instance: owns recorded-call history and attached answers.
//!
//! Proxy types forward each intercepted method to [`Double::invoke`], which
//! routes the call through the current context's recorder. Outside of a
//! stub/verify block the recorder hands the call back to [`Double::dispatch`].

use crate::answer::Answer;
use crate::config::AnswerPriority;
use crate::errors::MockError;
use crate::instantiate::{DefaultInstantiator, Instantiator};
use crate::invocation::{next_timestamp, Invocation, InvocationMatcher, MethodDescriptor};
use crate::recorder::current_recorder;
use crate::value::{MockValue, ObjectRef, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static NEXT_DOUBLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DoubleId(u64);

impl DoubleId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DoubleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trailing argument appended to every deferred call.
#[derive(Debug, PartialEq)]
pub struct CompletionToken {
    pub call: u64,
}

#[derive(Default)]
struct DoubleState {
    history: Vec<Invocation>,
    answers: Vec<(InvocationMatcher, Answer)>,
}

struct DoubleInner {
    id: DoubleId,
    name: Arc<str>,
    instantiator: Arc<dyn Instantiator>,
    state: Mutex<DoubleState>,
}

#[derive(Clone)]
pub struct Double {
    inner: Arc<DoubleInner>,
}

impl Double {
    pub fn new(name: &str) -> Self {
        Self::with_instantiator(name, Arc::new(DefaultInstantiator))
    }

    pub fn with_instantiator(name: &str, instantiator: Arc<dyn Instantiator>) -> Self {
        Self {
            inner: Arc::new(DoubleInner {
                id: DoubleId(NEXT_DOUBLE_ID.fetch_add(1, Ordering::Relaxed)),
                name: Arc::from(name),
                instantiator,
                state: Mutex::new(DoubleState::default()),
            }),
        }
    }

    pub fn id(&self) -> DoubleId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// Interception entry point: the proxy's method body.
    pub fn invoke(
        &self,
        method: &Arc<MethodDescriptor>,
        args: Vec<Value>,
    ) -> Result<Value, MockError> {
        let invocation = Invocation::new(self.id(), self.name_arc(), Arc::clone(method), args);
        current_recorder().call(self, invocation)
    }

    pub fn invoke_as<R: MockValue>(
        &self,
        method: &Arc<MethodDescriptor>,
        args: Vec<Value>,
    ) -> Result<R, MockError> {
        R::from_value(self.invoke(method, args)?)
    }

    /// Asynchronous call shape: suspends once, then intercepts the call with a
    /// fresh completion token as the trailing argument.
    pub async fn invoke_deferred(
        &self,
        method: &Arc<MethodDescriptor>,
        mut args: Vec<Value>,
    ) -> Result<Value, MockError> {
        if !method.deferred {
            return Err(MockError::Usage(format!(
                "{}.{} is not a deferred method",
                self.name(),
                method.name
            )));
        }
        tokio::task::yield_now().await;
        args.push(Value::Object(ObjectRef::new(CompletionToken {
            call: next_timestamp(),
        })));
        self.invoke(method, args)
    }

    pub async fn invoke_deferred_as<R: MockValue>(
        &self,
        method: &Arc<MethodDescriptor>,
        args: Vec<Value>,
    ) -> Result<R, MockError> {
        R::from_value(self.invoke_deferred(method, args).await?)
    }

    /// Every real call this double has received, in arrival order.
    pub fn history(&self) -> Vec<Invocation> {
        self.state().history.clone()
    }

    pub fn answer_count(&self) -> usize {
        self.state().answers.len()
    }

    pub(crate) fn attach(
        &self,
        matcher: InvocationMatcher,
        answer: Answer,
        priority: AnswerPriority,
    ) {
        let mut state = self.state();
        match priority {
            AnswerPriority::FirstRegistered => state.answers.push((matcher, answer)),
            AnswerPriority::MostRecent => state.answers.insert(0, (matcher, answer)),
        }
    }

    /// Child double that calls accepted by `matcher` resolve to: the constant
    /// answer stubbed under an equal matcher (flagged `true`), else the answer
    /// that served a recorded call `matcher` accepts. Neither answers nor
    /// history change.
    pub(crate) fn resolve_child(&self, matcher: &InvocationMatcher) -> Option<(Double, bool)> {
        let state = self.state();
        let stubbed = state.answers.iter().find_map(|(existing, answer)| match answer {
            Answer::Constant(Value::Double(child)) if existing == matcher => Some(child.clone()),
            _ => None,
        });
        if let Some(child) = stubbed {
            return Some((child, true));
        }
        state
            .history
            .iter()
            .filter(|invocation| matcher.matches(invocation))
            .find_map(|invocation| {
                let (_, answer) = state
                    .answers
                    .iter()
                    .find(|(existing, _)| existing.matches(invocation))?;
                match answer {
                    Answer::Constant(Value::Double(child)) => Some((child.clone(), false)),
                    _ => None,
                }
            })
    }

    /// Resolves a real call against the attached answers and records it.
    pub(crate) fn dispatch(&self, invocation: Invocation) -> Result<Value, MockError> {
        let found = {
            let mut state = self.state();
            let found = state
                .answers
                .iter()
                .find(|(matcher, _)| matcher.matches(&invocation))
                .cloned();
            state.history.push(invocation.clone());
            found
        };
        match found {
            Some((matcher, answer)) => {
                matcher.capture_args(&invocation);
                answer.evaluate(&invocation)
            }
            None => self.inner.instantiator.instantiate(&invocation.method.returns),
        }
    }

    fn state(&self) -> MutexGuard<'_, DoubleState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Double {}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.id())
    }
}

impl fmt::Debug for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Double({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{CaptureSlot, Matcher};
    use crate::value::ValueClass;

    fn get() -> Arc<MethodDescriptor> {
        MethodDescriptor::new("get", vec![ValueClass::Int], ValueClass::Int).shared()
    }

    fn matcher_for(double: &Double, arg: Matcher<Value>) -> InvocationMatcher {
        InvocationMatcher {
            receiver: Matcher::Equality(double.id()),
            method: Matcher::Equality(get().as_ref().clone()),
            args: vec![arg],
        }
    }

    #[test]
    fn unmatched_call_falls_back_to_type_default_and_is_recorded() {
        let double = Double::new("repo");
        let value = double.invoke(&get(), vec![Value::Int(4)]).expect("invoke");
        assert_eq!(value, Value::Int(0));
        assert_eq!(double.history().len(), 1);
        assert_eq!(double.history()[0].args, vec![Value::Int(4)]);
    }

    #[test]
    fn first_registered_answer_wins_by_default() {
        let double = Double::new("repo");
        double.attach(
            matcher_for(&double, Matcher::Wildcard),
            Answer::constant(Value::Int(1)),
            AnswerPriority::FirstRegistered,
        );
        double.attach(
            matcher_for(&double, Matcher::Equality(Value::Int(3))),
            Answer::constant(Value::Int(2)),
            AnswerPriority::FirstRegistered,
        );
        let value = double.invoke(&get(), vec![Value::Int(3)]).expect("invoke");
        assert_eq!(value, Value::Int(1));
        assert_eq!(double.answer_count(), 2);
    }

    #[test]
    fn most_recent_priority_puts_new_answers_first() {
        let double = Double::new("repo");
        double.attach(
            matcher_for(&double, Matcher::Wildcard),
            Answer::constant(Value::Int(1)),
            AnswerPriority::MostRecent,
        );
        double.attach(
            matcher_for(&double, Matcher::Equality(Value::Int(3))),
            Answer::constant(Value::Int(2)),
            AnswerPriority::MostRecent,
        );
        assert_eq!(
            double.invoke(&get(), vec![Value::Int(3)]).expect("invoke"),
            Value::Int(2)
        );
        assert_eq!(
            double.invoke(&get(), vec![Value::Int(5)]).expect("invoke"),
            Value::Int(1)
        );
    }

    #[test]
    fn capture_runs_only_on_the_matched_answer() {
        let double = Double::new("repo");
        let slot: CaptureSlot<i64> = CaptureSlot::new();
        double.attach(
            matcher_for(&double, Matcher::capture(slot.value_sink())),
            Answer::constant(Value::Int(9)),
            AnswerPriority::FirstRegistered,
        );
        let value = double.invoke(&get(), vec![Value::Int(42)]).expect("invoke");
        assert_eq!(value, Value::Int(9));
        assert_eq!(slot.captured(), vec![42]);
    }

    #[test]
    fn completion_token_carries_the_deferred_parameter_class() {
        let token = Value::Object(ObjectRef::new(CompletionToken { call: 1 }));
        assert_eq!(
            token.class(),
            ValueClass::object(crate::invocation::COMPLETION_TOKEN_CLASS)
        );
    }

    #[test]
    fn doubles_compare_by_identity() {
        let a = Double::new("same");
        let b = Double::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.id(), b.id());
    }
}
