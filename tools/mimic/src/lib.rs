//! Call recording and matcher correlation for test doubles.
//!
//! A stub or verify block is executed several times. Matcher helpers hand a
//! fresh random signature to each call they annotate, and comparing the
//! values seen at each argument position across executions tells which
//! positions a matcher governs and which carry literals.

pub mod answer;
pub mod config;
pub mod double;
pub mod dsl;
pub mod errors;
pub mod instantiate;
pub mod invocation;
pub mod logging;
pub mod matcher;
pub mod recorder;
pub mod records;
pub mod signature;
pub mod value;
pub mod verify;

pub use answer::Answer;
pub use config::{load_config, AnswerPriority, MockConfig};
pub use double::{CompletionToken, Double, DoubleId};
pub use dsl::{
    any, capture, eq, every, every_async, matching, verify, verify_async, verify_not,
    verify_ordered, verify_sequence, verify_with, VerifyOptions,
};
pub use errors::MockError;
pub use instantiate::{DefaultInstantiator, Instantiator};
pub use invocation::{Invocation, InvocationMatcher, MethodDescriptor};
pub use matcher::{CaptureSlot, Matcher};
pub use recorder::{current_recorder, init_thread_recorder, CallRecorder, CompiledCall};
pub use value::{Identity, MockValue, ObjectRef, Value, ValueClass};
pub use verify::Ordering;
