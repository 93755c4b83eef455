use crate::errors::MockError;
use crate::invocation::Invocation;
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type AnswerFn = Arc<dyn Fn(&Invocation) -> Result<Value, MockError> + Send + Sync>;

#[derive(Clone)]
pub enum Answer {
    Constant(Value),
    Lambda(AnswerFn),
    /// Successive values; the last one repeats once the rest are used up.
    Sequence {
        values: Arc<[Value]>,
        cursor: Arc<AtomicUsize>,
    },
    Fail(String),
}

impl Answer {
    pub fn constant(value: Value) -> Self {
        Self::Constant(value)
    }

    pub fn lambda<F>(answer: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value, MockError> + Send + Sync + 'static,
    {
        Self::Lambda(Arc::new(answer))
    }

    pub fn sequence(values: Vec<Value>) -> Result<Self, MockError> {
        if values.is_empty() {
            return Err(MockError::Usage(
                "an answer sequence needs at least one value".to_string(),
            ));
        }
        Ok(Self::Sequence {
            values: values.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    pub fn evaluate(&self, invocation: &Invocation) -> Result<Value, MockError> {
        match self {
            Self::Constant(value) => Ok(value.clone()),
            Self::Lambda(answer) => answer(invocation),
            Self::Sequence { values, cursor } => {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                let last = values.len().saturating_sub(1);
                values
                    .get(idx.min(last))
                    .cloned()
                    .ok_or_else(|| MockError::Answer("answer sequence is empty".to_string()))
            }
            Self::Fail(message) => Err(MockError::Answer(message.clone())),
        }
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "Constant({value})"),
            Self::Lambda(_) => f.write_str("Lambda"),
            Self::Sequence { values, .. } => write!(f, "Sequence(len={})", values.len()),
            Self::Fail(message) => write!(f, "Fail({message:?})"),
        }
    }
}
