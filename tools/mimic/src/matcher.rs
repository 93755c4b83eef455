use crate::value::{MockValue, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type PredicateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type SinkFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Predicate<T> {
    description: String,
    check: PredicateFn<T>,
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<T> Predicate<T> {
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Write side of a [`CaptureSlot`], erased over the slot's element type.
pub struct CaptureSink<T> {
    slot: usize,
    push: SinkFn<T>,
}

impl<T> Clone for CaptureSink<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot,
            push: Arc::clone(&self.push),
        }
    }
}

impl<T> CaptureSink<T> {
    pub fn push(&self, value: &T) {
        (self.push)(value);
    }
}

/// Ordered record of every real argument a capture matcher has seen.
pub struct CaptureSlot<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for CaptureSlot<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<T> Default for CaptureSlot<T> {
    fn default() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> CaptureSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<T> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<T> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.values) as usize
    }
}

impl<T: Clone + Send + 'static> CaptureSlot<T> {
    /// Sink storing values of the slot's own type.
    pub fn sink(&self) -> CaptureSink<T> {
        let values = Arc::clone(&self.values);
        CaptureSink {
            slot: self.id(),
            push: Arc::new(move |value: &T| {
                values
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(value.clone());
            }),
        }
    }
}

impl<T: MockValue + Clone + Send + 'static> CaptureSlot<T> {
    /// Sink accepting dynamic values; values of another class are dropped.
    pub fn value_sink(&self) -> CaptureSink<Value> {
        let values = Arc::clone(&self.values);
        CaptureSink {
            slot: self.id(),
            push: Arc::new(move |value: &Value| {
                if let Ok(converted) = T::from_value(value.clone()) {
                    values
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(converted);
                }
            }),
        }
    }
}

pub enum Matcher<T> {
    Equality(T),
    Wildcard,
    Predicate(Predicate<T>),
    Capture(CaptureSink<T>),
}

impl<T> Matcher<T> {
    pub fn predicate<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate {
            description: description.into(),
            check: Arc::new(check),
        })
    }

    pub fn capture(sink: CaptureSink<T>) -> Self {
        Self::Capture(sink)
    }

    /// Feeds `value` to the sink when this is a capture matcher.
    pub fn capture_value(&self, value: &T) {
        if let Self::Capture(sink) = self {
            sink.push(value);
        }
    }
}

impl<T: PartialEq> Matcher<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Equality(expected) => expected == value,
            Self::Wildcard | Self::Capture(_) => true,
            Self::Predicate(predicate) => (predicate.check)(value),
        }
    }
}

impl<T: Clone> Clone for Matcher<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Equality(value) => Self::Equality(value.clone()),
            Self::Wildcard => Self::Wildcard,
            Self::Predicate(predicate) => Self::Predicate(predicate.clone()),
            Self::Capture(sink) => Self::Capture(sink.clone()),
        }
    }
}

/// Predicates compare by description, captures by the slot they write to.
impl<T: PartialEq> PartialEq for Matcher<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Equality(a), Self::Equality(b)) => a == b,
            (Self::Wildcard, Self::Wildcard) => true,
            (Self::Predicate(a), Self::Predicate(b)) => a.description == b.description,
            (Self::Capture(a), Self::Capture(b)) => a.slot == b.slot,
            _ => false,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equality(value) => write!(f, "eq({value})"),
            Self::Wildcard => f.write_str("any()"),
            Self::Predicate(predicate) => write!(f, "matching({})", predicate.description),
            Self::Capture(_) => f.write_str("capture()"),
        }
    }
}

impl<T: fmt::Display> fmt::Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
