use crate::double::DoubleId;
use crate::matcher::Matcher;
use crate::value::{Value, ValueClass};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static INVOCATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic order key shared by every double.
pub fn next_timestamp() -> u64 {
    INVOCATION_SEQ.fetch_add(1, Ordering::Relaxed)
}

pub const COMPLETION_TOKEN_CLASS: &str = "CompletionToken";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<ValueClass>,
    pub returns: ValueClass,
    /// Asynchronous call shape: the last parameter is a completion token.
    pub deferred: bool,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<ValueClass>, returns: ValueClass) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            deferred: false,
        }
    }

    pub fn deferred(
        name: impl Into<String>,
        mut params: Vec<ValueClass>,
        returns: ValueClass,
    ) -> Self {
        params.push(ValueClass::object(COMPLETION_TOKEN_CLASS));
        Self {
            name: name.into(),
            params,
            returns,
            deferred: true,
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub receiver: DoubleId,
    pub receiver_name: Arc<str>,
    pub method: Arc<MethodDescriptor>,
    pub args: Vec<Value>,
    pub timestamp: u64,
}

impl Invocation {
    pub fn new(
        receiver: DoubleId,
        receiver_name: Arc<str>,
        method: Arc<MethodDescriptor>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            receiver,
            receiver_name,
            method,
            args,
            timestamp: next_timestamp(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.receiver_name, self.method.name)?;
        write_joined(f, &self.args)?;
        f.write_str(")")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationMatcher {
    pub receiver: Matcher<DoubleId>,
    pub method: Matcher<MethodDescriptor>,
    pub args: Vec<Matcher<Value>>,
}

impl InvocationMatcher {
    pub fn matches(&self, invocation: &Invocation) -> bool {
        self.receiver.matches(&invocation.receiver)
            && self.method.matches(invocation.method.as_ref())
            && self.args.len() == invocation.args.len()
            && self
                .args
                .iter()
                .zip(&invocation.args)
                .all(|(matcher, arg)| matcher.matches(arg))
    }

    pub fn capture_args(&self, invocation: &Invocation) {
        for (matcher, arg) in self.args.iter().zip(&invocation.args) {
            matcher.capture_value(arg);
        }
    }

    /// Renders the matcher against a readable receiver name.
    pub fn render(&self, receiver_name: &str) -> String {
        let method = match &self.method {
            Matcher::Equality(method) => method.name.clone(),
            other => other.to_string(),
        };
        let args = self
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{receiver_name}.{method}({args})")
    }
}

impl fmt::Display for InvocationMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let receiver = match &self.receiver {
            Matcher::Equality(id) => id.to_string(),
            other => other.to_string(),
        };
        f.write_str(&self.render(&receiver))
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
