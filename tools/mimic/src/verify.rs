use crate::invocation::Invocation;
use crate::recorder::CompiledCall;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    #[default]
    Unordered,
    Ordered,
    Sequence,
}

impl Ordering {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unordered => "unordered",
            Self::Ordered => "ordered",
            Self::Sequence => "sequence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    pub call_site: usize,
    pub matcher: String,
    pub reason: String,
}

impl VerificationFailure {
    fn new(call_site: usize, call: &CompiledCall, reason: impl Into<String>) -> Self {
        Self {
            call_site,
            matcher: call.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.matcher, self.reason)
    }
}

/// Matched invocations, one per compiled call, in call-site order.
pub type Matched = Vec<Invocation>;

pub trait Verifier {
    fn verify(&self, calls: &[CompiledCall]) -> Result<Matched, VerificationFailure>;
}

pub fn verifier_for(ordering: Ordering) -> Box<dyn Verifier> {
    match ordering {
        Ordering::Unordered => Box::new(UnorderedVerifier),
        Ordering::Ordered => Box::new(OrderedVerifier),
        Ordering::Sequence => Box::new(SequenceVerifier),
    }
}

pub struct UnorderedVerifier;

impl Verifier for UnorderedVerifier {
    fn verify(&self, calls: &[CompiledCall]) -> Result<Matched, VerificationFailure> {
        let mut matched = Vec::with_capacity(calls.len());
        for (call_site, call) in calls.iter().enumerate() {
            let history = call.double.history();
            match history.iter().find(|invocation| call.matcher.matches(invocation)) {
                Some(invocation) => matched.push(invocation.clone()),
                None => {
                    return Err(VerificationFailure::new(
                        call_site,
                        call,
                        format!("was not called; recorded calls: {}", render(&history)),
                    ))
                }
            }
        }
        Ok(matched)
    }
}

/// Exact sequence over the merged histories of the referenced doubles.
pub struct SequenceVerifier;

impl Verifier for SequenceVerifier {
    fn verify(&self, calls: &[CompiledCall]) -> Result<Matched, VerificationFailure> {
        let mut doubles = BTreeMap::new();
        for call in calls {
            doubles.entry(call.double.id()).or_insert_with(|| call.double.clone());
        }
        let mut merged = doubles
            .values()
            .flat_map(|double| double.history())
            .collect::<Vec<_>>();
        merged.sort_by_key(|invocation| invocation.timestamp);

        for (call_site, call) in calls.iter().enumerate() {
            let Some(invocation) = merged.get(call_site) else {
                return Err(VerificationFailure::new(
                    call_site,
                    call,
                    format!(
                        "was not called at position {call_site}; recorded sequence: {}",
                        render(&merged)
                    ),
                ));
            };
            if !call.matcher.matches(invocation) {
                return Err(VerificationFailure::new(
                    call_site,
                    call,
                    format!("position {call_site} was {invocation}"),
                ));
            }
        }

        if merged.len() != calls.len() {
            let call_site = calls.len().saturating_sub(1);
            let reason = format!(
                "expected exactly {} calls but {} were recorded: {}",
                calls.len(),
                merged.len(),
                render(&merged)
            );
            return Err(match calls.last() {
                Some(call) => VerificationFailure::new(call_site, call, reason),
                None => VerificationFailure {
                    call_site,
                    matcher: String::new(),
                    reason,
                },
            });
        }

        merged.truncate(calls.len());
        Ok(merged)
    }
}

/// Relaxed-order verification is not implemented; it always fails.
pub struct OrderedVerifier;

impl Verifier for OrderedVerifier {
    fn verify(&self, calls: &[CompiledCall]) -> Result<Matched, VerificationFailure> {
        let reason = "ordered verification is not implemented";
        Err(match calls.first() {
            Some(call) => VerificationFailure::new(0, call, reason),
            None => VerificationFailure {
                call_site: 0,
                matcher: String::new(),
                reason: reason.to_string(),
            },
        })
    }
}

fn render(invocations: &[Invocation]) -> String {
    if invocations.is_empty() {
        return "none".to_string();
    }
    let rendered = invocations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{rendered}]")
}
