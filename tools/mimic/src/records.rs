//! Serializable mirrors of calls and compiled matchers, used as log payloads.

use crate::invocation::Invocation;
use crate::recorder::CompiledCall;
use crate::verify::Ordering;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRecord {
    pub receiver: String,
    pub method: String,
    pub args: Vec<String>,
    pub timestamp: u64,
}

impl From<&Invocation> for InvocationRecord {
    fn from(invocation: &Invocation) -> Self {
        Self {
            receiver: invocation.receiver_name.to_string(),
            method: invocation.method.name.clone(),
            args: invocation.args.iter().map(ToString::to_string).collect(),
            timestamp: invocation.timestamp,
        }
    }
}

impl InvocationRecord {
    /// Merged history of every double referenced by `calls`, oldest first.
    pub fn histories(calls: &[CompiledCall]) -> Vec<Self> {
        let mut doubles = BTreeMap::new();
        for call in calls {
            doubles.entry(call.double.id()).or_insert(&call.double);
        }
        let mut records = doubles
            .values()
            .flat_map(|double| double.history())
            .map(|invocation| Self::from(&invocation))
            .collect::<Vec<_>>();
        records.sort_by_key(|record| record.timestamp);
        records
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledCallRecord {
    pub call_site: usize,
    pub receiver: String,
    pub matcher: String,
}

impl CompiledCallRecord {
    pub fn from_compiled(calls: &[CompiledCall]) -> Vec<Self> {
        calls
            .iter()
            .enumerate()
            .map(|(call_site, call)| Self {
                call_site,
                receiver: call.double.to_string(),
                matcher: call.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationRecord {
    pub ordering: Ordering,
    pub inverse: bool,
    pub passed: bool,
    pub calls: Vec<CompiledCallRecord>,
    pub failure: Option<String>,
    /// Calls the referenced doubles had received, filled in on failure.
    pub recorded: Vec<InvocationRecord>,
}
