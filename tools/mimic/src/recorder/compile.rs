//! Matcher compilation: correlates declared matchers with argument positions
//! by comparing per-round value sequences.
//!
//! A literal argument is the same in every round. A matcher-governed argument
//! carries the signature minted by its registration, which is fresh each
//! round, so the sequence observed at that position equals exactly one
//! matcher's signature sequence.

use super::CompiledCall;
use crate::errors::MockError;
use crate::invocation::InvocationMatcher;
use crate::matcher::Matcher;
use crate::signature::{CallRound, SignedCall};
use crate::value::{Identity, Value};
use std::collections::HashMap;

pub(crate) fn compile(rounds: &[CallRound]) -> Result<Vec<CompiledCall>, MockError> {
    let Some(template) = rounds.first() else {
        return Err(MockError::Usage("no rounds were recorded".to_string()));
    };
    if template.calls.is_empty() {
        return Err(MockError::Usage(
            "the block made no calls to any double".to_string(),
        ));
    }
    for (idx, round) in rounds.iter().enumerate().skip(1) {
        if round.calls.len() != template.calls.len() {
            return Err(MockError::Usage(format!(
                "round {idx} made {} calls but round 0 made {}; the block must make the same calls every round",
                round.calls.len(),
                template.calls.len()
            )));
        }
    }

    template
        .calls
        .iter()
        .enumerate()
        .map(|(site, call)| compile_call_site(rounds, site, call))
        .collect()
}

fn compile_call_site(
    rounds: &[CallRound],
    site: usize,
    template: &SignedCall,
) -> Result<CompiledCall, MockError> {
    let arg_count = template.invocation.args.len();
    let matcher_count = template.matchers.len();
    let label = || format!("call-site {site} ({})", template.invocation);

    if matcher_count > arg_count {
        return Err(MockError::Usage(format!(
            "{} declared {matcher_count} matchers for {arg_count} arguments",
            label()
        )));
    }

    let calls = rounds
        .iter()
        .map(|round| &round.calls[site])
        .collect::<Vec<_>>();
    for (idx, call) in calls.iter().enumerate() {
        if call.invocation.method != template.invocation.method {
            return Err(MockError::Usage(format!(
                "{} called {} in round {idx}",
                label(),
                call.invocation.method.name
            )));
        }
        if call.matchers.len() != matcher_count || call.signatures.len() != matcher_count {
            return Err(MockError::Usage(format!(
                "{} declared {} matchers in round {idx} but {matcher_count} in round 0",
                label(),
                call.matchers.len()
            )));
        }
        if call.invocation.args.len() != arg_count {
            return Err(MockError::Usage(format!(
                "{} passed {} arguments in round {idx} but {arg_count} in round 0",
                label(),
                call.invocation.args.len()
            )));
        }
    }

    let signatures = (0..matcher_count)
        .map(|slot| {
            calls
                .iter()
                .map(|call| Identity(call.signatures[slot].clone()))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let mut by_signature: HashMap<Vec<Identity>, usize> = HashMap::with_capacity(matcher_count);
    for (slot, sequence) in signatures.iter().enumerate() {
        if by_signature.insert(sequence.clone(), slot).is_some() {
            return Err(MockError::Usage(format!(
                "{}: matcher {} cannot be told apart from another matcher",
                label(),
                template.matchers[slot]
            )));
        }
    }

    let deferred_position = if template.invocation.method.deferred {
        arg_count.checked_sub(1)
    } else {
        None
    };
    let observed = (0..arg_count)
        .map(|position| {
            (Some(position) != deferred_position).then(|| {
                calls
                    .iter()
                    .map(|call| Identity(call.invocation.args[position].clone()))
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    // A signature sequence seen at two positions means a literal happened to
    // repeat the drawn values in every round.
    for (slot, sequence) in signatures.iter().enumerate() {
        let mut positions = observed
            .iter()
            .enumerate()
            .filter(|(_, values)| values.as_ref() == Some(sequence))
            .map(|(position, _)| position);
        if let (Some(first), Some(second)) = (positions.next(), positions.next()) {
            return Err(MockError::Usage(format!(
                "{}: matcher {} matches the values at positions {first} and {second}; record more rounds",
                label(),
                template.matchers[slot]
            )));
        }
    }

    let mut args: Vec<Matcher<Value>> = Vec::with_capacity(arg_count);
    for (position, values) in observed.iter().enumerate() {
        let Some(values) = values else {
            args.push(Matcher::Wildcard);
            continue;
        };
        match by_signature.remove(values) {
            Some(slot) => args.push(template.matchers[slot].clone()),
            None => args.push(Matcher::Equality(
                template.invocation.args[position].clone(),
            )),
        }
    }

    if let Some(slot) = by_signature.into_values().min() {
        return Err(MockError::Usage(format!(
            "{}: matcher {} was declared but not bound to any argument",
            label(),
            template.matchers[slot]
        )));
    }

    Ok(CompiledCall {
        double: template.double.clone(),
        matcher: InvocationMatcher {
            receiver: Matcher::Equality(template.invocation.receiver),
            method: Matcher::Equality(template.invocation.method.as_ref().clone()),
            args,
        },
        returned: template.returned.clone(),
    })
}
