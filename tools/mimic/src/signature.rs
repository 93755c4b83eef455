use crate::double::Double;
use crate::errors::MockError;
use crate::instantiate::Instantiator;
use crate::invocation::Invocation;
use crate::matcher::Matcher;
use crate::value::{Value, ValueClass};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STR_SIGNATURE_LEN: usize = 24;

/// Mints the per-round sentinel values substituted for matcher arguments.
pub struct SignatureGenerator {
    rng: StdRng,
}

impl SignatureGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn draw(
        &mut self,
        class: &ValueClass,
        instantiator: &dyn Instantiator,
    ) -> Result<Value, MockError> {
        let rng = &mut self.rng;
        Ok(match class {
            ValueClass::Unit => {
                return Err(MockError::Usage(
                    "matchers cannot be declared for unit arguments".to_string(),
                ))
            }
            ValueClass::Bool => Value::Bool(rng.gen()),
            ValueClass::Int => Value::Int(rng.gen()),
            ValueClass::UInt => Value::UInt(rng.gen()),
            ValueClass::Float => Value::Float(rng.gen()),
            ValueClass::Char => Value::Char(rng.gen()),
            ValueClass::Str => Value::Str(
                rng.sample_iter(&Alphanumeric)
                    .take(STR_SIGNATURE_LEN)
                    .map(char::from)
                    .collect(),
            ),
            ValueClass::Object(_) | ValueClass::Double(_) => instantiator.instantiate(class)?,
        })
    }
}

/// One intercepted call of one round, with the matchers declared for it.
#[derive(Debug, Clone)]
pub struct SignedCall {
    pub double: Double,
    pub invocation: Invocation,
    pub matchers: Vec<Matcher<Value>>,
    pub signatures: Vec<Value>,
    /// What the call handed back to the block during recording.
    pub returned: Value,
}

#[derive(Debug, Clone, Default)]
pub struct CallRound {
    pub calls: Vec<SignedCall>,
}
