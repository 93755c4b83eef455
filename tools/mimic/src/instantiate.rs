use crate::double::Double;
use crate::errors::MockError;
use crate::value::{ObjectRef, Value, ValueClass};

/// Best-effort default or child value for an arbitrary class.
pub trait Instantiator: Send + Sync {
    fn instantiate(&self, class: &ValueClass) -> Result<Value, MockError>;
}

/// Zero values for primitives, placeholders for objects, fresh child doubles
/// for double classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInstantiator;

impl Instantiator for DefaultInstantiator {
    fn instantiate(&self, class: &ValueClass) -> Result<Value, MockError> {
        Ok(match class {
            ValueClass::Unit => Value::Unit,
            ValueClass::Bool => Value::Bool(false),
            ValueClass::Int => Value::Int(0),
            ValueClass::UInt => Value::UInt(0),
            ValueClass::Float => Value::Float(0.0),
            ValueClass::Char => Value::Char('\0'),
            ValueClass::Str => Value::Str(String::new()),
            ValueClass::Object(name) => Value::Object(ObjectRef::placeholder(name)),
            ValueClass::Double(name) => Value::Double(Double::new(name.as_str())),
        })
    }
}
