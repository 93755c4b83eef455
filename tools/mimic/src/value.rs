//! Dynamic argument and return values flowing through intercepted calls.
//!
//! Primitive, string and unit values compare by value. Objects compare
//! structurally for equality matchers, while [`Identity`] compares them by
//! reference; doubles always compare by reference.

use crate::double::Double;
use crate::errors::MockError;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Unit,
    Bool,
    Int,
    UInt,
    Float,
    Char,
    Str,
    Object(String),
    Double(String),
}

impl ValueClass {
    pub fn object(type_name: impl Into<String>) -> Self {
        Self::Object(type_name.into())
    }

    pub fn double(type_name: impl Into<String>) -> Self {
        Self::Double(type_name.into())
    }

    /// Classes whose signatures are told apart by value rather than identity.
    pub fn is_value_compared(&self) -> bool {
        !matches!(self, Self::Object(_) | Self::Double(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Char => "char",
            Self::Str => "str",
            Self::Object(name) | Self::Double(name) => name.as_str(),
        }
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait DynObject: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynObject) -> bool;
}

impl<T> DynObject for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

#[derive(Debug, PartialEq)]
struct Placeholder {
    class: String,
}

/// Object classes are bare type names: no module path, no generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// Shared handle to an arbitrary object argument.
#[derive(Clone)]
pub struct ObjectRef {
    class: Arc<str>,
    inner: Arc<dyn DynObject>,
}

impl ObjectRef {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + fmt::Debug + PartialEq + Send + Sync,
    {
        Self {
            class: Arc::from(short_type_name::<T>()),
            inner: Arc::new(value),
        }
    }

    /// A fresh object that only stands in for an instance of `class`.
    pub fn placeholder(class: &str) -> Self {
        Self {
            class: Arc::from(class),
            inner: Arc::new(Placeholder {
                class: class.to_string(),
            }),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub fn same_instance(&self, other: &ObjectRef) -> bool {
        self.address() == other.address()
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other) || self.inner.dyn_eq(other.inner.as_ref())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.inner)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Object(ObjectRef),
    Double(Double),
}

impl Value {
    pub fn class(&self) -> ValueClass {
        match self {
            Self::Unit => ValueClass::Unit,
            Self::Bool(_) => ValueClass::Bool,
            Self::Int(_) => ValueClass::Int,
            Self::UInt(_) => ValueClass::UInt,
            Self::Float(_) => ValueClass::Float,
            Self::Char(_) => ValueClass::Char,
            Self::Str(_) => ValueClass::Str,
            Self::Object(object) => ValueClass::Object(object.class().to_string()),
            Self::Double(double) => ValueClass::Double(double.name().to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}u"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::Char(value) => write!(f, "{value:?}"),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::Object(object) => write!(f, "{object:?}"),
            Self::Double(double) => write!(f, "{double}"),
        }
    }
}

/// Compares by value for primitive classes and by reference otherwise.
#[derive(Debug, Clone)]
pub struct Identity(pub Value);

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Object(a), Value::Object(b)) => a.same_instance(b),
            (a, b) => a == b,
        }
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(&self.0).hash(state);
        match &self.0 {
            Value::Unit => {}
            Value::Bool(value) => value.hash(state),
            Value::Int(value) => value.hash(state),
            Value::UInt(value) => value.hash(state),
            Value::Float(value) => value.to_bits().hash(state),
            Value::Char(value) => value.hash(state),
            Value::Str(value) => value.hash(state),
            Value::Object(object) => object.address().hash(state),
            Value::Double(double) => double.id().hash(state),
        }
    }
}

/// Native Rust types that can cross the double boundary.
pub trait MockValue: Sized {
    fn value_class() -> ValueClass;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self, MockError>;
}

fn mismatch(expected: ValueClass, actual: &Value) -> MockError {
    MockError::Usage(format!(
        "expected a value of class {expected} but got {actual} ({})",
        actual.class()
    ))
}

macro_rules! primitive_mock_value {
    ($ty:ty, $class:ident) => {
        impl MockValue for $ty {
            fn value_class() -> ValueClass {
                ValueClass::$class
            }

            fn into_value(self) -> Value {
                Value::$class(self)
            }

            fn from_value(value: Value) -> Result<Self, MockError> {
                match value {
                    Value::$class(inner) => Ok(inner),
                    other => Err(mismatch(ValueClass::$class, &other)),
                }
            }
        }
    };
}

primitive_mock_value!(bool, Bool);
primitive_mock_value!(i64, Int);
primitive_mock_value!(u64, UInt);
primitive_mock_value!(f64, Float);
primitive_mock_value!(char, Char);
primitive_mock_value!(String, Str);

impl MockValue for () {
    fn value_class() -> ValueClass {
        ValueClass::Unit
    }

    fn into_value(self) -> Value {
        Value::Unit
    }

    fn from_value(value: Value) -> Result<Self, MockError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(mismatch(ValueClass::Unit, &other)),
        }
    }
}

impl MockValue for Double {
    fn value_class() -> ValueClass {
        ValueClass::double("double")
    }

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Result<Self, MockError> {
        match value {
            Value::Double(double) => Ok(double),
            other => Err(mismatch(Self::value_class(), &other)),
        }
    }
}

impl MockValue for ObjectRef {
    fn value_class() -> ValueClass {
        ValueClass::object(short_type_name::<Self>())
    }

    fn into_value(self) -> Value {
        Value::Object(self)
    }

    fn from_value(value: Value) -> Result<Self, MockError> {
        match value {
            Value::Object(object) => Ok(object),
            other => Err(mismatch(Self::value_class(), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn objects_are_structurally_equal_but_identity_distinct() {
        let a = ObjectRef::new(Point { x: 1, y: 2 });
        let b = ObjectRef::new(Point { x: 1, y: 2 });
        assert_eq!(Value::Object(a.clone()), Value::Object(b.clone()));
        assert_ne!(Identity(Value::Object(a.clone())), Identity(Value::Object(b)));
        assert_eq!(Identity(Value::Object(a.clone())), Identity(Value::Object(a)));
    }

    #[test]
    fn primitives_compare_by_value_under_identity() {
        assert_eq!(Identity(Value::Int(7)), Identity(Value::Int(7)));
        assert_eq!(
            Identity(Value::Str("abc".to_string())),
            Identity(Value::Str("abc".to_string()))
        );
        assert_ne!(Identity(Value::Int(7)), Identity(Value::UInt(7)));
    }

    #[test]
    fn from_value_reports_class_mismatch() {
        let err = i64::from_value(Value::Bool(true)).expect_err("must reject");
        assert!(matches!(err, MockError::Usage(message) if message.contains("class int")));
    }

    #[test]
    fn placeholder_carries_requested_class() {
        let object = ObjectRef::placeholder("Session");
        assert_eq!(Value::Object(object).class(), ValueClass::object("Session"));
    }

    #[test]
    fn object_class_is_the_bare_type_name() {
        let object = ObjectRef::new(Point { x: 0, y: 0 });
        assert_eq!(object.class(), "Point");
        assert_eq!(Value::Object(object).class(), ValueClass::object("Point"));

        let boxed = ObjectRef::new(vec![Point { x: 1, y: 1 }]);
        assert_eq!(boxed.class(), "Vec");
    }

    #[test]
    fn untyped_object_slot_reports_the_class_its_values_carry() {
        use crate::instantiate::{DefaultInstantiator, Instantiator};

        let drawn = DefaultInstantiator
            .instantiate(&ObjectRef::value_class())
            .expect("instantiate");
        assert_eq!(drawn.class(), ObjectRef::value_class());
        assert_eq!(ObjectRef::value_class(), ValueClass::object("ObjectRef"));
    }
}
