#![allow(dead_code)]
//! Hand-written proxies shared by the integration tests.
//!
//! Each proxy owns a [`Double`] and one descriptor per method, and forwards
//! every call through `Double::invoke`.

use mimic::{Double, MethodDescriptor, MockConfig, MockError, MockValue, ValueClass};
use std::sync::Arc;

pub fn init_rounds(rounds: usize) {
    let mut config = MockConfig::default();
    config.recording.rounds = rounds;
    mimic::init_thread_recorder(config);
}

pub struct Calculator {
    pub double: Double,
    add: Arc<MethodDescriptor>,
    square: Arc<MethodDescriptor>,
    label: Arc<MethodDescriptor>,
}

impl Calculator {
    pub fn new(name: &str) -> Self {
        Self {
            double: Double::new(name),
            add: MethodDescriptor::new(
                "add",
                vec![ValueClass::Int, ValueClass::Int],
                ValueClass::Int,
            )
            .shared(),
            square: MethodDescriptor::new("square", vec![ValueClass::Int], ValueClass::Int)
                .shared(),
            label: MethodDescriptor::new("label", vec![ValueClass::Str], ValueClass::Str)
                .shared(),
        }
    }

    pub fn add(&self, a: i64, b: i64) -> Result<i64, MockError> {
        self.double
            .invoke_as(&self.add, vec![a.into_value(), b.into_value()])
    }

    pub fn square(&self, n: i64) -> Result<i64, MockError> {
        self.double.invoke_as(&self.square, vec![n.into_value()])
    }

    pub fn label(&self, text: String) -> Result<String, MockError> {
        self.double.invoke_as(&self.label, vec![text.into_value()])
    }
}

pub struct Factory {
    pub double: Double,
    open: Arc<MethodDescriptor>,
}

impl Factory {
    pub fn new(name: &str) -> Self {
        Self {
            double: Double::new(name),
            open: MethodDescriptor::new(
                "open",
                vec![ValueClass::Str],
                ValueClass::double("Session"),
            )
            .shared(),
        }
    }

    pub fn open(&self, target: String) -> Result<Session, MockError> {
        let double: Double = self.double.invoke_as(&self.open, vec![target.into_value()])?;
        Ok(Session::wrap(double))
    }
}

pub struct Session {
    pub double: Double,
    id: Arc<MethodDescriptor>,
    name: Arc<MethodDescriptor>,
}

impl Session {
    pub fn wrap(double: Double) -> Self {
        Self {
            double,
            id: MethodDescriptor::new("id", Vec::new(), ValueClass::Int).shared(),
            name: MethodDescriptor::new("name", Vec::new(), ValueClass::Str).shared(),
        }
    }

    pub fn id(&self) -> Result<i64, MockError> {
        self.double.invoke_as(&self.id, Vec::new())
    }

    pub fn name(&self) -> Result<String, MockError> {
        self.double.invoke_as(&self.name, Vec::new())
    }
}

/// Proxy with an asynchronous call shape.
pub struct Fetcher {
    pub double: Double,
    fetch: Arc<MethodDescriptor>,
}

impl Fetcher {
    pub fn new(name: &str) -> Self {
        Self {
            double: Double::new(name),
            fetch: MethodDescriptor::deferred("fetch", vec![ValueClass::Str], ValueClass::Int)
                .shared(),
        }
    }

    pub async fn fetch(&self, key: String) -> Result<i64, MockError> {
        self.double
            .invoke_deferred_as(&self.fetch, vec![key.into_value()])
            .await
    }
}
