//! `MockCallback` — a test double for `Callback`.
//!
//! Useful in unit and integration tests where a real callback is either
//! unavailable or irrelevant.

use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::{Callback, CallbackOutcome, TaskContext};

/// Behaviour injected into `MockCallback` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Always report done.
    Done,
    /// Always ask to be retried.
    Retry,
    /// Report done once the callback has been invoked this many times.
    DoneAfter(usize),
    /// Always fail with the given message.
    Fail(String),
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub args: Vec<Value>,
    pub task_name: String,
    pub triggered: bool,
}

/// A mock callback that records every call it receives and returns a
/// programmer-specified outcome.
#[derive(Debug)]
pub struct MockCallback {
    /// Label used in test assertions.
    pub name: String,
    /// What the callback will do when invoked.
    pub behaviour: MockBehaviour,
    /// Every invocation, in call order.
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockCallback {
    pub fn new(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always completes.
    pub fn done(name: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Done)
    }

    /// Create a mock that never completes.
    pub fn retrying(name: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Retry)
    }

    /// Create a mock that always fails.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Fail(msg.into()))
    }

    /// Number of times this callback has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Callback for MockCallback {
    fn call(&self, args: &[Value], task: &mut TaskContext<'_>) -> CallbackOutcome {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(MockCall {
                args: args.to_vec(),
                task_name: task.task_name.to_owned(),
                triggered: task.triggered,
            });
            calls.len()
        };

        match &self.behaviour {
            MockBehaviour::Done => CallbackOutcome::Done,
            MockBehaviour::Retry => CallbackOutcome::Retry,
            MockBehaviour::DoneAfter(n) => (count >= *n).into(),
            MockBehaviour::Fail(msg) => CallbackOutcome::failed(format!("{}: {msg}", self.name)),
        }
    }
}
