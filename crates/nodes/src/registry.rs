//! Name-keyed callback registry.
//!
//! Serialized workflow definitions refer to callbacks by identifier; the
//! registry turns those identifiers back into live callbacks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{Callback, CallbackOutcome, NodeError, TaskContext};

/// Maps callback identifiers to shared [`Callback`] implementations.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Arc<dyn Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback under `name`.
    ///
    /// # Errors
    /// [`NodeError::DuplicateCallback`] if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        callback: Arc<dyn Callback>,
    ) -> Result<(), NodeError> {
        let name = name.into();
        if self.callbacks.contains_key(&name) {
            return Err(NodeError::DuplicateCallback(name));
        }
        debug!(callback = %name, "registered callback");
        self.callbacks.insert(name, callback);
        Ok(())
    }

    /// Register a plain function or closure.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<(), NodeError>
    where
        F: Fn(&[Value], &mut TaskContext<'_>) -> CallbackOutcome + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f))
    }

    /// Look up a callback by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Callback>, NodeError> {
        self.callbacks
            .get(name)
            .cloned()
            .ok_or_else(|| NodeError::UnknownCallback(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_callback_resolves_by_name() {
        let mut registry = CallbackRegistry::new();
        registry
            .register_fn("always", |_: &[Value], _: &mut TaskContext<'_>| CallbackOutcome::Done)
            .unwrap();

        assert!(registry.contains("always"));
        assert!(registry.get("always").is_ok());
        assert_eq!(registry.names(), vec!["always"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = CallbackRegistry::new();
        registry
            .register_fn("twice", |_: &[Value], _: &mut TaskContext<'_>| CallbackOutcome::Done)
            .unwrap();
        let err = registry
            .register_fn("twice", |_: &[Value], _: &mut TaskContext<'_>| CallbackOutcome::Retry)
            .unwrap_err();
        assert_eq!(err, NodeError::DuplicateCallback("twice".into()));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = CallbackRegistry::new();
        assert!(matches!(
            registry.get("ghost"),
            Err(NodeError::UnknownCallback(name)) if name == "ghost"
        ));
    }
}
