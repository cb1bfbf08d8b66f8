//! Function registry: task-kind name -> capability.
//!
//! Populated by collaborators before tasks referencing a name are enqueued.
//! Re-registering a name replaces the previous binding.

mod capability;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::domain::TaskArgs;
use crate::error::{Result, SchedulerError};

pub use capability::{CancelHandle, CancelSignal, Capability, FnCapability, cancel_pair};

/// Read-mostly map of registered capabilities
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<dyn Capability>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a capability (last writer wins)
    pub fn register(&self, name: impl Into<String>, capability: Arc<dyn Capability>) {
        let name = name.into();
        let replaced = self
            .functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), capability)
            .is_some();

        if replaced {
            tracing::warn!(function = %name, "Replaced registered function");
        } else {
            tracing::info!(function = %name, "Registered function");
        }
    }

    /// Bind `name` to an async closure
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(TaskArgs, CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Value>> + Send + 'static,
    {
        self.register(name, Arc::new(FnCapability::new(f)));
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Capability>> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = FunctionRegistry::new();
        registry.register_fn("echo", |_args, _cancel| async { Ok(json!("hi")) });

        assert!(registry.contains("echo"));
        let cap = registry.lookup("echo").unwrap();
        let out = cap.call(TaskArgs::new(), CancelSignal::never()).await.unwrap();
        assert_eq!(out, json!("hi"));
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = FunctionRegistry::new();
        let err = registry.lookup("missing").err().unwrap();
        assert!(matches!(err, SchedulerError::UnknownFunction(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let registry = FunctionRegistry::new();
        registry.register_fn("f", |_args, _cancel| async { Ok(json!(1)) });
        registry.register_fn("f", |_args, _cancel| async { Ok(json!(2)) });

        let out = registry.lookup("f").unwrap().call(TaskArgs::new(), CancelSignal::never()).await.unwrap();
        assert_eq!(out, json!(2));
        assert_eq!(registry.names(), vec!["f".to_string()]);
    }

    #[test]
    fn test_names_sorted() {
        let registry = FunctionRegistry::new();
        registry.register_fn("zeta", |_args, _cancel| async { Ok(Value::Null) });
        registry.register_fn("alpha", |_args, _cancel| async { Ok(Value::Null) });
        assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
