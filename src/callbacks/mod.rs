//! Host callbacks invoked by the engine.
//!
//! The host registers a callback under an implementation id; declared
//! functions and AST validators call it through the bridge with JSON
//! arguments. Calls are synchronous from the engine's point of view. Hosts
//! whose callbacks live on an async executor use [`channel`] to hand each
//! call to a task and block the evaluating thread until it replies.

pub mod channel;

use std::fmt;
use std::sync::Arc;

use celrt_core::evaluator::EvalError;
use celrt_core::values::{FunctionImpl, Value};
use celrt_core::Type;
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::Value as Json;
use thiserror::Error;

use crate::values::{from_json, to_json};

/// A host function: JSON arguments in, JSON result or error message out.
pub type Callback = Arc<dyn Fn(&[Json]) -> Result<Json, String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("no callback registered for '{0}'")]
    NotRegistered(String),

    #[error("callback '{impl_id}' failed: {message}")]
    Failed { impl_id: String, message: String },
}

/// Registry of host callbacks by implementation id.
#[derive(Default)]
pub struct CallbackBridge {
    callbacks: Mutex<HashMap<String, Callback>>,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the callback for `impl_id`.
    pub fn register(&self, impl_id: impl Into<String>, callback: Callback) {
        let impl_id = impl_id.into();
        tracing::debug!(impl_id = %impl_id, "registering callback");
        self.callbacks.lock().insert(impl_id, callback);
    }

    /// Register a plain closure.
    pub fn register_fn<F>(&self, impl_id: impl Into<String>, f: F)
    where
        F: Fn(&[Json]) -> Result<Json, String> + Send + Sync + 'static,
    {
        self.register(impl_id, Arc::new(f));
    }

    /// Remove a callback; returns whether one was registered.
    pub fn unregister(&self, impl_id: &str) -> bool {
        let removed = self.callbacks.lock().remove(impl_id).is_some();
        if removed {
            tracing::debug!(impl_id, "unregistered callback");
        }
        removed
    }

    pub fn is_registered(&self, impl_id: &str) -> bool {
        self.callbacks.lock().contains_key(impl_id)
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }

    /// Invoke a callback. The registry lock is released before the callback
    /// runs, so callbacks may re-enter the runtime.
    pub fn call(&self, impl_id: &str, args: &[Json]) -> Result<Json, CallbackError> {
        let callback = self
            .callbacks
            .lock()
            .get(impl_id)
            .cloned()
            .ok_or_else(|| CallbackError::NotRegistered(impl_id.to_string()))?;
        tracing::trace!(impl_id, args = args.len(), "invoking callback");
        callback(args).map_err(|message| CallbackError::Failed {
            impl_id: impl_id.to_string(),
            message,
        })
    }
}

impl fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callbacks = self.callbacks.lock();
        let mut ids: Vec<_> = callbacks.keys().collect();
        ids.sort();
        f.debug_struct("CallbackBridge").field("callbacks", &ids).finish()
    }
}

/// Engine function implementation that forwards to a host callback.
///
/// Arguments go out through the value bridge; the result comes back guided
/// by the declared return type.
pub(crate) fn forwarding_impl(
    bridge: Arc<CallbackBridge>,
    impl_id: String,
    result_type: Type,
) -> FunctionImpl {
    FunctionImpl::new(move |args: &[Value]| {
        let args: Vec<Json> = args.iter().map(to_json).collect();
        let result = bridge.call(&impl_id, &args).map_err(|e| match e {
            CallbackError::Failed { message, .. } => EvalError::FunctionCall(message),
            other => EvalError::FunctionCall(other.to_string()),
        })?;
        from_json(&result, Some(&result_type)).map_err(|e| EvalError::FunctionCall(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_bridge() -> Arc<CallbackBridge> {
        let bridge = Arc::new(CallbackBridge::new());
        bridge.register_fn("add", |args| {
            let sum: i64 = args.iter().filter_map(Json::as_i64).sum();
            Ok(json!(sum))
        });
        bridge
    }

    #[test]
    fn test_call_registered() {
        let bridge = add_bridge();
        assert_eq!(bridge.call("add", &[json!(1), json!(2)]), Ok(json!(3)));
        assert!(bridge.is_registered("add"));
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_distinguishable() {
        let bridge = CallbackBridge::new();
        assert_eq!(
            bridge.call("missing", &[]),
            Err(CallbackError::NotRegistered("missing".to_string()))
        );
    }

    #[test]
    fn test_unregister() {
        let bridge = add_bridge();
        assert!(bridge.unregister("add"));
        assert!(!bridge.unregister("add"));
        assert!(bridge.is_empty());
    }

    #[test]
    fn test_callback_may_reenter_bridge() {
        let bridge = Arc::new(CallbackBridge::new());
        let inner = Arc::clone(&bridge);
        bridge.register_fn("outer", move |args| {
            inner.call("inner", args).map_err(|e| e.to_string())
        });
        bridge.register_fn("inner", |_| Ok(json!("ok")));
        assert_eq!(bridge.call("outer", &[]), Ok(json!("ok")));
    }

    #[test]
    fn test_forwarding_impl() {
        let bridge = add_bridge();
        bridge.register_fn("fail", |_| Err("boom".to_string()));

        let add = forwarding_impl(Arc::clone(&bridge), "add".into(), Type::Int);
        assert!(matches!(
            add.call(&[Value::Int(2), Value::Int(5)]),
            Ok(Value::Int(7))
        ));

        let fail = forwarding_impl(Arc::clone(&bridge), "fail".into(), Type::Int);
        assert_eq!(
            fail.call(&[]).map_err(|e| e.to_string()).err(),
            Some("function call error: boom".to_string())
        );

        let missing = forwarding_impl(bridge, "gone".into(), Type::Int);
        assert_eq!(
            missing.call(&[]).err(),
            Some(EvalError::FunctionCall("no callback registered for 'gone'".to_string()))
        );
    }
}
