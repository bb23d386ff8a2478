//! Named function registry for call dispatch.
//!
//! Handlers are type-erased: they take a slice of opaque [`Value`] arguments
//! and return opaque outputs. Registration happens once at startup; lookups
//! run concurrently from every server connection, hence the `RwLock` over
//! `Arc`'d handlers (the lock is released before the handler runs).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::envelope::ReplyError;

/// Failure reported by a handler body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable failure description, forwarded to the caller.
    pub message: String,
}

impl HandlerError {
    /// Create a new handler error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from registry mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A handler is already registered under this name.
    #[error("function already registered: {name}")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },
}

type Handler = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, HandlerError> + Send + Sync>;

/// Process-level table of named, type-erased call handlers.
///
/// Shared between the serving side (remote dispatch) and the group (local
/// call shortcut) as an `Arc<Registry>`.
///
/// # Example
///
/// ```
/// use muster::{Registry, arg};
/// use serde_json::json;
///
/// let registry = Registry::new();
/// registry
///     .register("Add", |args| {
///         let a: i64 = arg(args, 0)?;
///         let b: i64 = arg(args, 1)?;
///         Ok(vec![json!(a + b)])
///     })
///     .expect("register");
///
/// let outputs = registry.call("Add", &[json!(10), json!(21)]).expect("call");
/// assert_eq!(outputs, vec![json!(31)]);
/// ```
#[derive(Default)]
pub struct Registry {
    funcs: RwLock<HashMap<String, Handler>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if the name is already taken.
    pub fn register<F>(&self, name: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, HandlerError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut funcs = self.funcs.write().unwrap_or_else(|p| p.into_inner());
        if funcs.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        debug!(name = %name, "registering function");
        funcs.insert(name, Arc::new(f));
        Ok(())
    }

    /// Dispatch a call to the handler registered under `name`.
    ///
    /// The registry lock is held only for the lookup; the handler itself
    /// runs unlocked, so slow handlers never block registration or other
    /// lookups.
    ///
    /// # Errors
    ///
    /// - `ReplyError::UnknownFunction` if no handler has that name
    /// - `ReplyError::Handler` if the handler reports a failure
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, ReplyError> {
        let handler = {
            let funcs = self.funcs.read().unwrap_or_else(|p| p.into_inner());
            funcs.get(name).cloned()
        };

        let handler = handler.ok_or_else(|| ReplyError::UnknownFunction {
            name: name.to_string(),
        })?;

        handler(args).map_err(|e| ReplyError::Handler { message: e.message })
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        let funcs = self.funcs.read().unwrap_or_else(|p| p.into_inner());
        funcs.contains_key(name)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        let funcs = self.funcs.read().unwrap_or_else(|p| p.into_inner());
        funcs.len()
    }

    /// Whether the registry has no handlers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let funcs = self.funcs.read().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("Registry")
            .field("functions", &funcs.len())
            .finish()
    }
}

/// Extract and deserialize the argument at `index`.
///
/// Convenience for handler bodies: converts both missing and mistyped
/// arguments into a [`HandlerError`] the caller can read.
///
/// # Errors
///
/// Returns a `HandlerError` if the argument is missing or does not
/// deserialize to `T`.
pub fn arg<T: serde::de::DeserializeOwned>(args: &[Value], index: usize) -> Result<T, HandlerError> {
    let value = args
        .get(index)
        .ok_or_else(|| HandlerError::new(format!("missing argument {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| HandlerError::new(format!("argument {index}: {e}")))
}
