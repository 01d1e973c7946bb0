//! Function descriptors: the abstraction over callable capabilities.
//!
//! A function is anything the model may ask the engine to run: a local
//! closure, a remote API operation, a plugin method. The engine only knows
//! its [`FunctionDescriptor`]: where it lives (namespace + name), how to
//! describe it to the model, the JSON Schema of its parameters, and the
//! [`Function`] capability that performs the call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Separator between namespace and name in model-facing function names.
pub const NAME_SEPARATOR: char = '-';

/// Parsed arguments of a call, keyed by parameter name.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Build the model-facing name `namespace-name`.
pub fn qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}{NAME_SEPARATOR}{name}")
    }
}

/// Split a model-facing name at the first separator.
///
/// A name without separator belongs to the empty namespace.
pub fn split_qualified_name(qualified: &str) -> (&str, &str) {
    match qualified.split_once(NAME_SEPARATOR) {
        Some((namespace, name)) => (namespace, name),
        None => ("", qualified),
    }
}

/// Parameter schema of a function that takes no arguments.
pub fn empty_parameters() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

/// The capability that actually performs a call.
///
/// Failures are plain `anyhow` errors: the engine never inspects them, it
/// only relays their message back to the model.
#[async_trait]
pub trait Function: Send + Sync {
    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<serde_json::Value>;
}

/// A registrable function: identity, model-facing description and invoker.
#[derive(Clone)]
pub struct FunctionDescriptor {
    /// Grouping prefix (e.g. the plugin the function belongs to)
    pub namespace: String,

    /// Name, unique within the namespace
    pub name: String,

    /// What the function does (sent to the model)
    pub description: String,

    /// JSON Schema describing the parameters object
    pub parameters: serde_json::Value,

    invoker: Arc<dyn Function>,
}

impl FunctionDescriptor {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        invoker: Arc<dyn Function>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            description: description.into(),
            parameters,
            invoker,
        }
    }

    /// The `namespace-name` form used on the wire.
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.namespace, &self.name)
    }

    /// Convert into the definition sent to the model.
    pub fn to_definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.qualified_name(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Shared handle to the invoker, for running the call off this borrow.
    pub fn invoker(&self) -> Arc<dyn Function> {
        Arc::clone(&self.invoker)
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A function definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Qualified `namespace-name`
    pub name: String,

    /// Description of what the function does
    pub description: String,

    /// JSON Schema describing the function's parameters
    pub parameters: serde_json::Value,
}

/// Anything that can enumerate functions for registration.
///
/// Discovery (attribute scanning, OpenAPI documents, ...) lives behind this
/// trait, outside the engine.
pub trait FunctionProvider: Send + Sync {
    /// Namespace every yielded descriptor belongs to.
    fn namespace(&self) -> &str;

    /// The descriptors to register. Must be finite.
    fn functions(&self) -> Vec<FunctionDescriptor>;
}
