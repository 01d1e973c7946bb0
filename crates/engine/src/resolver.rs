//! Binding of tool-call requests to registered functions.
//!
//! Resolution is a pure step: it looks the function up and validates the
//! argument payload against the function's JSON Schema, but never runs
//! anything. A request that fails here is reported back to the model with
//! no partial execution.

use std::sync::Arc;

use jsonschema::JSONSchema;
use toolloop_core::catalog::FunctionCatalog;
use toolloop_core::error::InvocationError;
use toolloop_core::function::{Arguments, FunctionDescriptor};
use toolloop_core::message::ToolCallRequest;

/// A request matched to its function, with validated arguments.
#[derive(Debug, Clone)]
pub struct BoundInvocation {
    /// Id of the originating request
    pub call_id: String,

    pub descriptor: Arc<FunctionDescriptor>,

    pub arguments: Arguments,
}

impl BoundInvocation {
    pub fn function_name(&self) -> String {
        self.descriptor.qualified_name()
    }
}

/// Resolves requests against a shared catalog.
#[derive(Clone)]
pub struct FunctionResolver {
    catalog: Arc<FunctionCatalog>,
}

impl FunctionResolver {
    pub fn new(catalog: Arc<FunctionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<FunctionCatalog> {
        &self.catalog
    }

    pub fn resolve(&self, request: &ToolCallRequest) -> Result<BoundInvocation, InvocationError> {
        let descriptor = self.catalog.lookup(&request.namespace, &request.name)?;
        let arguments = parse_arguments(&descriptor, &request.arguments)?;
        Ok(BoundInvocation {
            call_id: request.id.clone(),
            descriptor,
            arguments,
        })
    }
}

/// Parse a payload and check it against the descriptor's schema.
///
/// An empty payload or JSON `null` means "no arguments".
fn parse_arguments(descriptor: &FunctionDescriptor, payload: &str) -> Result<Arguments, InvocationError> {
    let malformed = |reason: String| InvocationError::MalformedArguments {
        function: descriptor.qualified_name(),
        reason,
    };

    let value = if payload.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(payload).map_err(|e| malformed(format!("unparseable payload: {e}")))?
    };
    let value = match value {
        serde_json::Value::Null => serde_json::Value::Object(Arguments::new()),
        serde_json::Value::Object(_) => value,
        other => {
            return Err(malformed(format!(
                "payload must be a JSON object, got {}",
                json_type(&other)
            )));
        }
    };

    let schema = JSONSchema::compile(&descriptor.parameters)
        .map_err(|e| malformed(format!("invalid parameter schema: {e}")))?;
    if let Err(errors) = schema.validate(&value) {
        let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(malformed(reasons.join("; ")));
    }

    match value {
        serde_json::Value::Object(arguments) => Ok(arguments),
        other => Err(malformed(format!(
            "payload must be a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
