//! Function sets: a namespace of closure-backed functions.
//!
//! A [`FunctionSet`] is the simplest [`FunctionProvider`]: build it from
//! closures, then hand it to `FunctionCatalog::register_provider`.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use toolloop_core::function::{Arguments, Function, FunctionDescriptor, FunctionProvider};

/// Adapts an async closure to the [`Function`] capability.
pub struct FnFunction<F> {
    f: F,
}

impl<F> FnFunction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Function for FnFunction<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
{
    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<serde_json::Value> {
        (self.f)(arguments).await
    }
}

/// Adapts a synchronous closure to the [`Function`] capability.
pub struct SyncFnFunction<F> {
    f: F,
}

#[async_trait]
impl<F> Function for SyncFnFunction<F>
where
    F: Fn(Arguments) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
{
    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<serde_json::Value> {
        (self.f)(arguments)
    }
}

/// A named group of functions registered together.
#[derive(Debug, Clone)]
pub struct FunctionSet {
    namespace: String,
    description: Option<String>,
    functions: Vec<FunctionDescriptor>,
}

impl FunctionSet {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            description: None,
            functions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a function backed by an async closure.
    pub fn with_function<F, Fut>(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        f: F,
    ) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        self.with_invoker(name, description, parameters, Arc::new(FnFunction::new(f)))
    }

    /// Add a function backed by a synchronous closure.
    pub fn with_sync_function<F>(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        f: F,
    ) -> Self
    where
        F: Fn(Arguments) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.with_invoker(name, description, parameters, Arc::new(SyncFnFunction { f }))
    }

    /// Add a function with an existing invoker.
    pub fn with_invoker(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        invoker: Arc<dyn Function>,
    ) -> Self {
        self.functions.push(FunctionDescriptor::new(
            self.namespace.clone(),
            name,
            description,
            parameters,
            invoker,
        ));
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionProvider for FunctionSet {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn functions(&self) -> Vec<FunctionDescriptor> {
        self.functions.clone()
    }
}

/// Fetch a required string argument.
pub fn string_arg<'a>(arguments: &'a Arguments, key: &str) -> anyhow::Result<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing string argument '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolloop_core::function::empty_parameters;
    use toolloop_core::{CatalogError, FunctionCatalog};

    fn math() -> FunctionSet {
        FunctionSet::new("math")
            .with_description("Arithmetic helpers")
            .with_sync_function("answer", "The answer", empty_parameters(), |_| {
                Ok(serde_json::json!(42))
            })
            .with_function(
                "double",
                "Doubles n",
                serde_json::json!({
                    "type": "object",
                    "properties": { "n": { "type": "integer" } },
                    "required": ["n"]
                }),
                |args| async move {
                    let n = args
                        .get("n")
                        .and_then(|v| v.as_i64())
                        .ok_or_else(|| anyhow::anyhow!("n must be an integer"))?;
                    Ok(serde_json::json!(n * 2))
                },
            )
    }

    #[test]
    fn set_yields_namespaced_descriptors() {
        let set = math();
        assert_eq!(set.len(), 2);
        assert_eq!(set.description(), Some("Arithmetic helpers"));
        let names: Vec<String> = set.functions().iter().map(|d| d.qualified_name()).collect();
        assert_eq!(names, vec!["math-answer", "math-double"]);
    }

    #[tokio::test]
    async fn registered_closures_are_invocable() {
        let catalog = FunctionCatalog::new();
        catalog.register_provider(&math()).unwrap();

        let double = catalog.lookup("math", "double").unwrap();
        let mut args = Arguments::new();
        args.insert("n".into(), serde_json::json!(21));
        assert_eq!(double.invoker().invoke(args).await.unwrap(), 42);

        let err = double.invoker().invoke(Arguments::new()).await.unwrap_err();
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn duplicate_names_within_a_set_are_rejected() {
        let set = math().with_sync_function("answer", "Again", empty_parameters(), |_| {
            Ok(serde_json::Value::Null)
        });
        let catalog = FunctionCatalog::new();
        assert!(matches!(
            catalog.register_provider(&set),
            Err(CatalogError::DuplicateFunction { .. })
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn string_arg_reports_missing_key() {
        let mut args = Arguments::new();
        args.insert("city".into(), serde_json::json!("Paris"));
        assert_eq!(string_arg(&args, "city").unwrap(), "Paris");
        assert!(string_arg(&args, "country").is_err());
    }
}
