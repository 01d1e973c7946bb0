//! The function catalog: registered functions keyed by (namespace, name).
//!
//! The catalog is read-mostly: conversations look functions up on every
//! tool call, registrations are rare. Each namespace sits behind its own
//! `RwLock`, so lookups never wait on other lookups and a registration only
//! locks the namespace it writes to. The outer map is write-locked solely
//! when a namespace is created.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use jsonschema::JSONSchema;
use tracing::debug;

use crate::error::CatalogError;
use crate::event::{DomainEvent, EventBus};
use crate::function::{FunctionDefinition, FunctionDescriptor, FunctionProvider, NAME_SEPARATOR};

type Namespace = RwLock<BTreeMap<String, Arc<FunctionDescriptor>>>;

/// A registry of callable functions.
///
/// The orchestration loop uses it to:
/// 1. Get function definitions to send to the model
/// 2. Look up functions when the model requests them
#[derive(Default)]
pub struct FunctionCatalog {
    namespaces: RwLock<BTreeMap<String, Arc<Namespace>>>,
    event_bus: Option<Arc<EventBus>>,
}

impl FunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a `FunctionRegistered` event for every registration.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Register a function. Fails if `(namespace, name)` is already taken;
    /// the existing registration is left untouched.
    pub fn register(&self, descriptor: FunctionDescriptor) -> Result<(), CatalogError> {
        validate(&descriptor)?;

        let namespace = self.namespace_or_insert(&descriptor.namespace);
        let mut functions = namespace.write().unwrap_or_else(PoisonError::into_inner);
        match functions.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(CatalogError::DuplicateFunction {
                namespace: descriptor.namespace,
                name: descriptor.name,
            }),
            Entry::Vacant(slot) => {
                self.announce(&descriptor);
                slot.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    /// Register every function a provider yields.
    ///
    /// All-or-nothing: if any descriptor is invalid or collides with an
    /// existing (or earlier yielded) name, nothing is registered.
    pub fn register_provider(&self, provider: &dyn FunctionProvider) -> Result<usize, CatalogError> {
        let descriptors = provider.functions();
        for descriptor in &descriptors {
            if descriptor.namespace != provider.namespace() {
                return Err(CatalogError::InvalidName {
                    value: descriptor.qualified_name(),
                    reason: format!(
                        "descriptor namespace does not match provider namespace '{}'",
                        provider.namespace()
                    ),
                });
            }
            validate(descriptor)?;
        }

        let namespace = self.namespace_or_insert(provider.namespace());
        let mut functions = namespace.write().unwrap_or_else(PoisonError::into_inner);
        let mut seen = std::collections::HashSet::new();
        for descriptor in &descriptors {
            if functions.contains_key(&descriptor.name) || !seen.insert(descriptor.name.as_str()) {
                return Err(CatalogError::DuplicateFunction {
                    namespace: descriptor.namespace.clone(),
                    name: descriptor.name.clone(),
                });
            }
        }

        let count = descriptors.len();
        for descriptor in descriptors {
            self.announce(&descriptor);
            functions.insert(descriptor.name.clone(), Arc::new(descriptor));
        }
        Ok(count)
    }

    /// Remove a function. Conversations already holding it keep their handle.
    pub fn unregister(&self, namespace: &str, name: &str) -> Result<Arc<FunctionDescriptor>, CatalogError> {
        let unknown = || CatalogError::UnknownFunction {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let ns = self.namespace(namespace).ok_or_else(unknown)?;
        let mut functions = ns.write().unwrap_or_else(PoisonError::into_inner);
        let removed = functions.remove(name).ok_or_else(unknown)?;
        debug!(namespace, name, "Function unregistered");
        Ok(removed)
    }

    /// Get a function by namespace and name.
    pub fn lookup(&self, namespace: &str, name: &str) -> Result<Arc<FunctionDescriptor>, CatalogError> {
        self.namespace(namespace)
            .and_then(|ns| {
                let functions = ns.read().unwrap_or_else(PoisonError::into_inner);
                functions.get(name).cloned()
            })
            .ok_or_else(|| CatalogError::UnknownFunction {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// Registered functions, optionally restricted to one namespace,
    /// ordered by namespace then name.
    ///
    /// The iterator walks a snapshot taken at call time; call again (or
    /// clone it) to restart.
    pub fn list(&self, namespace: Option<&str>) -> std::vec::IntoIter<Arc<FunctionDescriptor>> {
        let namespaces: Vec<Arc<Namespace>> = {
            let map = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
            match namespace {
                Some(ns) => map.get(ns).cloned().into_iter().collect(),
                None => map.values().cloned().collect(),
            }
        };

        namespaces
            .iter()
            .flat_map(|ns| {
                ns.read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// All function definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.list(None).map(|d| d.to_definition()).collect()
    }

    /// Names of all namespaces that were ever registered into.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.list(None).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn namespace(&self, namespace: &str) -> Option<Arc<Namespace>> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .cloned()
    }

    fn namespace_or_insert(&self, namespace: &str) -> Arc<Namespace> {
        if let Some(ns) = self.namespace(namespace) {
            return ns;
        }
        let mut map = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(namespace.to_string()).or_default())
    }

    fn announce(&self, descriptor: &FunctionDescriptor) {
        debug!(
            namespace = %descriptor.namespace,
            name = %descriptor.name,
            "Function registered"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::FunctionRegistered {
                function: descriptor.qualified_name(),
                timestamp: Utc::now(),
            });
        }
    }
}

fn validate(descriptor: &FunctionDescriptor) -> Result<(), CatalogError> {
    validate_identifier(&descriptor.namespace)?;
    validate_identifier(&descriptor.name)?;
    if let Err(e) = JSONSchema::compile(&descriptor.parameters) {
        return Err(CatalogError::InvalidSchema {
            namespace: descriptor.namespace.clone(),
            name: descriptor.name.clone(),
            reason: e.to_string(),
        });
    }
    Ok(())
}

/// Names travel to the model as `namespace-name`, so neither part may be
/// empty or contain the separator.
fn validate_identifier(value: &str) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidName {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.contains(NAME_SEPARATOR) {
        return Err(invalid("must not contain '-'"));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only ASCII letters, digits and '_' are allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Arguments, Function};
    use async_trait::async_trait;

    /// A simple test function for unit tests.
    struct Echo;

    #[async_trait]
    impl Function for Echo {
        async fn invoke(&self, arguments: Arguments) -> anyhow::Result<serde_json::Value> {
            Ok(arguments.get("text").cloned().unwrap_or_default())
        }
    }

    fn echo(namespace: &str, name: &str) -> FunctionDescriptor {
        FunctionDescriptor::new(
            namespace,
            name,
            "Echoes back the input",
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
            Arc::new(Echo),
        )
    }

    struct Pair;

    impl FunctionProvider for Pair {
        fn namespace(&self) -> &str {
            "pair"
        }

        fn functions(&self) -> Vec<FunctionDescriptor> {
            vec![echo("pair", "first"), echo("pair", "second")]
        }
    }

    #[test]
    fn register_and_lookup() {
        let catalog = FunctionCatalog::new();
        catalog.register(echo("text", "echo")).unwrap();
        assert_eq!(catalog.lookup("text", "echo").unwrap().name, "echo");
        assert!(matches!(
            catalog.lookup("text", "nonexistent"),
            Err(CatalogError::UnknownFunction { .. })
        ));
        assert!(matches!(
            catalog.lookup("other", "echo"),
            Err(CatalogError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn duplicate_registration_keeps_original() {
        let catalog = FunctionCatalog::new();
        catalog.register(echo("text", "echo")).unwrap();

        let mut replacement = echo("text", "echo");
        replacement.description = "impostor".into();
        let err = catalog.register(replacement).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateFunction {
                namespace: "text".into(),
                name: "echo".into()
            }
        );
        assert_eq!(
            catalog.lookup("text", "echo").unwrap().description,
            "Echoes back the input"
        );
    }

    #[test]
    fn same_name_in_different_namespaces() {
        let catalog = FunctionCatalog::new();
        catalog.register(echo("a", "echo")).unwrap();
        catalog.register(echo("b", "echo")).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.namespaces(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn invalid_names_rejected() {
        let catalog = FunctionCatalog::new();
        assert!(matches!(
            catalog.register(echo("", "echo")),
            Err(CatalogError::InvalidName { .. })
        ));
        assert!(matches!(
            catalog.register(echo("text", "echo-twice")),
            Err(CatalogError::InvalidName { .. })
        ));
        assert!(matches!(
            catalog.register(echo("text", "with space")),
            Err(CatalogError::InvalidName { .. })
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn invalid_schema_rejected() {
        let catalog = FunctionCatalog::new();
        let descriptor = FunctionDescriptor::new(
            "text",
            "broken",
            "Bad schema",
            serde_json::json!({ "type": 17 }),
            Arc::new(Echo),
        );
        assert!(matches!(
            catalog.register(descriptor),
            Err(CatalogError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn list_is_ordered_filtered_and_restartable() {
        let catalog = FunctionCatalog::new();
        catalog.register(echo("b", "zeta")).unwrap();
        catalog.register(echo("a", "beta")).unwrap();
        catalog.register(echo("a", "alpha")).unwrap();

        let all: Vec<String> = catalog.list(None).map(|d| d.qualified_name()).collect();
        assert_eq!(all, vec!["a-alpha", "a-beta", "b-zeta"]);

        let listing = catalog.list(Some("a"));
        let first: Vec<String> = listing.clone().map(|d| d.name.clone()).collect();
        let second: Vec<String> = listing.map(|d| d.name.clone()).collect();
        assert_eq!(first, vec!["alpha", "beta"]);
        assert_eq!(first, second);

        assert_eq!(catalog.list(Some("missing")).count(), 0);
    }

    #[test]
    fn definitions_use_qualified_names() {
        let catalog = FunctionCatalog::new();
        catalog.register(echo("text", "echo")).unwrap();
        let defs = catalog.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "text-echo");
    }

    #[test]
    fn provider_registration_is_all_or_nothing() {
        let catalog = FunctionCatalog::new();
        assert_eq!(catalog.register_provider(&Pair).unwrap(), 2);

        let again = catalog.register_provider(&Pair).unwrap_err();
        assert!(matches!(again, CatalogError::DuplicateFunction { .. }));
        assert_eq!(catalog.list(Some("pair")).count(), 2);
    }

    #[test]
    fn unregister_removes_function() {
        let catalog = FunctionCatalog::new();
        catalog.register(echo("text", "echo")).unwrap();
        let handle = catalog.lookup("text", "echo").unwrap();

        catalog.unregister("text", "echo").unwrap();
        assert!(catalog.lookup("text", "echo").is_err());
        assert!(catalog.unregister("text", "echo").is_err());
        // Outstanding handles stay usable.
        assert_eq!(handle.name, "echo");

        catalog.register(echo("text", "echo")).unwrap();
        assert!(catalog.lookup("text", "echo").is_ok());
    }

    #[test]
    fn registration_publishes_event() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let catalog = FunctionCatalog::new().with_event_bus(bus);
        catalog.register(echo("text", "echo")).unwrap();

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::FunctionRegistered { function, .. } if function == "text-echo"
        ));
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let catalog = Arc::new(FunctionCatalog::new());
        catalog.register(echo("stable", "echo")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        catalog
                            .register(echo(&format!("ns{i}"), &format!("f{j}")))
                            .unwrap();
                        assert!(catalog.lookup("stable", "echo").is_ok());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(catalog.len(), 1 + 8 * 50);
        assert_eq!(catalog.list(Some("ns3")).count(), 50);
    }
}
