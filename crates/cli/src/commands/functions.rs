//! `toolloop functions`: list the registered functions.

use toolloop_core::{FunctionDescriptor, FunctionProvider};
use toolloop_functions::FunctionSet;

use super::{default_catalog, default_sets};

pub async fn run(namespace: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let sets = default_sets();
    let catalog = default_catalog()?;
    let functions: Vec<_> = catalog.list(namespace).collect();

    if functions.is_empty() {
        match namespace {
            Some(ns) => println!("No functions registered in namespace '{ns}'."),
            None => println!("No functions registered."),
        }
        return Ok(());
    }

    println!("🔧 Registered functions ({})", functions.len());
    let mut current: Option<&str> = None;
    for descriptor in &functions {
        if current != Some(descriptor.namespace.as_str()) {
            current = Some(descriptor.namespace.as_str());
            println!();
            println!("{}", namespace_header(&descriptor.namespace, &sets));
        }
        println!("  {}({})", descriptor.qualified_name(), parameter_list(descriptor));
        println!("      {}", descriptor.description);
    }
    Ok(())
}

/// `[namespace] description`, falling back to the bare namespace.
fn namespace_header(namespace: &str, sets: &[FunctionSet]) -> String {
    let description = sets
        .iter()
        .find(|set| set.namespace() == namespace)
        .and_then(FunctionSet::description);
    match description {
        Some(description) => format!("  [{namespace}] {description}"),
        None => format!("  [{namespace}]"),
    }
}

/// `name: type` pairs from the parameter schema, required ones first.
fn parameter_list(descriptor: &FunctionDescriptor) -> String {
    let Some(properties) = descriptor.parameters["properties"].as_object() else {
        return String::new();
    };
    let required: Vec<&str> = descriptor.parameters["required"]
        .as_array()
        .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
        .unwrap_or_default();

    let mut params: Vec<(bool, String)> = properties
        .iter()
        .map(|(name, schema)| {
            let kind = schema["type"].as_str().unwrap_or("any");
            let is_required = required.contains(&name.as_str());
            let marker = if is_required { "" } else { "?" };
            (!is_required, format!("{name}{marker}: {kind}"))
        })
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params.into_iter().map(|(_, p)| p).collect::<Vec<_>>().join(", ")
}
