pub mod config_cmd;
pub mod demo;
pub mod functions;

use std::sync::Arc;

use toolloop_core::FunctionCatalog;
use toolloop_functions::{FunctionSet, helper_functions};

/// The function sets shipped with the binary.
pub fn default_sets() -> Vec<FunctionSet> {
    vec![helper_functions()]
}

/// The catalog every command works against.
pub fn default_catalog() -> Result<Arc<FunctionCatalog>, Box<dyn std::error::Error>> {
    let catalog = FunctionCatalog::new();
    for set in default_sets() {
        catalog.register_provider(&set)?;
    }
    Ok(Arc::new(catalog))
}
