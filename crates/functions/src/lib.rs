//! Function sets for toolloop.
//!
//! [`FunctionSet`] turns closures into registrable functions under one
//! namespace. [`helper_functions`] is the built-in `HelperFunctions` set:
//! the current UTC time and a city weather table.

pub mod clock;
pub mod set;
pub mod weather;

pub use set::{FnFunction, FunctionSet, SyncFnFunction, string_arg};

/// Namespace of the built-in helpers.
pub const HELPER_NAMESPACE: &str = "HelperFunctions";

/// The built-in helper functions:
/// - `GetCurrentUtcTime()`
/// - `Get_Weather_For_City(cityName)`
/// - `GetWeather(city)`
pub fn helper_functions() -> FunctionSet {
    let set = FunctionSet::new(HELPER_NAMESPACE)
        .with_description("Time and weather helpers the model may call");
    weather::register(clock::register(set))
}
