//! Weather lookup over a fixed table of city conditions.
//!
//! Deterministic so that conversations over it can be asserted end-to-end
//! without network access.

use toolloop_core::function::Arguments;
use tracing::debug;

use crate::set::{FunctionSet, string_arg};

pub const NAME: &str = "Get_Weather_For_City";
pub const SHORT_NAME: &str = "GetWeather";

/// Current conditions for a city; unknown cities are snowed in.
pub fn conditions_for(city: &str) -> &'static str {
    match city {
        "Boston" => "61 and rainy",
        "London" => "55 and cloudy",
        "Miami" => "80 and sunny",
        "Paris" => "60 and rainy",
        "Tokyo" => "50 and sunny",
        "Sydney" => "75 and sunny",
        "Tel Aviv" => "80 and sunny",
        _ => "31 and snowing",
    }
}

fn city_schema(parameter: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            parameter: {
                "type": "string",
                "description": "The city to get the weather for"
            }
        },
        "required": [parameter]
    })
}

fn lookup(arguments: &Arguments, parameter: &str) -> anyhow::Result<serde_json::Value> {
    let city = string_arg(arguments, parameter)?;
    debug!(city, "Weather lookup");
    Ok(serde_json::Value::String(conditions_for(city).to_string()))
}

/// Add `Get_Weather_For_City(cityName)` and `GetWeather(city)` to a set.
pub fn register(set: FunctionSet) -> FunctionSet {
    set.with_sync_function(
        NAME,
        "Gets the current weather for the specified city",
        city_schema("cityName"),
        |args| lookup(&args, "cityName"),
    )
    .with_sync_function(
        SHORT_NAME,
        "Gets the current weather for a city",
        city_schema("city"),
        |args| lookup(&args, "city"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_cities() {
        assert_eq!(conditions_for("Paris"), "60 and rainy");
        assert_eq!(conditions_for("Tel Aviv"), "80 and sunny");
        assert_eq!(conditions_for("Reykjavik"), "31 and snowing");
    }

    #[test]
    fn schema_requires_the_city_parameter() {
        let schema = city_schema("cityName");
        assert_eq!(schema["required"][0], "cityName");
        assert_eq!(schema["properties"]["cityName"]["type"], "string");
    }
}
