//! Current UTC time.

use chrono::{DateTime, Utc};
use toolloop_core::function::empty_parameters;

use crate::set::FunctionSet;

pub const NAME: &str = "GetCurrentUtcTime";

/// RFC 1123 rendering, e.g. `Fri, 16 Oct 2026 09:30:00 GMT`.
pub fn format_rfc1123(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Add `GetCurrentUtcTime()` to a set.
pub fn register(set: FunctionSet) -> FunctionSet {
    set.with_sync_function(
        NAME,
        "Retrieves the current time in UTC.",
        empty_parameters(),
        |_| Ok(serde_json::Value::String(format_rfc1123(Utc::now()))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc1123_format() {
        let t = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        assert_eq!(format_rfc1123(t), "Fri, 16 Oct 2026 09:30:00 GMT");
    }
}
