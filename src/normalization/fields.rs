use serde_json::{Map, Value};

/// Read a textual field. Strings are kept verbatim; numbers and booleans are
/// stringified; anything else (absent, null, arrays, objects) is missing.
pub fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read an integer field, accepting integers, floats (truncated toward zero)
/// and numeric strings.
pub fn int(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    as_int(obj.get(key)?)
}

/// Counter semantics: absent or unparseable values count as zero.
pub fn counter(obj: &Map<String, Value>, key: &str) -> i64 {
    int(obj, key).unwrap_or(0)
}

pub fn float(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(|f| to_i64(f.trunc()))),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(|f| to_i64(f.trunc())))
        }
        _ => None,
    }
}

/// Exact conversion of an integral float. Values outside the `i64` range
/// (and NaN or infinities) are rejected rather than saturated.
pub fn to_i64(f: f64) -> Option<i64> {
    // -2^63 is representable; 2^63 is not.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-BOUND..BOUND).contains(&f)).then_some(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn text_stringifies_scalars_and_drops_containers() {
        let o = obj(json!({"a": "x", "b": 12, "c": null, "d": [1], "e": true}));
        assert_eq!(text(&o, "a").as_deref(), Some("x"));
        assert_eq!(text(&o, "b").as_deref(), Some("12"));
        assert_eq!(text(&o, "c"), None);
        assert_eq!(text(&o, "d"), None);
        assert_eq!(text(&o, "e").as_deref(), Some("true"));
        assert_eq!(text(&o, "missing"), None);
    }

    #[test]
    fn counters_coerce_or_default_to_zero() {
        let o = obj(json!({"a": 3, "b": "17", "c": 4.9, "d": "n/a", "e": null}));
        assert_eq!(counter(&o, "a"), 3);
        assert_eq!(counter(&o, "b"), 17);
        assert_eq!(counter(&o, "c"), 4);
        assert_eq!(counter(&o, "d"), 0);
        assert_eq!(counter(&o, "e"), 0);
        assert_eq!(counter(&o, "missing"), 0);
    }

    #[test]
    fn out_of_range_counters_are_zero_not_saturated() {
        let o = obj(json!({"a": 1e20, "b": "1e20", "c": -1e20, "d": "-4.5e3"}));
        assert_eq!(counter(&o, "a"), 0);
        assert_eq!(counter(&o, "b"), 0);
        assert_eq!(counter(&o, "c"), 0);
        assert_eq!(counter(&o, "d"), -4500);
        assert_eq!(int(&o, "a"), None);
    }

    #[test]
    fn to_i64_accepts_only_exact_in_range_values() {
        assert_eq!(to_i64(42.0), Some(42));
        assert_eq!(to_i64(-9_223_372_036_854_775_808.0), Some(i64::MIN));
        assert_eq!(to_i64(9_223_372_036_854_775_808.0), None);
        assert_eq!(to_i64(1.5), None);
        assert_eq!(to_i64(f64::NAN), None);
        assert_eq!(to_i64(f64::INFINITY), None);
    }

    #[test]
    fn float_reads_numbers_and_numeric_strings() {
        let o = obj(json!({"a": 0.25, "b": "0.5", "c": "x", "d": 1}));
        assert_eq!(float(&o, "a"), Some(0.25));
        assert_eq!(float(&o, "b"), Some(0.5));
        assert_eq!(float(&o, "c"), None);
        assert_eq!(float(&o, "d"), Some(1.0));
    }
}
