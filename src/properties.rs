//! `+key=value` request-property parsing.
//!
//! Leading command tokens of the form `+key=value` patch the outbound request
//! payload. Parsing is total: every token maps to some JSON value, with a
//! plain string as the fallback at each step of the inference ladder.

use serde_json::{Map, Value};

/// A typed set of request-property overrides, immutable once parsed.
///
/// Keys are unique (last write wins) and iteration preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet {
    entries: Map<String, Value>,
}

impl PropertySet {
    /// Splits `tokens` into a property prefix and the prompt remainder.
    ///
    /// Property tokens are consumed only while still at the head of the
    /// sequence; the first non-`+` token ends the prefix and every later
    /// token belongs to the remainder, even if it starts with `+`.
    pub fn parse<I, S>(tokens: I) -> (PropertySet, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Map::new();
        let mut remainder = Vec::new();
        let mut accepting = true;
        for token in tokens {
            let token = token.as_ref();
            if accepting && let Some(prop) = token.strip_prefix('+') {
                let (key, value) = match prop.split_once('=') {
                    Some((key, value)) => (key, value),
                    None => (prop, ""),
                };
                entries.insert(key.to_string(), infer_value(value));
            } else {
                accepting = false;
                remainder.push(token.to_string());
            }
        }
        (PropertySet { entries }, remainder)
    }

    /// The prompt candidate: remainder tokens joined by single spaces.
    pub fn join_remainder(remainder: &[String]) -> String {
        remainder.join(" ")
    }

    /// Whether the set holds no overrides.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up an override by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterates overrides in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

/// Infers the JSON type of a raw property value.
///
/// Order: boolean literal, numeric literal (integer when integral, decimal
/// otherwise), brace- or bracket-delimited JSON (string fallback on parse
/// failure), plain string.
fn infer_value(raw: &str) -> Value {
    if raw == "true" {
        return Value::Bool(true);
    }
    if raw == "false" {
        return Value::Bool(false);
    }
    if let Some(number) = infer_number(raw) {
        return number;
    }
    let delimited = (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'));
    if delimited && let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    Value::String(raw.to_string())
}

fn infer_number(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    // f64's parser accepts words like "inf" and "nan"; a numeric literal
    // must start with a digit, sign, or decimal point.
    if !raw
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
    {
        return None;
    }
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::Number((f as i64).into()))
    } else {
        serde_json::Number::from_f64(f).map(Value::Number)
    }
}
