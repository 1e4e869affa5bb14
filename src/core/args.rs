//! Typed access to the untyped argument map a tool is called with.
//!
//! Hosts and LLM callers are loose with types: numbers arrive as strings,
//! booleans as `"true"`, lists as comma separated text. The getters here
//! accept those shapes and report real mismatches as `InvalidArgument`.

use serde_json::{Map, Value as JsonValue};

use crate::core::error::ServletError;

#[derive(Debug, Clone, Default)]
pub struct Args(Map<String, JsonValue>);

impl Args {
    pub fn new(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }

    /// Accepts an object, `null` (no arguments) or nothing else.
    pub fn from_value(v: &JsonValue) -> Result<Self, ServletError> {
        match v {
            JsonValue::Null => Ok(Self::default()),
            JsonValue::Object(m) => Ok(Self(m.clone())),
            other => Err(ServletError::invalid(format!(
                "arguments must be an object, got {other}"
            ))),
        }
    }

    pub fn raw(&self, key: &str) -> Option<&JsonValue> {
        match self.0.get(key) {
            None | Some(JsonValue::Null) => None,
            Some(v) => Some(v),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// Trimmed string value; empty strings and the literal `"null"` count as absent.
    /// Numbers and booleans are rendered as text.
    pub fn str(&self, key: &str) -> Option<String> {
        let s = match self.raw(key)? {
            JsonValue::String(s) => s.trim().to_string(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            _ => return None,
        };
        if s.is_empty() || s == "null" {
            None
        } else {
            Some(s)
        }
    }

    /// String value without trimming, for payloads such as file content.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.raw(key)? {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn require_str(&self, key: &str) -> Result<String, ServletError> {
        self.str(key)
            .ok_or_else(|| ServletError::MissingArgument(key.to_string()))
    }

    pub fn require_text(&self, key: &str) -> Result<String, ServletError> {
        self.text(key)
            .ok_or_else(|| ServletError::MissingArgument(key.to_string()))
    }

    pub fn f64(&self, key: &str) -> Result<Option<f64>, ServletError> {
        match self.raw(key) {
            None => Ok(None),
            Some(JsonValue::Number(n)) => Ok(n.as_f64()),
            Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ServletError::invalid(format!("{key} must be a number"))),
            Some(_) => Err(ServletError::invalid(format!("{key} must be a number"))),
        }
    }

    pub fn i64(&self, key: &str) -> Result<Option<i64>, ServletError> {
        match self.f64(key)? {
            None => Ok(None),
            Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
            Some(_) => Err(ServletError::invalid(format!("{key} must be an integer"))),
        }
    }

    pub fn u64(&self, key: &str) -> Result<Option<u64>, ServletError> {
        match self.i64(key)? {
            None => Ok(None),
            Some(n) if n >= 0 => Ok(Some(n as u64)),
            Some(_) => Err(ServletError::invalid(format!("{key} must not be negative"))),
        }
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64, ServletError> {
        Ok(self.i64(key)?.unwrap_or(default))
    }

    pub fn require_i64(&self, key: &str) -> Result<i64, ServletError> {
        self.i64(key)?
            .ok_or_else(|| ServletError::MissingArgument(key.to_string()))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, ServletError> {
        match self.raw(key) {
            None => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(ServletError::invalid(format!("{key} must be a boolean"))),
            },
            Some(_) => Err(ServletError::invalid(format!("{key} must be a boolean"))),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ServletError> {
        Ok(self.bool(key)?.unwrap_or(default))
    }

    /// List of strings from an array or a comma separated string.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, ServletError> {
        match self.raw(key) {
            None => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| match v {
                    JsonValue::String(s) => Ok(s.trim().to_string()),
                    JsonValue::Number(n) => Ok(n.to_string()),
                    _ => Err(ServletError::invalid(format!(
                        "{key} must be a list of strings"
                    ))),
                })
                .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
                .collect(),
            Some(JsonValue::String(s)) => Ok(s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()),
            Some(_) => Err(ServletError::invalid(format!(
                "{key} must be a list of strings"
            ))),
        }
    }

    pub fn object(&self, key: &str) -> Result<Option<Map<String, JsonValue>>, ServletError> {
        match self.raw(key) {
            None => Ok(None),
            Some(JsonValue::Object(m)) => Ok(Some(m.clone())),
            Some(_) => Err(ServletError::invalid(format!("{key} must be an object"))),
        }
    }

    pub fn array(&self, key: &str) -> Result<Vec<JsonValue>, ServletError> {
        match self.raw(key) {
            None => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => Ok(items.clone()),
            Some(_) => Err(ServletError::invalid(format!("{key} must be an array"))),
        }
    }
}

impl From<Map<String, JsonValue>> for Args {
    fn from(m: Map<String, JsonValue>) -> Self {
        Self(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: JsonValue) -> Args {
        Args::from_value(&v).unwrap()
    }

    #[test]
    fn strings_are_trimmed_and_blank_is_absent() {
        let a = args(json!({"q":"  rust  ","empty":"   ","n":"null"}));
        assert_eq!(a.str("q").as_deref(), Some("rust"));
        assert!(a.str("empty").is_none());
        assert!(a.str("n").is_none());
        assert!(matches!(
            a.require_str("missing"),
            Err(ServletError::MissingArgument(k)) if k == "missing"
        ));
    }

    #[test]
    fn numbers_accept_strings() {
        let a = args(json!({"a": 3, "b": "4", "c": 2.5, "d": "x"}));
        assert_eq!(a.i64("a").unwrap(), Some(3));
        assert_eq!(a.i64("b").unwrap(), Some(4));
        assert!(a.i64("c").is_err());
        assert_eq!(a.f64("c").unwrap(), Some(2.5));
        assert!(a.f64("d").is_err());
        assert_eq!(a.i64_or("zzz", 7).unwrap(), 7);
        assert_eq!(a.u64("b").unwrap(), Some(4));
        assert!(args(json!({"n": -1})).u64("n").is_err());
    }

    #[test]
    fn objects_are_checked() {
        let a = args(json!({"meta": {"k": 1}, "s": "x"}));
        assert_eq!(a.object("meta").unwrap().unwrap()["k"], 1);
        assert!(a.object("s").is_err());
        assert!(a.object("none").unwrap().is_none());
    }

    #[test]
    fn bools_accept_strings() {
        let a = args(json!({"a": true, "b": "false", "c": "maybe"}));
        assert_eq!(a.bool("a").unwrap(), Some(true));
        assert_eq!(a.bool("b").unwrap(), Some(false));
        assert!(a.bool("c").is_err());
        assert!(a.bool_or("nope", true).unwrap());
    }

    #[test]
    fn lists_from_array_or_csv() {
        let a = args(json!({"a": ["x", " y ", ""], "b": "one, two,,three"}));
        assert_eq!(a.str_list("a").unwrap(), vec!["x", "y"]);
        assert_eq!(a.str_list("b").unwrap(), vec!["one", "two", "three"]);
        assert!(a.str_list("c").unwrap().is_empty());
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        assert!(Args::from_value(&json!([1, 2])).is_err());
        assert!(Args::from_value(&JsonValue::Null).unwrap().raw("x").is_none());
    }
}
