//! Execution context
//!
//! A serializable key/value map owned by one job or step execution. The
//! repository persists it atomically with the owning execution's
//! checkpoint write, and restores it verbatim on restart, so readers can
//! record their offset here and resume mid-stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Checkpoint state for a job or step execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    entries: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) {
        self.put(key, Value::String(value.into()));
    }

    pub fn put_i64(&mut self, key: &str, value: i64) {
        self.put(key, Value::from(value));
    }

    pub fn put_f64(&mut self, key: &str, value: f64) {
        self.put(key, Value::from(value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut ctx = ExecutionContext::new();
        ctx.put_string("reader.file", "input.csv");
        ctx.put_i64("reader.offset", 42);
        ctx.put_f64("progress", 0.5);

        assert_eq!(ctx.get_string("reader.file"), Some("input.csv"));
        assert_eq!(ctx.get_i64("reader.offset"), Some(42));
        assert_eq!(ctx.get_f64("progress"), Some(0.5));
        assert_eq!(ctx.get_i64("missing"), None);
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn test_json_round_trip() {
        let mut ctx = ExecutionContext::new();
        ctx.put_i64("offset", 7);
        ctx.put_string("source", "orders");

        let json = serde_json::to_string(&ctx).unwrap();
        let restored: ExecutionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ctx);
    }
}
