//! Process-wide cache of compiled validators, keyed by kind id.
//!
//! Entries carry the content hash of the schema they were compiled from, so
//! a stale entry is recompiled transparently. Upserting a kind invalidates
//! its entry.

use crate::canonical::content_hash;
use crate::error::Result;
use crate::schema::validator::CompiledSchema;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

#[derive(Default)]
pub struct SchemaCache {
    entries: DashMap<String, Arc<(String, CompiledSchema)>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled validator for a kind's schema, compiling on miss or
    /// on schema-hash mismatch.
    pub fn get_or_compile(&self, kind_id: &str, schema: &Value) -> Result<Arc<(String, CompiledSchema)>> {
        let hash = content_hash(schema);
        if let Some(entry) = self.entries.get(kind_id) {
            if entry.0 == hash {
                return Ok(entry.clone());
            }
        }
        let compiled = CompiledSchema::compile(schema)?;
        let entry = Arc::new((hash, compiled));
        self.entries.insert(kind_id.to_string(), entry.clone());
        Ok(entry)
    }

    /// Drop the cached validator for a kind (on upsert).
    pub fn invalidate(&self, kind_id: &str) {
        self.entries.remove(kind_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_hit_reuses_compiled() {
        let cache = SchemaCache::new();
        let schema = json!({"type": "object"});
        let a = cache.get_or_compile("task", &schema).unwrap();
        let b = cache.get_or_compile("task", &schema).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_schema_change_recompiles() {
        let cache = SchemaCache::new();
        let a = cache
            .get_or_compile("task", &json!({"type": "object"}))
            .unwrap();
        let b = cache
            .get_or_compile("task", &json!({"type": "object", "required": ["x"]}))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn test_invalidate() {
        let cache = SchemaCache::new();
        cache
            .get_or_compile("task", &json!({"type": "object"}))
            .unwrap();
        cache.invalidate("task");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bad_schema_not_cached() {
        let cache = SchemaCache::new();
        assert!(cache.get_or_compile("task", &json!({"oops": 1})).is_err());
        assert!(cache.is_empty());
    }
}
