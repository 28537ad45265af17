//! In-process store implementation.
//!
//! Backs the test suite and the dry-run mode used when no store
//! credentials are configured. Semantics mirror the Redis commands the
//! service relies on, including list ordering (`lpush` prepends).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{KvStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    strings: Mutex<HashMap<String, String>>,
    lists: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.strings.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.strings.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut strings = self.strings.lock().await;
        if strings.contains_key(key) {
            Ok(false)
        } else {
            strings.insert(key.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.strings.lock().await.remove(key);
        self.lists.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let strings = self.strings.lock().await;
        let mut found: Vec<String> = strings
            .keys()
            .filter(|k| Self::matches(pattern, k))
            .cloned()
            .collect();
        found.sort();
        Ok(found)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        let mut strings = self.strings.lock().await;
        let current: f64 = strings
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        let next = current + delta;
        strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut strings = self.strings.lock().await;
        let current: i64 = strings
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = current + 1;
        strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        lists
            .entry(key.to_string())
            .or_default()
            .insert(0, value.to_string());
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        if let Some(list) = lists.get_mut(key) {
            let len = list.len() as i64;
            let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
            let start = norm(start) as usize;
            let stop = norm(stop);
            let stop = if stop >= len { len as usize } else { (stop + 1) as usize };
            *list = if start < stop {
                list[start..stop].to_vec()
            } else {
                Vec::new()
            };
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.lock().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;
        let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
        let start = norm(start).min(len) as usize;
        let stop = norm(stop);
        let stop = if stop >= len { len as usize } else { (stop + 1) as usize };
        if start >= stop {
            return Ok(Vec::new());
        }
        Ok(list[start..stop].to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
