//! Mock data provider for testing
//!
//! Serves canned values with optional latency and failure, and counts calls
//! so tests can assert that initializers ran at most once.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use serde_json::Value;

use super::DataProvider;

/// Configuration for mock provider behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Provider name used in error context
    pub name: String,

    /// Values served by key
    pub values: HashMap<String, Value>,

    /// Error returned for every fetch
    pub error: Option<String>,

    /// Delay before completing a fetch (simulates network latency)
    pub delay: Duration,

    /// Number of times fetch has been called
    pub fetch_call_count: Arc<Mutex<usize>>,

    /// Keys fetched, in call order
    pub fetched_keys: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            values: HashMap::new(),
            error: None,
            delay: Duration::from_millis(0),
            fetch_call_count: Arc::new(Mutex::new(0)),
            fetched_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    config: MockConfig,
}

impl MockProvider {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a provider serving the given values
    pub fn with_values<K, I>(name: &str, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::new(MockConfig {
            name: name.to_string(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Default::default()
        })
    }

    /// Create a provider whose every fetch fails
    pub fn failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.config.values.insert(key.into(), value);
    }

    /// Get the number of times fetch was called
    pub fn fetch_call_count(&self) -> usize {
        *self.config.fetch_call_count.lock().unwrap()
    }

    /// Get every key fetched so far
    pub fn fetched_keys(&self) -> Vec<String> {
        self.config.fetched_keys.lock().unwrap().clone()
    }
}

#[async_trait(?Send)]
impl DataProvider for MockProvider {
    async fn fetch(&self, key: &str) -> anyhow::Result<Value> {
        *self.config.fetch_call_count.lock().unwrap() += 1;
        self.config
            .fetched_keys
            .lock()
            .unwrap()
            .push(key.to_string());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.error {
            anyhow::bail!("{}", error);
        }
        self.config
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no value for key '{}'", key))
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
