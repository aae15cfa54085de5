//! Async data providers
//!
//! Providers resolve the asynchronous work behind `use_state_async` and
//! `use_async` initializers. Passes run on a single thread, so providers are
//! not required to be `Send`.
//!
//! # Examples
//!
//! ```no_run
//! use std::rc::Rc;
//! use libblocks::hooks::use_async;
//! use libblocks::providers::{fetch_as, DataProvider};
//! use libblocks::render::{component_fn, Node};
//!
//! fn profile(provider: Rc<dyn DataProvider>) -> impl libblocks::render::Component {
//!     component_fn("Profile", move |_, cx| {
//!         let provider = Rc::clone(&provider);
//!         let user = use_async(cx, move || fetch_as::<String>(provider, "user:name"))?;
//!         Ok(Node::text(user.data().cloned().unwrap_or_else(|| "Loading...".into())))
//!     })
//! }
//! ```

use std::rc::Rc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod mock;

#[async_trait(?Send)]
pub trait DataProvider {
    /// Resolve the value stored under `key`
    async fn fetch(&self, key: &str) -> anyhow::Result<Value>;

    fn name(&self) -> &str;
}

/// Fetch `key` and decode it, owning everything the returned future needs
pub async fn fetch_as<T>(provider: Rc<dyn DataProvider>, key: impl Into<String>) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let key = key.into();
    let value = provider
        .fetch(&key)
        .await
        .with_context(|| format!("{} failed to fetch '{}'", provider.name(), key))?;
    serde_json::from_value(value)
        .with_context(|| format!("{} returned an unexpected shape for '{}'", provider.name(), key))
}
