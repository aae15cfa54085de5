//! Non-blocking async data
//!
//! Unlike `use_state_async`, the pass is not interrupted: the component
//! renders a loading state and the response carries a requeue directive so
//! the host resumes once the loader settles.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CallSite, Init, SlotValue};
use crate::error::{Halt, HookError};
use crate::render::RenderContext;
use crate::state::HookId;

const NAMESPACE: &str = "async";

#[derive(Debug, Clone)]
pub struct AsyncData<T> {
    id: HookId,
    value: SlotValue<T>,
}

impl<T> AsyncData<T> {
    pub fn id(&self) -> &HookId {
        &self.id
    }

    pub fn data(&self) -> Option<&T> {
        match &self.value {
            SlotValue::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn loading(&self) -> bool {
        matches!(self.value, SlotValue::Loading)
    }

    pub fn error(&self) -> Option<&HookError> {
        match &self.value {
            SlotValue::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// `Ok(None)` while loading
    pub fn into_result(self) -> Result<Option<T>, HookError> {
        match self.value {
            SlotValue::Ready(value) => Ok(Some(value)),
            SlotValue::Loading => Ok(None),
            SlotValue::Failed(error) => Err(error),
        }
    }
}

/// Load data in the background; the loader runs once per hook
#[track_caller]
pub fn use_async<T, F, Fut>(cx: &mut RenderContext, loader: F) -> Result<AsyncData<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + 'static,
{
    let site = CallSite::here();
    register(cx, site, None, loader)
}

/// Load data in the background, again whenever `depends_on` changes
#[track_caller]
pub fn use_async_with_deps<T, D, F, Fut>(
    cx: &mut RenderContext,
    depends_on: D,
    loader: F,
) -> Result<AsyncData<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    D: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + 'static,
{
    let site = CallSite::here();
    let deps = serde_json::to_value(depends_on)
        .map_err(|e| anyhow::Error::new(e).context("encoding use_async dependencies"))?;
    register(cx, site, Some(deps), loader)
}

fn register<T, F, Fut>(
    cx: &mut RenderContext,
    site: CallSite,
    deps: Option<serde_json::Value>,
    loader: F,
) -> Result<AsyncData<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + 'static,
{
    let slot = cx
        .registry()
        .register_deferred(NAMESPACE, site, deps, || Init::pending(loader()))?;
    Ok(AsyncData {
        id: slot.id,
        value: slot.value,
    })
}
