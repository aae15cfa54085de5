//! Persisted state hook
//!
//! The value survives across passes in the render state. Setters write
//! straight into the shared state store, so a setter called from an action
//! callback is visible to the pass that follows it.

use std::future::Future;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CallSite, Init};
use crate::error::{Halt, HookError, ProtocolError};
use crate::render::RenderContext;
use crate::state::{HookId, StateStore};

const NAMESPACE: &str = "state";

/// A state hook as seen by the component
#[derive(Debug)]
pub struct StateHook<T> {
    id: HookId,
    value: Result<T, HookError>,
    setter: SetState<T>,
}

impl<T> StateHook<T> {
    pub fn id(&self) -> &HookId {
        &self.id
    }

    /// The current value, or the initializer's failure
    pub fn value(&self) -> Result<&T, HookError> {
        self.value.as_ref().map_err(Clone::clone)
    }

    pub fn get(&self) -> Result<T, HookError>
    where
        T: Clone,
    {
        self.value.clone()
    }

    pub fn setter(&self) -> SetState<T> {
        self.setter.clone()
    }

    pub fn into_parts(self) -> (Result<T, HookError>, SetState<T>) {
        (self.value, self.setter)
    }
}

/// Writes a state hook's value. Cheap to clone and safe to move into
/// callbacks.
pub struct SetState<T> {
    id: HookId,
    store: StateStore,
    _value: PhantomData<fn(T) -> T>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            store: self.store.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetState").field("id", &self.id).finish()
    }
}

impl<T> SetState<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn id(&self) -> &HookId {
        &self.id
    }

    /// Replace the stored value
    pub fn set(&self, value: T) -> Result<(), ProtocolError> {
        let encoded =
            serde_json::to_value(&value).map_err(|e| ProtocolError::state_shape(&self.id, e))?;
        self.store.write(|state| {
            let record = state
                .get_mut(&self.id)
                .ok_or_else(|| ProtocolError::state_shape(&self.id, "no record to write"))?;
            record.overwrite(&self.id, encoded)
        })
    }

    /// Current stored value, including writes made since the pass started
    pub fn current(&self) -> Result<T, ProtocolError> {
        self.store.read(|state| {
            state
                .get(&self.id)
                .ok_or_else(|| ProtocolError::state_shape(&self.id, "no record to read"))?
                .decode(&self.id)
        })
    }

    /// Derive the new value from the current one
    pub fn update<F>(&self, f: F) -> Result<(), ProtocolError>
    where
        F: FnOnce(T) -> T,
    {
        let current = self.current()?;
        self.set(f(current))
    }

    /// Back to `initial`; the initializer runs again on the next pass
    pub fn reset(&self) -> Result<(), ProtocolError> {
        self.store.write(|state| -> Result<(), ProtocolError> {
            let record = state
                .get_mut(&self.id)
                .ok_or_else(|| ProtocolError::state_shape(&self.id, "no record to reset"))?;
            record.reset();
            Ok(())
        })
    }
}

/// State with a synchronous initializer
#[track_caller]
pub fn use_state<T, F>(cx: &mut RenderContext, init: F) -> Result<StateHook<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    F: FnOnce() -> T,
{
    let site = CallSite::here();
    register(cx, site, || Init::Ready(init()))
}

/// State whose initial value comes from async work.
///
/// The first pass is interrupted until the work settles; the initializer
/// never runs again once it has.
#[track_caller]
pub fn use_state_async<T, F, Fut>(cx: &mut RenderContext, init: F) -> Result<StateHook<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + 'static,
{
    let site = CallSite::here();
    register(cx, site, || Init::pending(init()))
}

/// State with an initializer that decides for itself
#[track_caller]
pub fn use_state_with<T, F>(cx: &mut RenderContext, init: F) -> Result<StateHook<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    F: FnOnce() -> Init<T>,
{
    let site = CallSite::here();
    register(cx, site, init)
}

fn register<T, F>(cx: &mut RenderContext, site: CallSite, init: F) -> Result<StateHook<T>, Halt>
where
    T: Serialize + DeserializeOwned + 'static,
    F: FnOnce() -> Init<T>,
{
    let slot = cx.registry().register(NAMESPACE, site, init)?;
    let setter = SetState {
        id: slot.id.clone(),
        store: cx.store().clone(),
        _value: PhantomData,
    };
    Ok(StateHook {
        value: slot.value.into_result(&slot.id),
        id: slot.id,
        setter,
    })
}
