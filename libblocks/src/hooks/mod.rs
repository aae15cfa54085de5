//! Hook primitives and the hook registry
//!
//! A hook is a unit of state bound to a deterministic position in the
//! component tree. Its identity is `(component path, namespace, occurrence)`,
//! so the same hook is found again on every pass, in every process, as long
//! as components call their hooks in the same order.
//!
//! # Available hooks
//!
//! - [`use_state`], [`use_state_async`]: persisted state; async initializers
//!   interrupt the pass until they settle
//! - [`use_async`], [`use_async_with_deps`]: background data loading that
//!   lets the pass complete in a loading state
//! - [`use_form`]: form definition plus a submit action
//! - [`use_channel`]: realtime channel subscription
//! - [`use_interval`]: host-driven timer
//! - [`use_web_view`]: web view messaging

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::Location;

use futures::future::{FutureExt, LocalBoxFuture};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::effects::EffectEmitter;
use crate::error::{HookError, ProtocolError};
use crate::state::{HookId, RenderState, SettledHook};

pub mod async_data;
pub mod channel;
pub mod form;
pub mod interval;
pub mod registry;
pub mod state;
pub mod web_view;

pub use async_data::{use_async, use_async_with_deps, AsyncData};
pub use channel::{use_channel, Channel};
pub use form::{use_form, FormHandle};
pub use interval::{use_interval, Interval};
pub use registry::HookRegistry;
pub use state::{use_state, use_state_async, use_state_with, SetState, StateHook};
pub use web_view::{use_web_view, WebView};

/// Lifecycle participation for hook primitives.
///
/// Hooks attached to the registry are called back once the pass completes,
/// in registration order, with exclusive access to the render state.
/// The state store is borrowed for the whole callback: read and write
/// through `completion.state`, never through a `StateStore` handle.
pub trait Hook {
    fn id(&self) -> &HookId;

    fn namespace(&self) -> &'static str;

    fn on_pass_complete(&self, _completion: &mut PassCompletion<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// What a hook may touch while a pass completes
pub struct PassCompletion<'a> {
    pub state: &'a mut RenderState,
    pub effects: &'a EffectEmitter,
    /// Channels that want to stay subscribed after this pass
    pub subscriptions: &'a mut BTreeSet<String>,
}

/// Result of a hook initializer
pub enum Init<T> {
    Ready(T),
    Failed(String),
    Pending(LocalBoxFuture<'static, anyhow::Result<T>>),
}

impl<T> Init<T> {
    pub fn ready(value: T) -> Self {
        Init::Ready(value)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Init::Failed(reason.into())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        Init::Pending(future.boxed_local())
    }
}

/// A registered hook as seen by the component
#[derive(Debug, Clone)]
pub struct Slot<T> {
    pub id: HookId,
    pub value: SlotValue<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue<T> {
    Ready(T),
    Loading,
    Failed(HookError),
}

impl<T> SlotValue<T> {
    pub fn into_result(self, id: &HookId) -> Result<T, HookError> {
        match self {
            SlotValue::Ready(value) => Ok(value),
            SlotValue::Failed(error) => Err(error),
            SlotValue::Loading => Err(HookError {
                id: id.clone(),
                reason: "value is still loading".to_string(),
            }),
        }
    }
}

/// Source location of a hook call, used to spot conditional hook usage
#[derive(Debug, Clone, Copy)]
pub struct CallSite(&'static Location<'static>);

impl CallSite {
    #[track_caller]
    pub fn here() -> Self {
        Self(Location::caller())
    }

    /// Short stable digest of `file:line:column`
    pub fn fingerprint(&self) -> String {
        let location = format!("{}:{}:{}", self.0.file(), self.0.line(), self.0.column());
        let digest = Sha256::digest(location.as_bytes());
        digest[..6].iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// Asynchronous hook work left for the host to drive
pub struct PendingHook {
    id: HookId,
    generation: u64,
    future: LocalBoxFuture<'static, Result<Value, String>>,
}

impl PendingHook {
    pub(crate) fn new<T>(
        id: HookId,
        generation: u64,
        future: LocalBoxFuture<'static, anyhow::Result<T>>,
    ) -> Self
    where
        T: Serialize + 'static,
    {
        let future = async move {
            match future.await {
                Ok(value) => serde_json::to_value(value).map_err(|e| e.to_string()),
                Err(error) => Err(format!("{error:#}")),
            }
        }
        .boxed_local();
        Self {
            id,
            generation,
            future,
        }
    }

    pub fn id(&self) -> &HookId {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run the work to completion
    pub async fn settle(self) -> SettledHook {
        let result = self.future.await;
        SettledHook {
            id: self.id,
            generation: self.generation,
            result,
        }
    }
}

impl std::fmt::Debug for PendingHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHook")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}
