//! Action bindings and the action dispatcher
//!
//! Every pass rebuilds the table mapping wire action ids to callbacks. The
//! table is never persisted: to handle a user action the dispatcher first
//! replays the prior render state to rediscover the bindings, runs the
//! callback to completion, and then renders again so the response reflects
//! everything the callback wrote.

use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::effects::EffectEmitter;
use crate::error::ProtocolError;
use crate::output::{self, RenderOutcome};
use crate::render::{PassOutcome, Reconciler};
use crate::state::StateStore;
use crate::types::{ActionDescriptor, ActionId, EventKind, RenderRequest};

pub type CallbackFuture = LocalBoxFuture<'static, anyhow::Result<()>>;

/// What a callback receives when its action fires
pub struct ActionEvent {
    pub action_id: ActionId,
    /// Form values or event payload supplied by the host
    pub payload: Value,
    /// Effects emitted here are delivered with the regenerated tree
    pub effects: EffectEmitter,
}

/// A callback bound to an action for one pass
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(ActionEvent) -> CallbackFuture>);

impl Callback {
    /// Wrap a synchronous callback
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ActionEvent) -> anyhow::Result<()> + 'static,
    {
        Self(Rc::new(move |event| {
            let result = f(event);
            async move { result }.boxed_local()
        }))
    }

    /// Wrap an asynchronous callback; the dispatcher awaits it fully
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(ActionEvent) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self(Rc::new(move |event| f(event).boxed_local()))
    }

    pub(crate) fn invoke(&self, event: ActionEvent) -> CallbackFuture {
        (self.0)(event)
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Callback")
    }
}

#[derive(Debug, Clone)]
pub struct ActionBinding {
    pub id: ActionId,
    pub event: EventKind,
    callback: Callback,
}

/// Bindings collected during one pass, in binding order
#[derive(Debug, Default)]
pub struct ActionTable {
    bindings: Vec<ActionBinding>,
    index: HashMap<ActionId, usize>,
    counters: HashMap<(String, EventKind), usize>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        id: ActionId,
        event: EventKind,
        callback: Callback,
    ) -> Result<ActionId, ProtocolError> {
        if self.index.contains_key(&id) {
            return Err(ProtocolError::DuplicateAction(id.to_string()));
        }
        self.index.insert(id.clone(), self.bindings.len());
        self.bindings.push(ActionBinding {
            id: id.clone(),
            event,
            callback,
        });
        Ok(id)
    }

    /// Bind under a positional id: `"{path}.{event}.{n}"`
    pub fn bind_at(
        &mut self,
        path: &str,
        event: EventKind,
        callback: Callback,
    ) -> Result<ActionId, ProtocolError> {
        let counter = self.counters.entry((path.to_string(), event)).or_insert(0);
        let id = ActionId::new(format!("{path}.{event}.{counter}"));
        *counter += 1;
        self.bind(id, event, callback)
    }

    pub fn get(&self, id: &ActionId) -> Option<&ActionBinding> {
        self.index.get(id).map(|&position| &self.bindings[position])
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.bindings
            .iter()
            .map(|binding| ActionDescriptor {
                id: binding.id.clone(),
                event_kind: binding.event,
            })
            .collect()
    }
}

/// Turns a user action into a fresh render pass
pub struct ActionDispatcher<'r> {
    reconciler: &'r Reconciler,
}

impl<'r> ActionDispatcher<'r> {
    pub fn new(reconciler: &'r Reconciler) -> Self {
        Self { reconciler }
    }

    /// Handle a validated `user_action` request
    pub async fn dispatch(&self, request: RenderRequest) -> RenderOutcome {
        let prior = request.prior_render_state.clone();
        let Some(action_id) = request.action_id.clone() else {
            return output::rejected(ProtocolError::MissingActionId, prior);
        };
        let store = StateStore::new(prior.clone());

        // Bindings only exist for the duration of a pass, so replay the
        // prior state to find the one this action refers to.
        let discovery = self.reconciler.discover(store.clone()).await;
        let mut previous = match discovery {
            PassOutcome::Complete(pass) => pass,
            other => {
                debug!(action = %action_id, "Discovery pass did not complete");
                let mut outcome = output::respond(other, &store, prior);
                if let Some(requeue) = outcome.response.requeue.as_mut() {
                    requeue.action_id = Some(action_id);
                }
                return outcome;
            }
        };

        let Some(binding) = previous.actions.get(&action_id).cloned() else {
            warn!(action = %action_id, "Unknown action");
            return output::rejected(ProtocolError::UnknownAction(action_id.to_string()), prior);
        };

        let callback_effects = EffectEmitter::new();
        callback_effects.open();
        let event = ActionEvent {
            action_id: action_id.clone(),
            payload: request.callback_payload(),
            effects: callback_effects.clone(),
        };
        info!(action = %action_id, event = %binding.event, "Running action callback");
        let result = binding.callback.invoke(event).await;
        callback_effects.close();

        if let Err(error) = result {
            warn!(action = %action_id, error = %format!("{error:#}"), "Action callback failed");
            callback_effects.discard();
            return output::callback_failure(previous, &store, action_id, &error);
        }

        let pending_from_discovery = std::mem::take(&mut previous.pending);
        let effects = EffectEmitter::seeded(callback_effects.flush());
        let regenerated = self.reconciler.run_pass(store.clone(), effects).await;
        let mut outcome = output::respond(regenerated, &store, prior);
        outcome.pending.extend(pending_from_discovery);
        outcome
    }
}
