//! Per-pass render context
//!
//! Every component receives `&mut RenderContext`. It carries the hook
//! registry, the action table and the effect emitter of the active pass,
//! plus the element trail used to name child component positions.

use std::collections::BTreeSet;
use std::rc::Rc;

use serde_json::json;
use tracing::trace;

use crate::actions::{ActionTable, Callback};
use crate::effects::{EffectEmitter, EffectKind};
use crate::error::ProtocolError;
use crate::hooks::{interval, Hook, HookRegistry, PassCompletion};
use crate::state::StateStore;
use crate::types::{ActionId, EventKind};

pub struct RenderContext {
    registry: HookRegistry,
    actions: ActionTable,
    effects: EffectEmitter,
    trail: Vec<usize>,
}

impl RenderContext {
    pub(crate) fn new(registry: HookRegistry, effects: EffectEmitter) -> Self {
        Self {
            registry,
            actions: ActionTable::new(),
            effects,
            trail: Vec::new(),
        }
    }

    /// Effect emitter of the active pass
    pub fn effects(&self) -> &EffectEmitter {
        &self.effects
    }

    pub fn store(&self) -> &StateStore {
        self.registry.store()
    }

    /// Path of the component currently rendering, e.g. `App/Counter@0.1`
    pub fn path(&self) -> &str {
        self.registry.current_path().unwrap_or_default()
    }

    /// Bind a callback under a positional id derived from the component path
    pub fn bind(&mut self, event: EventKind, callback: Callback) -> Result<ActionId, ProtocolError> {
        let path = self.path().to_string();
        self.actions.bind_at(&path, event, callback)
    }

    /// Bind a callback under an explicit id
    pub fn bind_as(
        &mut self,
        id: impl Into<ActionId>,
        event: EventKind,
        callback: Callback,
    ) -> Result<ActionId, ProtocolError> {
        self.actions.bind(id.into(), event, callback)
    }

    pub fn registry(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }

    pub(crate) fn attach(&mut self, hook: Rc<dyn Hook>) {
        self.registry.attach(hook);
    }

    /// Path segment for a child component at the current trail position
    pub(crate) fn segment_for(&self, name: &str, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("{name}[{key}]"),
            None if self.trail.is_empty() => name.to_string(),
            None => {
                let trail: Vec<String> = self.trail.iter().map(usize::to_string).collect();
                format!("{name}@{}", trail.join("."))
            }
        }
    }

    /// Open a component frame; returns the parent's trail for `leave`
    pub(crate) fn enter(&mut self, segment: &str) -> Vec<usize> {
        self.registry.enter(segment);
        std::mem::take(&mut self.trail)
    }

    pub(crate) fn leave(&mut self, trail: Vec<usize>) {
        self.registry.exit();
        self.trail = trail;
    }

    pub(crate) fn push_trail(&mut self, index: usize) {
        self.trail.push(index);
    }

    pub(crate) fn pop_trail(&mut self) {
        self.trail.pop();
    }

    /// Run lifecycle callbacks, prune vanished hooks and announce
    /// subscription changes. Only called for passes that finished building.
    pub(crate) fn commit(&mut self) -> Result<(), ProtocolError> {
        let store = self.registry.store().clone();
        let registry = &self.registry;
        let effects = &self.effects;

        store.write(|state| -> Result<(), ProtocolError> {
            let mut subscriptions = BTreeSet::new();
            {
                let mut completion = PassCompletion {
                    state: &mut *state,
                    effects,
                    subscriptions: &mut subscriptions,
                };
                for hook in registry.lifecycle() {
                    trace!(hook = %hook.id(), namespace = hook.namespace(), "Completing hook");
                    hook.on_pass_complete(&mut completion)?;
                }
            }

            interval::stop_detached(state, effects, registry)?;
            registry.prune(state);

            if subscriptions != state.subscriptions {
                effects.emit(
                    "realtime",
                    EffectKind::RealtimeSubscriptions,
                    json!({ "channels": subscriptions }),
                )?;
                state.subscriptions = subscriptions;
            }
            Ok(())
        })
    }

    pub(crate) fn into_parts(self) -> (HookRegistry, ActionTable) {
        (self.registry, self.actions)
    }
}
