//! Hook registry
//!
//! Issues positional hook ids, restores records from the render state, runs
//! initializers for hooks seen for the first time, and keeps track of async
//! work the host must drive before the pass can be resumed.
//!
//! # Identity
//!
//! Each component visit opens a frame with its path (`App/Counter@0.1`).
//! Inside a frame every namespace has its own occurrence counter, so the nth
//! `state` hook of a component is always `App/Counter@0.1#state.{n}`.
//! Counters start from zero on every visit and every pass.
//!
//! # Conditional hooks
//!
//! Records carry a fingerprint of the call site that created them. When a
//! hook lands on a record created by a different call site, a hook was added
//! or removed above it since the previous pass. Under `reset` the registry
//! stops trusting stored records for the rest of that component visit; under
//! `strict` the pass fails.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CallSite, Hook, Init, PendingHook, Slot, SlotValue};
use crate::config::ConditionalHookPolicy;
use crate::error::{Halt, HookError, ProtocolError};
use crate::state::{HookId, HookRecord, LoadState, RenderState, StateStore};

struct Frame {
    path: String,
    occurrences: HashMap<&'static str, usize>,
    diverged: bool,
}

/// A freshly issued id and whatever the previous pass stored under it
struct Claim {
    id: HookId,
    namespace: &'static str,
    site: String,
    prior: Option<HookRecord>,
}

pub struct HookRegistry {
    store: StateStore,
    policy: ConditionalHookPolicy,
    frames: Vec<Frame>,
    registered: HashSet<HookId>,
    visited: BTreeSet<String>,
    pending: Vec<PendingHook>,
    outstanding: Vec<HookId>,
    lifecycle: Vec<Rc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new(store: StateStore, policy: ConditionalHookPolicy) -> Self {
        Self {
            store,
            policy,
            frames: Vec::new(),
            registered: HashSet::new(),
            visited: BTreeSet::new(),
            pending: Vec::new(),
            outstanding: Vec::new(),
            lifecycle: Vec::new(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Open a frame for a component visit
    pub(crate) fn enter(&mut self, segment: &str) {
        let path = match self.frames.last() {
            Some(parent) => format!("{}/{}", parent.path, segment),
            None => segment.to_string(),
        };
        self.visited.insert(path.clone());
        self.frames.push(Frame {
            path,
            occurrences: HashMap::new(),
            diverged: false,
        });
    }

    pub(crate) fn exit(&mut self) {
        self.frames.pop();
    }

    pub fn current_path(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.path.as_str())
    }

    /// Hooks that are loading, in the order they were met
    pub fn outstanding(&self) -> &[HookId] {
        &self.outstanding
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingHook> {
        std::mem::take(&mut self.pending)
    }

    /// Register a hook for the pass-completion callback
    pub(crate) fn attach(&mut self, hook: Rc<dyn Hook>) {
        self.lifecycle.push(hook);
    }

    pub(crate) fn lifecycle(&self) -> &[Rc<dyn Hook>] {
        &self.lifecycle
    }

    /// Whether the hook was registered during this pass
    pub(crate) fn is_registered(&self, id: &HookId) -> bool {
        self.registered.contains(id)
    }

    /// Register a hook whose value must be available before the component
    /// continues. An unsettled initializer interrupts the pass.
    pub fn register<T, I>(
        &mut self,
        namespace: &'static str,
        site: CallSite,
        init: I,
    ) -> Result<Slot<T>, Halt>
    where
        T: Serialize + DeserializeOwned + 'static,
        I: FnOnce() -> Init<T>,
    {
        let claim = self.claim(namespace, site)?;
        match claim.prior.as_ref().map(|record| record.load_state) {
            Some(LoadState::Loaded) | Some(LoadState::Error) => self.restore(claim),
            Some(LoadState::Loading) => {
                debug!(hook = %claim.id, "Hook still loading, interrupting pass");
                self.outstanding.push(claim.id.clone());
                Err(Halt::Interrupted(claim.id))
            }
            Some(LoadState::Initial) | None => {
                let slot = self.initialize(claim, None, init)?;
                match slot.value {
                    SlotValue::Loading => Err(Halt::Interrupted(slot.id)),
                    _ => Ok(slot),
                }
            }
        }
    }

    /// Register a hook whose async initializer runs in the background. The
    /// pass continues with a loading slot. A change of `deps` discards the
    /// stored record and runs the initializer again.
    pub fn register_deferred<T, I>(
        &mut self,
        namespace: &'static str,
        site: CallSite,
        deps: Option<Value>,
        init: I,
    ) -> Result<Slot<T>, Halt>
    where
        T: Serialize + DeserializeOwned + 'static,
        I: FnOnce() -> Init<T>,
    {
        let mut claim = self.claim(namespace, site)?;
        if let Some(record) = &claim.prior {
            if record.deps != deps {
                debug!(hook = %claim.id, "Dependencies changed, reloading");
                claim.prior = None;
            }
        }
        match claim.prior.as_ref().map(|record| record.load_state) {
            Some(LoadState::Loaded) | Some(LoadState::Error) => self.restore(claim),
            Some(LoadState::Loading) => {
                self.outstanding.push(claim.id.clone());
                Ok(Slot {
                    id: claim.id,
                    value: SlotValue::Loading,
                })
            }
            Some(LoadState::Initial) | None => self.initialize(claim, deps, init),
        }
    }

    fn claim(&mut self, namespace: &'static str, site: CallSite) -> Result<Claim, Halt> {
        let policy = self.policy;
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| ProtocolError::HookOutsideComponent(namespace.to_string()))?;
        let occurrence = frame.occurrences.entry(namespace).or_insert(0);
        let id = HookId::new(&frame.path, namespace, *occurrence);
        *occurrence += 1;

        if !self.registered.insert(id.clone()) {
            return Err(ProtocolError::DuplicateHook(id.to_string()).into());
        }

        let site = site.fingerprint();
        let mut prior = self.store.read(|state| state.get(&id).cloned());
        if frame.diverged {
            prior = None;
        } else if let Some(record) = &prior {
            if !record.site.is_empty() && record.site != site {
                match policy {
                    ConditionalHookPolicy::Strict => {
                        return Err(ProtocolError::HookOrderChanged(id.to_string()).into());
                    }
                    ConditionalHookPolicy::Reset => {
                        warn!(
                            hook = %id,
                            "Hook order changed since the previous pass; later hooks in this component start fresh"
                        );
                        frame.diverged = true;
                        prior = None;
                    }
                }
            }
        }

        if let Some(record) = &prior {
            if record.namespace != namespace {
                return Err(ProtocolError::state_shape(
                    &id,
                    format!("stored namespace '{}' is not '{}'", record.namespace, namespace),
                )
                .into());
            }
        }

        Ok(Claim {
            id,
            namespace,
            site,
            prior,
        })
    }

    fn restore<T>(&mut self, claim: Claim) -> Result<Slot<T>, Halt>
    where
        T: DeserializeOwned,
    {
        let Claim { id, prior, .. } = claim;
        let Some(record) = prior else {
            return Err(ProtocolError::state_shape(&id, "no record to restore").into());
        };
        debug!(hook = %id, state = %record.load_state, "Restoring hook");
        let value = match record.load_state {
            LoadState::Error => SlotValue::Failed(HookError {
                id: id.clone(),
                reason: record.error.clone().unwrap_or_default(),
            }),
            _ => SlotValue::Ready(record.decode(&id)?),
        };
        Ok(Slot { id, value })
    }

    fn initialize<T, I>(
        &mut self,
        claim: Claim,
        deps: Option<Value>,
        init: I,
    ) -> Result<Slot<T>, Halt>
    where
        T: Serialize + DeserializeOwned + 'static,
        I: FnOnce() -> Init<T>,
    {
        let Claim {
            id,
            namespace,
            site,
            ..
        } = claim;
        let generation = self
            .store
            .read(|state| state.get(&id).map(|stale| stale.generation.wrapping_add(1)))
            .unwrap_or(0);
        let mut record = HookRecord::new(namespace, site);
        record.deps = deps;
        record.generation = generation;
        debug!(hook = %id, generation, "Initializing hook");

        let value = match init() {
            Init::Ready(value) => {
                let encoded =
                    serde_json::to_value(&value).map_err(|e| ProtocolError::state_shape(&id, e))?;
                record.resolve(&id, encoded)?;
                SlotValue::Ready(value)
            }
            Init::Failed(reason) => {
                record.reject(&id, reason.clone())?;
                SlotValue::Failed(HookError {
                    id: id.clone(),
                    reason,
                })
            }
            Init::Pending(future) => {
                record.transition(&id, LoadState::Loading)?;
                self.pending.push(PendingHook::new(id.clone(), generation, future));
                self.outstanding.push(id.clone());
                SlotValue::Loading
            }
        };
        self.store.write(|state| state.insert(id.clone(), record));
        Ok(Slot { id, value })
    }

    /// Drop records of hooks that vanished from components rendered this pass
    pub(crate) fn prune(&self, state: &mut RenderState) -> usize {
        let removed = state.prune(|id, _| {
            !self.visited.contains(id.path()) || self.registered.contains(id)
        });
        if removed > 0 {
            debug!(removed, "Pruned hook records no longer registered");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(state: RenderState) -> HookRegistry {
        HookRegistry::new(StateStore::new(state), ConditionalHookPolicy::Reset)
    }

    fn ready<T>(value: T) -> impl FnOnce() -> Init<T> {
        move || Init::Ready(value)
    }

    #[test]
    fn test_ids_follow_path_namespace_and_occurrence() {
        let mut registry = registry(RenderState::new());
        registry.enter("App");
        let a: Slot<i32> = registry.register("state", CallSite::here(), ready(1)).unwrap();
        let b: Slot<i32> = registry.register("state", CallSite::here(), ready(2)).unwrap();
        let c: Slot<i32> = registry.register("form", CallSite::here(), ready(3)).unwrap();
        registry.enter("Child@0");
        let d: Slot<i32> = registry.register("state", CallSite::here(), ready(4)).unwrap();

        assert_eq!(a.id.as_str(), "App#state.0");
        assert_eq!(b.id.as_str(), "App#state.1");
        assert_eq!(c.id.as_str(), "App#form.0");
        assert_eq!(d.id.as_str(), "App/Child@0#state.0");
    }

    #[test]
    fn test_hook_outside_component_is_protocol_error() {
        let mut registry = registry(RenderState::new());
        let result: Result<Slot<i32>, Halt> = registry.register("state", CallSite::here(), ready(1));
        assert!(matches!(
            result,
            Err(Halt::Failed(crate::error::RenderError::Protocol(
                ProtocolError::HookOutsideComponent(_)
            )))
        ));
    }

    #[test]
    fn test_restored_value_skips_initializer() {
        let site = CallSite::here();
        let mut first = registry(RenderState::new());
        first.enter("App");
        let _: Slot<i32> = first.register("state", site, ready(5)).unwrap();
        let state = first.store().snapshot();

        let mut second = registry(state);
        second.enter("App");
        let slot: Slot<i32> = second
            .register("state", site, || -> Init<i32> { panic!("initializer must not run") })
            .unwrap();
        assert_eq!(slot.value, SlotValue::Ready(5));
    }

    #[test]
    fn test_pending_initializer_interrupts() {
        let mut registry = registry(RenderState::new());
        registry.enter("App");
        let result: Result<Slot<i32>, Halt> =
            registry.register("state", CallSite::here(), || Init::pending(async { Ok(1) }));

        match result {
            Err(Halt::Interrupted(id)) => assert_eq!(id.as_str(), "App#state.0"),
            other => panic!("Expected interrupt, got {:?}", other.map(|s| s.id)),
        }
        assert_eq!(registry.outstanding().len(), 1);
        assert_eq!(registry.take_pending().len(), 1);
        let state = registry.store().snapshot();
        assert_eq!(
            state.get(&HookId::from("App#state.0")).map(|r| r.load_state),
            Some(LoadState::Loading)
        );
    }

    #[test]
    fn test_failed_initializer_is_stored_as_error() {
        let mut registry = registry(RenderState::new());
        registry.enter("App");
        let slot: Slot<i32> = registry
            .register("state", CallSite::here(), || Init::failed("no backend"))
            .unwrap();
        match slot.value {
            SlotValue::Failed(error) => assert_eq!(error.reason, "no backend"),
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_registration_in_one_pass() {
        let mut registry = registry(RenderState::new());
        registry.enter("App/Row[a]");
        let _: Slot<i32> = registry.register("state", CallSite::here(), ready(1)).unwrap();
        registry.exit();
        registry.enter("App/Row[a]");
        let result: Result<Slot<i32>, Halt> = registry.register("state", CallSite::here(), ready(1));
        assert!(matches!(
            result,
            Err(Halt::Failed(crate::error::RenderError::Protocol(
                ProtocolError::DuplicateHook(_)
            )))
        ));
    }

    #[test]
    fn test_shape_mismatch_on_restore() {
        let site = CallSite::here();
        let mut first = registry(RenderState::new());
        first.enter("App");
        let _: Slot<String> = first.register("state", site, ready("text".to_string())).unwrap();

        let mut second = registry(first.store().snapshot());
        second.enter("App");
        let result: Result<Slot<i64>, Halt> = second.register("state", site, ready(0));
        assert!(matches!(
            result,
            Err(Halt::Failed(crate::error::RenderError::Protocol(
                ProtocolError::StateShape { .. }
            )))
        ));
    }

    #[test]
    fn test_deferred_reloads_when_deps_change() {
        let site = CallSite::here();
        let mut first = registry(RenderState::new());
        first.enter("App");
        let _: Slot<i32> = first
            .register_deferred("async", site, Some(json!("a")), ready(1))
            .unwrap();

        let mut second = registry(first.store().snapshot());
        second.enter("App");
        let slot: Slot<i32> = second
            .register_deferred("async", site, Some(json!("b")), ready(2))
            .unwrap();
        assert_eq!(slot.value, SlotValue::Ready(2));
        let record = second.store().snapshot().get(&slot.id).cloned().unwrap();
        assert_eq!(record.generation, 1);
    }

    #[test]
    fn test_prune_only_touches_visited_paths() {
        let mut state = RenderState::new();
        state.insert(HookId::from("App#state.3"), HookRecord::new("state", ""));
        state.insert(HookId::from("Other#state.0"), HookRecord::new("state", ""));

        let mut registry = registry(state);
        registry.enter("App");
        let _: Slot<i32> = registry.register("state", CallSite::here(), ready(1)).unwrap();

        let mut state = registry.store().snapshot();
        assert_eq!(registry.prune(&mut state), 1);
        assert!(state.get(&HookId::from("App#state.0")).is_some());
        assert!(state.get(&HookId::from("Other#state.0")).is_some());
    }
}
