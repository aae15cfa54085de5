//! Persisted hook state
//!
//! `RenderState` is the only data that outlives a single invocation. The host
//! stores it between requests and hands it back as `prior_render_state`; the
//! reconciler owns it for the duration of one pass.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Current schema version of serialized render state
pub const RENDER_STATE_VERSION: u32 = 1;

/// Positional hook identity: `"{component path}#{namespace}.{occurrence}"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookId(String);

impl HookId {
    pub fn new(path: &str, namespace: &str, occurrence: usize) -> Self {
        Self(format!("{path}#{namespace}.{occurrence}"))
    }

    /// Component path that owns this hook
    pub fn path(&self) -> &str {
        self.0.rsplit_once('#').map(|(path, _)| path).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Initial,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    /// Forward transitions only; going back to `Initial` is `HookRecord::reset`.
    pub fn can_transition_to(self, next: LoadState) -> bool {
        matches!(
            (self, next),
            (LoadState::Initial, LoadState::Loading)
                | (LoadState::Initial, LoadState::Loaded)
                | (LoadState::Initial, LoadState::Error)
                | (LoadState::Loading, LoadState::Loaded)
                | (LoadState::Loading, LoadState::Error)
        )
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Initial => write!(f, "initial"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Loaded => write!(f, "loaded"),
            LoadState::Error => write!(f, "error"),
        }
    }
}

/// Serialized state of one hook instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRecord {
    pub namespace: String,
    /// Fingerprint of the registering call site
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub load_state: LoadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Dependency key of async data hooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Value>,
    /// Bumped each time the initializer runs again for the same id
    #[serde(default, skip_serializing_if = "is_zero")]
    pub generation: u64,
}

fn is_zero(generation: &u64) -> bool {
    *generation == 0
}

impl HookRecord {
    pub fn new(namespace: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            site: site.into(),
            load_state: LoadState::Initial,
            value: None,
            error: None,
            deps: None,
            generation: 0,
        }
    }

    pub fn transition(&mut self, id: &HookId, next: LoadState) -> Result<(), ProtocolError> {
        if !self.load_state.can_transition_to(next) {
            return Err(ProtocolError::InvalidTransition {
                id: id.to_string(),
                from: self.load_state,
                to: next,
            });
        }
        self.load_state = next;
        Ok(())
    }

    pub fn resolve(&mut self, id: &HookId, value: Value) -> Result<(), ProtocolError> {
        self.transition(id, LoadState::Loaded)?;
        self.value = Some(value);
        self.error = None;
        Ok(())
    }

    pub fn reject(&mut self, id: &HookId, reason: impl Into<String>) -> Result<(), ProtocolError> {
        self.transition(id, LoadState::Error)?;
        self.value = None;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Explicit external reset back to `Initial`
    pub fn reset(&mut self) {
        self.load_state = LoadState::Initial;
        self.value = None;
        self.error = None;
    }

    /// Setter write: reset, then resolve with the new value
    pub fn overwrite(&mut self, id: &HookId, value: Value) -> Result<(), ProtocolError> {
        self.reset();
        self.resolve(id, value)
    }

    pub fn decode<T: DeserializeOwned>(&self, id: &HookId) -> Result<T, ProtocolError> {
        let value = self
            .value
            .clone()
            .ok_or_else(|| ProtocolError::state_shape(id, "record has no value"))?;
        serde_json::from_value(value).map_err(|e| ProtocolError::state_shape(id, e))
    }
}

/// Result of a pending hook's asynchronous work
#[derive(Debug, Clone, PartialEq)]
pub struct SettledHook {
    pub id: HookId,
    /// Generation of the record the work was started for
    pub generation: u64,
    pub result: Result<Value, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub hooks: BTreeMap<HookId, HookRecord>,
    /// Realtime channels announced to the host by the last complete pass
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub subscriptions: BTreeSet<String>,
}

fn current_version() -> u32 {
    RENDER_STATE_VERSION
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            version: RENDER_STATE_VERSION,
            hooks: BTreeMap::new(),
            subscriptions: BTreeSet::new(),
        }
    }
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_version(&self) -> Result<(), ProtocolError> {
        if self.version != RENDER_STATE_VERSION {
            return Err(ProtocolError::StateVersion {
                found: self.version,
                expected: RENDER_STATE_VERSION,
            });
        }
        Ok(())
    }

    pub fn get(&self, id: &HookId) -> Option<&HookRecord> {
        self.hooks.get(id)
    }

    pub fn get_mut(&mut self, id: &HookId) -> Option<&mut HookRecord> {
        self.hooks.get_mut(id)
    }

    pub fn insert(&mut self, id: HookId, record: HookRecord) {
        self.hooks.insert(id, record);
    }

    pub fn remove(&mut self, id: &HookId) -> Option<HookRecord> {
        self.hooks.remove(id)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Decode the value of a loaded hook, if present
    pub fn value<T: DeserializeOwned>(&self, id: &HookId) -> Option<T> {
        self.hooks.get(id).and_then(|record| record.decode(id).ok())
    }

    /// Record the outcome of a pending hook's work.
    ///
    /// Returns `Ok(false)` without touching the record when the work belongs
    /// to an earlier generation of it.
    pub fn settle(&mut self, settled: SettledHook) -> Result<bool, ProtocolError> {
        let record = self
            .hooks
            .get_mut(&settled.id)
            .ok_or_else(|| ProtocolError::state_shape(&settled.id, "no pending record"))?;
        if record.generation != settled.generation {
            return Ok(false);
        }
        match settled.result {
            Ok(value) => record.resolve(&settled.id, value)?,
            Err(reason) => record.reject(&settled.id, reason)?,
        }
        Ok(true)
    }

    /// Drop every record for which `keep` returns false; returns how many went
    pub fn prune<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&HookId, &HookRecord) -> bool,
    {
        let before = self.hooks.len();
        self.hooks.retain(|id, record| keep(id, record));
        before - self.hooks.len()
    }
}

/// Shared handle to the render state of the active pass.
///
/// Setters captured by action callbacks hold a clone and write straight
/// into it while the dispatcher runs the callback.
#[derive(Debug, Clone, Default)]
pub struct StateStore(Rc<RefCell<RenderState>>);

impl StateStore {
    pub fn new(state: RenderState) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    pub fn read<R>(&self, f: impl FnOnce(&RenderState) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut RenderState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn snapshot(&self) -> RenderState {
        self.0.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id() -> HookId {
        HookId::new("App/Counter@0", "state", 0)
    }

    #[test]
    fn test_hook_id_layout() {
        let id = id();
        assert_eq!(id.as_str(), "App/Counter@0#state.0");
        assert_eq!(id.path(), "App/Counter@0");
    }

    #[test]
    fn test_hook_id_path_with_keyed_segment() {
        let id = HookId::new("App/Row[a#b]", "async", 2);
        assert_eq!(id.path(), "App/Row[a#b]");
    }

    #[test]
    fn test_load_state_forward_transitions() {
        assert!(LoadState::Initial.can_transition_to(LoadState::Loading));
        assert!(LoadState::Loading.can_transition_to(LoadState::Loaded));
        assert!(LoadState::Loading.can_transition_to(LoadState::Error));
        assert!(LoadState::Initial.can_transition_to(LoadState::Loaded));
    }

    #[test]
    fn test_load_state_rejects_backwards_transitions() {
        assert!(!LoadState::Loaded.can_transition_to(LoadState::Loading));
        assert!(!LoadState::Error.can_transition_to(LoadState::Loaded));
        assert!(!LoadState::Loaded.can_transition_to(LoadState::Initial));
        assert!(!LoadState::Loading.can_transition_to(LoadState::Loading));
    }

    #[test]
    fn test_record_resolve_and_reject() {
        let id = id();
        let mut record = HookRecord::new("state", "abc");
        record.transition(&id, LoadState::Loading).unwrap();
        record.resolve(&id, json!(42)).unwrap();
        assert_eq!(record.load_state, LoadState::Loaded);
        assert_eq!(record.decode::<i64>(&id).unwrap(), 42);

        let err = record.reject(&id, "late failure").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidTransition { .. }));
    }

    #[test]
    fn test_overwrite_goes_through_reset() {
        let id = id();
        let mut record = HookRecord::new("state", "abc");
        record.reject(&id, "boom").unwrap();
        record.overwrite(&id, json!("fresh")).unwrap();
        assert_eq!(record.load_state, LoadState::Loaded);
        assert!(record.error.is_none());
        assert_eq!(record.decode::<String>(&id).unwrap(), "fresh");
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let id = id();
        let mut record = HookRecord::new("state", "abc");
        record.resolve(&id, json!("not a number")).unwrap();
        assert!(matches!(
            record.decode::<i64>(&id),
            Err(ProtocolError::StateShape { .. })
        ));
    }

    #[test]
    fn test_settle_pending_record() {
        let id = id();
        let mut state = RenderState::new();
        let mut record = HookRecord::new("state", "abc");
        record.transition(&id, LoadState::Loading).unwrap();
        state.insert(id.clone(), record);

        let applied = state
            .settle(SettledHook {
                id: id.clone(),
                generation: 0,
                result: Ok(json!(7)),
            })
            .unwrap();
        assert!(applied);
        assert_eq!(state.value::<i64>(&id), Some(7));
    }

    #[test]
    fn test_settle_ignores_earlier_generation() {
        let id = id();
        let mut state = RenderState::new();
        let mut record = HookRecord::new("async", "abc");
        record.generation = 1;
        record.transition(&id, LoadState::Loading).unwrap();
        state.insert(id.clone(), record);

        let stale = SettledHook {
            id: id.clone(),
            generation: 0,
            result: Ok(json!("old")),
        };
        assert_eq!(state.settle(stale), Ok(false));
        assert_eq!(state.get(&id).unwrap().load_state, LoadState::Loading);

        let current = SettledHook {
            id: id.clone(),
            generation: 1,
            result: Ok(json!("new")),
        };
        assert_eq!(state.settle(current), Ok(true));
        assert_eq!(state.value::<String>(&id), Some("new".to_string()));
    }

    #[test]
    fn test_generation_omitted_until_bumped() {
        let record = HookRecord::new("async", "abc");
        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("generation").is_none());
        let decoded: HookRecord = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.generation, 0);
    }

    #[test]
    fn test_settle_unknown_record_is_shape_error() {
        let mut state = RenderState::new();
        let result = state.settle(SettledHook {
            id: id(),
            generation: 0,
            result: Err("nope".to_string()),
        });
        assert!(matches!(result, Err(ProtocolError::StateShape { .. })));
    }

    #[test]
    fn test_version_check() {
        let mut state = RenderState::new();
        assert!(state.check_version().is_ok());
        state.version = 99;
        assert_eq!(
            state.check_version(),
            Err(ProtocolError::StateVersion {
                found: 99,
                expected: RENDER_STATE_VERSION
            })
        );
    }

    #[test]
    fn test_state_deserializes_with_defaults() {
        let state: RenderState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.version, RENDER_STATE_VERSION);
        assert!(state.is_empty());
    }

    #[test]
    fn test_prune_reports_removed_count() {
        let mut state = RenderState::new();
        state.insert(HookId::from("A#state.0"), HookRecord::new("state", ""));
        state.insert(HookId::from("B#state.0"), HookRecord::new("state", ""));
        let removed = state.prune(|id, _| id.path() == "A");
        assert_eq!(removed, 1);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_store_shares_writes() {
        let store = StateStore::new(RenderState::new());
        let other = store.clone();
        other.write(|s| s.insert(HookId::from("A#state.0"), HookRecord::new("state", "")));
        assert_eq!(store.read(|s| s.len()), 1);
        assert_eq!(store.snapshot().len(), 1);
    }
}
