//! Effect emitter
//!
//! Components and action callbacks request one-shot side effects (toasts,
//! forms, navigation, web view messages) that the host performs after the
//! response is delivered. Effects are buffered per pass, deduplicated by key
//! with last-write-wins, and flushed only when the pass completes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ProtocolError;
use crate::types::ActionId;

/// Effect kinds understood by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    ShowToast,
    ShowForm,
    NavigateToUrl,
    WebViewPostMessage,
    WebViewFullscreen,
    RealtimeSubscriptions,
    Interval,
}

/// A buffered side-effect request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Dedup key; not part of the wire shape
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub payload: Value,
}

#[derive(Debug, Default)]
struct EffectBuffer {
    active: bool,
    effects: Vec<Effect>,
    index: HashMap<String, usize>,
    sequence: u64,
}

/// Handle to the effect buffer of the active pass or callback
#[derive(Debug, Clone, Default)]
pub struct EffectEmitter {
    inner: Rc<RefCell<EffectBuffer>>,
}

impl EffectEmitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start a buffer pre-filled with effects from an earlier phase
    pub(crate) fn seeded(effects: Vec<Effect>) -> Self {
        let emitter = Self::new();
        {
            let mut buffer = emitter.inner.borrow_mut();
            for effect in effects {
                let position = buffer.effects.len();
                buffer.index.insert(effect.key.clone(), position);
                buffer.effects.push(effect);
            }
        }
        emitter
    }

    pub(crate) fn open(&self) {
        self.inner.borrow_mut().active = true;
    }

    pub(crate) fn close(&self) {
        self.inner.borrow_mut().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    /// Drop everything buffered so far
    pub(crate) fn discard(&self) {
        let mut buffer = self.inner.borrow_mut();
        if !buffer.effects.is_empty() {
            debug!(count = buffer.effects.len(), "Discarding buffered effects");
        }
        buffer.effects.clear();
        buffer.index.clear();
    }

    /// Hand the buffered effects over in emission order
    pub(crate) fn flush(&self) -> Vec<Effect> {
        let mut buffer = self.inner.borrow_mut();
        buffer.index.clear();
        std::mem::take(&mut buffer.effects)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer an effect under `key`.
    ///
    /// Re-emitting an existing key replaces the buffered payload in place.
    pub fn emit(
        &self,
        key: impl Into<String>,
        kind: EffectKind,
        payload: Value,
    ) -> Result<(), ProtocolError> {
        let key = key.into();
        let mut buffer = self.inner.borrow_mut();
        if !buffer.active {
            return Err(ProtocolError::EffectOutsidePass(key));
        }
        let effect = Effect {
            key: key.clone(),
            kind,
            payload,
        };
        match buffer.index.get(&key).copied() {
            Some(position) => {
                debug!(key = %key, "Replacing buffered effect");
                buffer.effects[position] = effect;
            }
            None => {
                let position = buffer.effects.len();
                buffer.index.insert(key, position);
                buffer.effects.push(effect);
            }
        }
        Ok(())
    }

    pub fn show_toast(&self, text: impl Into<String>) -> Result<(), ProtocolError> {
        self.emit("toast", EffectKind::ShowToast, json!({ "text": text.into() }))
    }

    pub fn navigate_to(&self, url: impl Into<String>) -> Result<(), ProtocolError> {
        self.emit("navigate", EffectKind::NavigateToUrl, json!({ "url": url.into() }))
    }

    pub fn show_form(
        &self,
        form_id: &str,
        definition: Value,
        submit: &ActionId,
    ) -> Result<(), ProtocolError> {
        self.emit(
            format!("form.{form_id}"),
            EffectKind::ShowForm,
            json!({ "form_id": form_id, "definition": definition, "submit_action": submit }),
        )
    }

    /// Messages are never collapsed: each gets its own key.
    pub fn post_web_view_message(
        &self,
        web_view_id: &str,
        message: Value,
    ) -> Result<(), ProtocolError> {
        let sequence = {
            let mut buffer = self.inner.borrow_mut();
            buffer.sequence += 1;
            buffer.sequence
        };
        self.emit(
            format!("web_view.{web_view_id}.message.{sequence}"),
            EffectKind::WebViewPostMessage,
            json!({ "web_view_id": web_view_id, "message": message }),
        )
    }

    pub fn set_web_view_fullscreen(
        &self,
        web_view_id: &str,
        fullscreen: bool,
    ) -> Result<(), ProtocolError> {
        self.emit(
            format!("web_view.{web_view_id}.fullscreen"),
            EffectKind::WebViewFullscreen,
            json!({ "web_view_id": web_view_id, "fullscreen": fullscreen }),
        )
    }
}
