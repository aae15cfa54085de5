//! Form hook: a form definition plus the action its submission fires

use serde_json::Value;

use super::{CallSite, Init};
use crate::actions::Callback;
use crate::effects::EffectEmitter;
use crate::error::{Halt, ProtocolError};
use crate::render::RenderContext;
use crate::state::HookId;
use crate::types::{ActionId, EventKind};

const NAMESPACE: &str = "form";

#[derive(Debug, Clone)]
pub struct FormHandle {
    id: HookId,
    definition: Value,
    submit: ActionId,
}

impl FormHandle {
    pub fn id(&self) -> &HookId {
        &self.id
    }

    /// Form id the host reports back on submission
    pub fn form_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn definition(&self) -> &Value {
        &self.definition
    }

    pub fn submit_action(&self) -> &ActionId {
        &self.submit
    }

    /// Ask the host to show the form. Works during a pass or from a callback.
    pub fn show(&self, effects: &EffectEmitter) -> Result<(), ProtocolError> {
        effects.show_form(self.form_id(), self.definition.clone(), &self.submit)
    }
}

/// Declare a form. `on_submit` receives the submitted values as its payload.
#[track_caller]
pub fn use_form(
    cx: &mut RenderContext,
    definition: Value,
    on_submit: Callback,
) -> Result<FormHandle, Halt> {
    let site = CallSite::here();
    let slot = cx.registry().register(NAMESPACE, site, || Init::Ready(()))?;
    let submit = cx.bind_as(format!("{}.submit", slot.id), EventKind::FormSubmit, on_submit)?;
    Ok(FormHandle {
        id: slot.id,
        definition,
        submit,
    })
}
