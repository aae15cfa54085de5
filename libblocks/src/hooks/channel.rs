//! Realtime channel hook
//!
//! The subscription flag is persisted per hook. When a pass completes, every
//! subscribed channel is collected and the session announces the set to the
//! host whenever it differs from the previous announcement.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{CallSite, Hook, Init, PassCompletion};
use crate::actions::Callback;
use crate::error::{Halt, ProtocolError};
use crate::render::RenderContext;
use crate::state::{HookId, StateStore};
use crate::types::{ActionId, EventKind};

const NAMESPACE: &str = "channel";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ChannelState {
    subscribed: bool,
}

#[derive(Debug, Clone)]
pub struct Channel {
    id: HookId,
    name: String,
    message: ActionId,
    store: StateStore,
}

impl Channel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action the host fires for each message received on the channel
    pub fn message_action(&self) -> &ActionId {
        &self.message
    }

    pub fn is_subscribed(&self) -> bool {
        self.store
            .read(|state| state.value::<ChannelState>(&self.id))
            .is_some_and(|state| state.subscribed)
    }

    pub fn subscribe(&self) -> Result<(), ProtocolError> {
        self.write(true)
    }

    pub fn unsubscribe(&self) -> Result<(), ProtocolError> {
        self.write(false)
    }

    fn write(&self, subscribed: bool) -> Result<(), ProtocolError> {
        let value = serde_json::to_value(ChannelState { subscribed })
            .map_err(|e| ProtocolError::state_shape(&self.id, e))?;
        self.store.write(|state| {
            state
                .get_mut(&self.id)
                .ok_or_else(|| ProtocolError::state_shape(&self.id, "no channel record"))?
                .overwrite(&self.id, value)
        })
    }
}

impl Hook for Channel {
    fn id(&self) -> &HookId {
        &self.id
    }

    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn on_pass_complete(&self, completion: &mut PassCompletion<'_>) -> Result<(), ProtocolError> {
        let subscribed = completion
            .state
            .value::<ChannelState>(&self.id)
            .is_some_and(|state| state.subscribed);
        if subscribed {
            completion.subscriptions.insert(self.name.clone());
        }
        Ok(())
    }
}

/// Declare a realtime channel; starts unsubscribed
#[track_caller]
pub fn use_channel(
    cx: &mut RenderContext,
    name: impl Into<String>,
    on_message: Callback,
) -> Result<Channel, Halt> {
    let site = CallSite::here();
    let slot = cx
        .registry()
        .register(NAMESPACE, site, || Init::Ready(ChannelState::default()))?;
    let message = cx.bind_as(
        format!("{}.message", slot.id),
        EventKind::ChannelMessage,
        on_message,
    )?;
    let channel = Channel {
        id: slot.id,
        name: name.into(),
        message,
        store: cx.store().clone(),
    };
    cx.attach(Rc::new(channel.clone()));
    Ok(channel)
}
