//! Web view hook

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CallSite, Init};
use crate::actions::Callback;
use crate::effects::EffectEmitter;
use crate::error::{Halt, ProtocolError};
use crate::render::RenderContext;
use crate::state::HookId;
use crate::types::{ActionId, EventKind};

const NAMESPACE: &str = "web_view";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WebViewState {
    url: String,
}

#[derive(Debug, Clone)]
pub struct WebView {
    id: HookId,
    url: String,
    message: ActionId,
}

impl WebView {
    pub fn web_view_id(&self) -> &str {
        self.id.as_str()
    }

    /// URL the web view was first declared with
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Action fired with each message the web view posts back
    pub fn message_action(&self) -> &ActionId {
        &self.message
    }

    pub fn post_message(&self, effects: &EffectEmitter, message: Value) -> Result<(), ProtocolError> {
        effects.post_web_view_message(self.web_view_id(), message)
    }

    pub fn set_fullscreen(
        &self,
        effects: &EffectEmitter,
        fullscreen: bool,
    ) -> Result<(), ProtocolError> {
        effects.set_web_view_fullscreen(self.web_view_id(), fullscreen)
    }
}

#[track_caller]
pub fn use_web_view(
    cx: &mut RenderContext,
    url: impl Into<String>,
    on_message: Callback,
) -> Result<WebView, Halt> {
    let site = CallSite::here();
    let url = url.into();
    let slot = cx.registry().register(NAMESPACE, site, || {
        Init::Ready(WebViewState { url: url.clone() })
    })?;
    let state = slot.value.into_result(&slot.id)?;
    let message = cx.bind_as(
        format!("{}.message", slot.id),
        EventKind::WebViewMessage,
        on_message,
    )?;
    Ok(WebView {
        id: slot.id,
        url: state.url,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConditionalHookPolicy;
    use crate::effects::EffectKind;
    use crate::hooks::HookRegistry;
    use crate::state::{RenderState, StateStore};
    use serde_json::json;

    #[test]
    fn test_web_view_effects() {
        let emitter = EffectEmitter::new();
        emitter.open();
        let mut cx = RenderContext::new(
            HookRegistry::new(
                StateStore::new(RenderState::new()),
                ConditionalHookPolicy::Reset,
            ),
            emitter.clone(),
        );
        cx.enter("Game");

        let view = use_web_view(&mut cx, "page.html", Callback::new(|_| Ok(()))).unwrap();
        assert_eq!(view.url(), "page.html");
        assert_eq!(view.message_action().as_str(), "Game#web_view.0.message");

        view.post_message(cx.effects(), json!({ "score": 3 })).unwrap();
        view.set_fullscreen(cx.effects(), true).unwrap();
        let effects = emitter.flush();
        assert_eq!(effects[0].kind, EffectKind::WebViewPostMessage);
        assert_eq!(effects[0].payload["web_view_id"], "Game#web_view.0");
        assert_eq!(effects[1].kind, EffectKind::WebViewFullscreen);
    }
}
