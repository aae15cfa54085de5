//! Wire types exchanged with the host

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::effects::Effect;
use crate::error::{BlocksError, ProtocolError};
use crate::output::TreeNode;
use crate::state::{HookId, RenderState};

/// Why the host is invoking the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// First render of an instance (or a re-render with no event)
    Initial,
    /// A user triggered a bound action
    UserAction,
    /// Pending asynchronous hook work has settled
    AsyncResume,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Initial => write!(f, "initial"),
            RequestKind::UserAction => write!(f, "user_action"),
            RequestKind::AsyncResume => write!(f, "async_resume"),
        }
    }
}

/// Wire identifier of a bound action
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The kind of user event an action reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Press,
    FormSubmit,
    ChannelMessage,
    IntervalTick,
    WebViewMessage,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Press => "press",
            EventKind::FormSubmit => "form_submit",
            EventKind::ChannelMessage => "channel_message",
            EventKind::IntervalTick => "interval_tick",
            EventKind::WebViewMessage => "web_view_message",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component and element properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props(Map<String, Value>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A request delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub kind: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_values: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default)]
    pub prior_render_state: RenderState,
}

impl RenderRequest {
    pub fn initial(prior_render_state: RenderState) -> Self {
        Self {
            kind: RequestKind::Initial,
            action_id: None,
            form_values: None,
            payload: None,
            prior_render_state,
        }
    }

    pub fn user_action(action_id: impl Into<ActionId>, prior_render_state: RenderState) -> Self {
        Self {
            kind: RequestKind::UserAction,
            action_id: Some(action_id.into()),
            ..Self::initial(prior_render_state)
        }
    }

    pub fn async_resume(prior_render_state: RenderState) -> Self {
        Self {
            kind: RequestKind::AsyncResume,
            ..Self::initial(prior_render_state)
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_form_values(mut self, values: Value) -> Self {
        self.form_values = Some(values);
        self
    }

    /// Parse a request from its JSON encoding
    pub fn from_json(json: &str) -> Result<Self, BlocksError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the request is well formed before any pass runs
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.prior_render_state.check_version()?;
        match (self.kind, &self.action_id) {
            (RequestKind::UserAction, None) => Err(ProtocolError::MissingActionId),
            (RequestKind::UserAction, Some(_)) => Ok(()),
            (kind, Some(action_id)) => Err(ProtocolError::ActionNotAllowed {
                kind,
                action_id: action_id.to_string(),
            }),
            (_, None) => Ok(()),
        }
    }

    /// The value handed to the action callback
    pub(crate) fn callback_payload(&self) -> Value {
        self.form_values
            .clone()
            .or_else(|| self.payload.clone())
            .unwrap_or(Value::Null)
    }
}

/// Public description of a bound action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub id: ActionId,
    pub event_kind: EventKind,
}

/// Instruction to redeliver the request once pending work settles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requeue {
    pub pending: Vec<HookId>,
    /// The requested action has not run yet. Redeliver it as `user_action`
    /// (same id, payload and form values) instead of `async_resume`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
}

impl Requeue {
    pub fn new(pending: Vec<HookId>) -> Self {
        Self {
            pending,
            action_id: None,
        }
    }

    /// The request to deliver once the pending work has settled
    pub fn redelivery(&self, original: &RenderRequest, state: RenderState) -> RenderRequest {
        match &self.action_id {
            Some(action_id) => RenderRequest {
                kind: RequestKind::UserAction,
                action_id: Some(action_id.clone()),
                prior_render_state: state,
                ..original.clone()
            },
            None => RenderRequest::async_resume(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Protocol,
    Callback,
    Render,
    HookInitialization,
}

impl FailureKind {
    /// Exit code a command-line host should use for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Protocol => 3,
            _ => 1,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Protocol => write!(f, "protocol"),
            FailureKind::Callback => write!(f, "callback"),
            FailureKind::Render => write!(f, "render"),
            FailureKind::HookInitialization => write!(f, "hook_initialization"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
}

/// The reconciler's answer to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeNode>,
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    pub render_state: RenderState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requeue: Option<Requeue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl RenderResponse {
    pub fn is_complete(&self) -> bool {
        self.tree.is_some() && self.failure.is_none()
    }

    pub fn is_interrupted(&self) -> bool {
        self.tree.is_none() && self.failure.is_none() && self.requeue.is_some()
    }

    pub fn action_ids(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.id.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String, BlocksError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, BlocksError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
