//! Error types for libblocks

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{HookId, LoadState};
use crate::types::{FailureKind, RequestKind};

pub type Result<T> = std::result::Result<T, BlocksError>;

#[derive(Error, Debug)]
pub enum BlocksError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlocksError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BlocksError::Protocol(_) => 3,
            BlocksError::Config(_) => 2,
            BlocksError::Json(_) => 3,
            BlocksError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Malformed requests and hook usage errors.
///
/// A protocol error rejects the request outright: the response carries no
/// tree and no effects, and the prior render state is returned untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("User action request is missing an action id")]
    MissingActionId,

    #[error("A {kind} request cannot carry an action id ({action_id})")]
    ActionNotAllowed { kind: RequestKind, action_id: String },

    #[error("Render state shape mismatch for {id}: {reason}")]
    StateShape { id: String, reason: String },

    #[error("Unsupported render state version {found} (expected {expected})")]
    StateVersion { found: u32, expected: u32 },

    #[error("Hook registered twice in one pass: {0}")]
    DuplicateHook(String),

    #[error("Hook order changed since the previous pass at {0}")]
    HookOrderChanged(String),

    #[error("Hook '{0}' registered outside of a component")]
    HookOutsideComponent(String),

    #[error("Action id bound twice in one pass: {0}")]
    DuplicateAction(String),

    #[error("Effect '{0}' emitted outside an active render pass")]
    EffectOutsidePass(String),

    #[error("Invalid load state transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: LoadState,
        to: LoadState,
    },
}

impl ProtocolError {
    pub(crate) fn state_shape(id: &HookId, reason: impl std::fmt::Display) -> Self {
        ProtocolError::StateShape {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A hook's initializer failed.
///
/// The failure is stored on the hook record and handed back to the owning
/// component whenever it reads the value, so the component may recover.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Hook {id} failed to initialize: {reason}")]
pub struct HookError {
    pub id: HookId,
    pub reason: String,
}

/// Whole-pass render failures
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    HookInit(#[from] HookError),

    #[error("Component {component} failed: {message}")]
    Component { component: String, message: String },
}

impl RenderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RenderError::Protocol(_) => FailureKind::Protocol,
            RenderError::HookInit(_) => FailureKind::HookInitialization,
            RenderError::Component { .. } => FailureKind::Render,
        }
    }
}

/// Why a component stopped rendering.
///
/// Returned through ordinary `?` propagation. `Interrupted` means a hook is
/// still waiting on asynchronous work and the whole pass must be requeued;
/// `Failed` aborts the pass with an error.
#[derive(Debug, Clone)]
pub enum Halt {
    Interrupted(HookId),
    Failed(RenderError),
}

impl Halt {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Halt::Interrupted(_))
    }

    /// Attach the failing component's name to anonymous component errors.
    pub(crate) fn in_component(self, name: &str) -> Self {
        match self {
            Halt::Failed(RenderError::Component { component, message }) if component.is_empty() => {
                Halt::Failed(RenderError::Component {
                    component: name.to_string(),
                    message,
                })
            }
            other => other,
        }
    }
}

impl From<ProtocolError> for Halt {
    fn from(error: ProtocolError) -> Self {
        Halt::Failed(RenderError::Protocol(error))
    }
}

impl From<HookError> for Halt {
    fn from(error: HookError) -> Self {
        Halt::Failed(RenderError::HookInit(error))
    }
}

impl From<RenderError> for Halt {
    fn from(error: RenderError) -> Self {
        Halt::Failed(error)
    }
}

impl From<anyhow::Error> for Halt {
    fn from(error: anyhow::Error) -> Self {
        Halt::Failed(RenderError::Component {
            component: String::new(),
            message: format!("{error:#}"),
        })
    }
}
