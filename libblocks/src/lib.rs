//! Blocks - server-driven UI rendering with persisted hook state
//!
//! This library renders component trees into a serializable UI description
//! and keeps per-component hook state consistent across independent,
//! stateless invocations of the same UI instance. The host stores the
//! render state between requests; every request restores it, runs a pass
//! and hands it back.

pub mod actions;
pub mod config;
pub mod effects;
pub mod error;
pub mod hooks;
pub mod host;
pub mod logging;
pub mod output;
pub mod providers;
pub mod render;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use actions::{ActionEvent, Callback};
pub use config::{ConditionalHookPolicy, Config, RendererConfig};
pub use effects::{Effect, EffectEmitter, EffectKind};
pub use error::{BlocksError, Halt, HookError, ProtocolError, RenderError, Result};
pub use host::LocalHost;
pub use output::{RenderOutcome, TreeNode};
pub use render::{component_fn, Component, Node, Reconciler, RenderContext};
pub use state::{HookId, LoadState, RenderState};
pub use types::{ActionId, EventKind, FailureKind, Props, RenderRequest, RenderResponse, RequestKind};
