//! Render session
//!
//! A [`Reconciler`] owns the root component and renderer settings. Every
//! request runs one or more passes over the whole tree; a pass either
//! completes with a tree, is interrupted by a hook waiting on async work, or
//! fails.

use std::rc::Rc;

use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::actions::{ActionDispatcher, ActionTable};
use crate::config::RendererConfig;
use crate::effects::{Effect, EffectEmitter};
use crate::error::{Halt, RenderError};
use crate::hooks::{HookRegistry, PendingHook};
use crate::output::{self, RenderOutcome, TreeNode};
use crate::state::{RenderState, StateStore};
use crate::types::{Props, RenderRequest, RequestKind, Requeue};

pub mod component;
pub mod context;
pub mod node;
mod session;

pub use component::{
    component_async, component_fn, AsyncFnComponent, Component, FnComponent, Rendered,
};
pub use context::RenderContext;
pub use node::{ComponentElement, Element, Node};

/// A pass that finished building the tree
#[derive(Debug)]
pub struct CompletedPass {
    pub tree: TreeNode,
    pub actions: ActionTable,
    pub effects: Vec<Effect>,
    /// Set when non-blocking hooks are still loading
    pub requeue: Option<Requeue>,
    pub pending: Vec<PendingHook>,
}

#[derive(Debug)]
pub enum PassOutcome {
    Complete(CompletedPass),
    Interrupted {
        requeue: Requeue,
        pending: Vec<PendingHook>,
    },
    Failed(RenderError),
}

impl PassOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PassOutcome::Complete(_) => "complete",
            PassOutcome::Interrupted { .. } => "interrupted",
            PassOutcome::Failed(_) => "failed",
        }
    }
}

pub struct Reconciler {
    root: Rc<dyn Component>,
    props: Props,
    config: RendererConfig,
}

impl Reconciler {
    pub fn new(root: impl Component + 'static) -> Self {
        Self {
            root: Rc::new(root),
            props: Props::new(),
            config: RendererConfig::default(),
        }
    }

    /// Props handed to the root component on every pass
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Handle one request from the host
    pub async fn handle(&self, request: RenderRequest) -> RenderOutcome {
        let span = info_span!(
            "render",
            request_id = %Uuid::new_v4(),
            kind = %request.kind,
            root = %self.root.name()
        );
        self.handle_request(request).instrument(span).await
    }

    async fn handle_request(&self, request: RenderRequest) -> RenderOutcome {
        let prior = request.prior_render_state.clone();
        if let Err(error) = request.validate() {
            info!(error = %error, "Rejecting request");
            return output::rejected(error, prior);
        }

        let outcome = match request.kind {
            RequestKind::UserAction => ActionDispatcher::new(self).dispatch(request).await,
            RequestKind::Initial | RequestKind::AsyncResume => {
                let store = StateStore::new(prior.clone());
                let pass = self.run_pass(store.clone(), EffectEmitter::new()).await;
                output::respond(pass, &store, prior)
            }
        };

        info!(
            complete = outcome.response.is_complete(),
            interrupted = outcome.response.is_interrupted(),
            effects = outcome.response.effects.len(),
            pending = outcome.pending.len(),
            "Request handled"
        );
        outcome
    }

    /// Run a full pass, committing hook lifecycle work on completion
    pub(crate) async fn run_pass(&self, store: StateStore, effects: EffectEmitter) -> PassOutcome {
        self.pass(store, effects, true).await
    }

    /// Run a pass only to rebuild the action table.
    ///
    /// Lifecycle callbacks and pruning are skipped so the pass that follows
    /// the action still sees what changed.
    pub(crate) async fn discover(&self, store: StateStore) -> PassOutcome {
        self.pass(store, EffectEmitter::new(), false).await
    }

    async fn pass(&self, store: StateStore, effects: EffectEmitter, commit: bool) -> PassOutcome {
        let registry = HookRegistry::new(store, self.config.conditional_hooks);
        let mut cx = RenderContext::new(registry, effects.clone());
        effects.open();

        let root = Node::Component(ComponentElement {
            component: Rc::clone(&self.root),
            props: self.props.clone(),
            key: None,
        });
        let mut result = session::resolve(root, &mut cx).await;
        if commit && result.is_ok() {
            if let Err(error) = cx.commit() {
                result = Err(error.into());
            }
        }
        effects.close();

        let (mut registry, actions) = cx.into_parts();
        let pending = registry.take_pending();
        let mut outstanding = registry.outstanding().to_vec();

        let outcome = match result {
            Ok(nodes) => PassOutcome::Complete(CompletedPass {
                tree: session::into_root(nodes),
                actions,
                effects: effects.flush(),
                requeue: (!outstanding.is_empty()).then(|| Requeue::new(outstanding)),
                pending,
            }),
            Err(Halt::Interrupted(id)) => {
                effects.discard();
                if !outstanding.contains(&id) {
                    outstanding.push(id);
                }
                PassOutcome::Interrupted {
                    requeue: Requeue::new(outstanding),
                    pending,
                }
            }
            Err(Halt::Failed(error)) => {
                effects.discard();
                PassOutcome::Failed(error)
            }
        };
        debug!(outcome = outcome.label(), "Pass finished");
        outcome
    }

    /// Render against `state` as an initial request
    pub async fn render(&self, state: RenderState) -> RenderOutcome {
        self.handle(RenderRequest::initial(state)).await
    }
}
