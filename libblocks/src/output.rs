//! Output adapter: pass results into wire responses

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProtocolError;
use crate::hooks::PendingHook;
use crate::render::{CompletedPass, PassOutcome};
use crate::state::{RenderState, StateStore};
use crate::types::{ActionId, Failure, FailureKind, Props, RenderResponse};

/// Resolved UI node: every component replaced by what it rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub const TEXT: &'static str = "text";
    pub const FRAGMENT: &'static str = "fragment";

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: Self::TEXT.to_string(),
            props: Props::new().with("value", value.into()),
            children: Vec::new(),
        }
    }

    pub fn fragment(children: Vec<TreeNode>) -> Self {
        Self {
            kind: Self::FRAGMENT.to_string(),
            props: Props::new(),
            children,
        }
    }

    /// Text content in depth-first order
    pub fn texts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_texts(&mut out);
        out
    }

    fn collect_texts<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.kind == Self::TEXT {
            if let Some(value) = self.props.get_str("value") {
                out.push(value);
            }
        }
        for child in &self.children {
            child.collect_texts(out);
        }
    }

    /// First node, depth-first, whose kind matches
    pub fn find(&self, kind: &str) -> Option<&TreeNode> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(kind))
    }
}

/// Response plus the in-process futures the host must drive
pub struct RenderOutcome {
    pub response: RenderResponse,
    /// Dropped work leaves its hook `loading`; `LocalHost` restarts such
    /// hooks when the state comes back.
    pub pending: Vec<PendingHook>,
}

impl std::fmt::Debug for RenderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOutcome")
            .field("response", &self.response)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Package a pass into a response.
///
/// Complete and interrupted passes hand back the state as the pass left it;
/// a failed pass returns `prior` untouched.
pub(crate) fn respond(pass: PassOutcome, store: &StateStore, prior: RenderState) -> RenderOutcome {
    match pass {
        PassOutcome::Complete(pass) => {
            let CompletedPass {
                tree,
                actions,
                effects,
                requeue,
                pending,
            } = pass;
            RenderOutcome {
                response: RenderResponse {
                    tree: Some(tree),
                    actions: actions.descriptors(),
                    effects,
                    render_state: store.snapshot(),
                    requeue,
                    failure: None,
                },
                pending,
            }
        }
        PassOutcome::Interrupted { requeue, pending } => RenderOutcome {
            response: RenderResponse {
                tree: None,
                actions: Vec::new(),
                effects: Vec::new(),
                render_state: store.snapshot(),
                requeue: Some(requeue),
                failure: None,
            },
            pending,
        },
        PassOutcome::Failed(error) => {
            debug!(error = %error, "Render pass failed");
            RenderOutcome {
                response: RenderResponse {
                    tree: None,
                    actions: Vec::new(),
                    effects: Vec::new(),
                    render_state: prior,
                    requeue: None,
                    failure: Some(Failure {
                        kind: error.kind(),
                        message: error.to_string(),
                        action_id: None,
                    }),
                },
                pending: Vec::new(),
            }
        }
    }
}

/// Reject a malformed request: no tree, no effects, state untouched
pub(crate) fn rejected(error: ProtocolError, prior: RenderState) -> RenderOutcome {
    RenderOutcome {
        response: RenderResponse {
            tree: None,
            actions: Vec::new(),
            effects: Vec::new(),
            render_state: prior,
            requeue: None,
            failure: Some(Failure {
                kind: FailureKind::Protocol,
                message: error.to_string(),
                action_id: None,
            }),
        },
        pending: Vec::new(),
    }
}

/// The callback failed: return the last complete tree.
///
/// Setters that ran before the failure stay applied.
pub(crate) fn callback_failure(
    previous: CompletedPass,
    store: &StateStore,
    action_id: ActionId,
    error: &anyhow::Error,
) -> RenderOutcome {
    RenderOutcome {
        response: RenderResponse {
            tree: Some(previous.tree),
            actions: previous.actions.descriptors(),
            effects: Vec::new(),
            render_state: store.snapshot(),
            requeue: previous.requeue,
            failure: Some(Failure {
                kind: FailureKind::Callback,
                message: format!("{error:#}"),
                action_id: Some(action_id),
            }),
        },
        pending: previous.pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_texts_depth_first() {
        let tree = TreeNode {
            kind: "vstack".to_string(),
            props: Props::new(),
            children: vec![
                TreeNode::text("a"),
                TreeNode {
                    kind: "hstack".to_string(),
                    props: Props::new(),
                    children: vec![TreeNode::text("b")],
                },
                TreeNode::text("c"),
            ],
        };
        assert_eq!(tree.texts(), vec!["a", "b", "c"]);
        assert_eq!(tree.find("hstack").map(|n| n.children.len()), Some(1));
        assert!(tree.find("button").is_none());
    }

    #[test]
    fn test_tree_node_wire_shape_skips_empty_fields() {
        let node = TreeNode {
            kind: "spacer".to_string(),
            props: Props::new(),
            children: Vec::new(),
        };
        assert_eq!(serde_json::to_value(&node).unwrap(), json!({ "kind": "spacer" }));
    }

    #[test]
    fn test_rejected_response_keeps_prior_state() {
        let prior = RenderState::new();
        let outcome = rejected(ProtocolError::UnknownAction("nope".to_string()), prior.clone());
        let response = outcome.response;
        assert!(response.tree.is_none());
        assert!(response.effects.is_empty());
        assert_eq!(response.render_state, prior);
        assert_eq!(response.failure.map(|f| f.kind), Some(FailureKind::Protocol));
    }
}
