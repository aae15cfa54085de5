//! Tree resolution for one pass
//!
//! Depth-first, declaration order. Each component is entered as a frame in
//! the hook registry, rendered through the single `Component::render` call
//! site, and its output resolved in turn. Any `Halt` aborts the walk.

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::trace;

use super::component::Rendered;
use super::context::RenderContext;
use super::node::{ComponentElement, Element, Node};
use crate::error::Halt;
use crate::output::TreeNode;

/// Resolve a node into the tree nodes it stands for.
///
/// Components and fragments flatten into their parent's children.
pub(crate) fn resolve<'a>(
    node: Node,
    cx: &'a mut RenderContext,
) -> LocalBoxFuture<'a, Result<Vec<TreeNode>, Halt>> {
    async move {
        match node {
            Node::Text(value) => Ok(vec![TreeNode::text(value)]),
            Node::Element(Element {
                kind,
                props,
                children,
            }) => {
                let children = resolve_children(children, cx).await?;
                Ok(vec![TreeNode {
                    kind,
                    props,
                    children,
                }])
            }
            Node::Fragment(children) => resolve_children(children, cx).await,
            Node::Component(element) => render_component(element, cx).await,
        }
    }
    .boxed_local()
}

async fn resolve_children(
    children: Vec<Node>,
    cx: &mut RenderContext,
) -> Result<Vec<TreeNode>, Halt> {
    let mut resolved = Vec::with_capacity(children.len());
    for (index, child) in children.into_iter().enumerate() {
        cx.push_trail(index);
        let result = resolve(child, cx).await;
        cx.pop_trail();
        resolved.extend(result?);
    }
    Ok(resolved)
}

async fn render_component(
    element: ComponentElement,
    cx: &mut RenderContext,
) -> Result<Vec<TreeNode>, Halt> {
    let ComponentElement {
        component,
        props,
        key,
    } = element;
    let name = component.name().to_string();
    let segment = cx.segment_for(&name, key.as_deref());
    let parent_trail = cx.enter(&segment);
    trace!(path = %cx.path(), "Rendering component");

    let rendered = match component.render(&props, cx) {
        Rendered::Ready(result) => result,
        Rendered::Deferred(future) => future.await,
    };
    let result = match rendered {
        Ok(output) => resolve(output, cx).await,
        Err(halt) => Err(halt.in_component(&name)),
    };

    cx.leave(parent_trail);
    result
}

/// Single root for the response: one node as-is, otherwise a fragment
pub(crate) fn into_root(mut nodes: Vec<TreeNode>) -> TreeNode {
    if nodes.len() == 1 {
        if let Some(node) = nodes.pop() {
            return node;
        }
    }
    TreeNode::fragment(nodes)
}
