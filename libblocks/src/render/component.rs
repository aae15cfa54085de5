//! The renderable contract

use futures::future::LocalBoxFuture;

use super::context::RenderContext;
use super::node::Node;
use crate::error::Halt;
use crate::types::Props;

/// What a component hands back to the session
pub enum Rendered<'a> {
    Ready(Result<Node, Halt>),
    Deferred(LocalBoxFuture<'a, Result<Node, Halt>>),
}

impl<'a> From<Result<Node, Halt>> for Rendered<'a> {
    fn from(result: Result<Node, Halt>) -> Self {
        Rendered::Ready(result)
    }
}

/// A UI component.
///
/// Rendering must be a deterministic function of props and hook state:
/// hooks have to be called in the same order on every pass.
pub trait Component {
    /// Used as the component's path segment
    fn name(&self) -> &str;

    fn render<'a>(&'a self, props: &'a Props, cx: &'a mut RenderContext) -> Rendered<'a>;
}

/// Component backed by a plain function or closure
pub struct FnComponent<F> {
    name: String,
    f: F,
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&Props, &mut RenderContext) -> Result<Node, Halt>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render<'a>(&'a self, props: &'a Props, cx: &'a mut RenderContext) -> Rendered<'a> {
        Rendered::Ready((self.f)(props, cx))
    }
}

/// Component backed by an async function item
pub struct AsyncFnComponent<F> {
    name: String,
    f: F,
}

impl<F> Component for AsyncFnComponent<F>
where
    F: for<'a> Fn(&'a Props, &'a mut RenderContext) -> LocalBoxFuture<'a, Result<Node, Halt>>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render<'a>(&'a self, props: &'a Props, cx: &'a mut RenderContext) -> Rendered<'a> {
        Rendered::Deferred((self.f)(props, cx))
    }
}

pub fn component_fn<F>(name: impl Into<String>, f: F) -> FnComponent<F>
where
    F: Fn(&Props, &mut RenderContext) -> Result<Node, Halt>,
{
    FnComponent {
        name: name.into(),
        f,
    }
}

/// Wrap an async render function.
///
/// ```ignore
/// fn profile<'a>(props: &'a Props, cx: &'a mut RenderContext) -> LocalBoxFuture<'a, Result<Node, Halt>> {
///     async move { Ok(Node::text("...")) }.boxed_local()
/// }
/// let component = component_async("Profile", profile);
/// ```
pub fn component_async<F>(name: impl Into<String>, f: F) -> AsyncFnComponent<F>
where
    F: for<'a> Fn(&'a Props, &'a mut RenderContext) -> LocalBoxFuture<'a, Result<Node, Halt>>,
{
    AsyncFnComponent {
        name: name.into(),
        f,
    }
}
