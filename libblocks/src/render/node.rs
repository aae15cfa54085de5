//! Unresolved UI nodes produced by components

use std::rc::Rc;

use serde_json::Value;

use super::component::Component;
use crate::types::{ActionId, Props};

#[derive(Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    Component(ComponentElement),
    Fragment(Vec<Node>),
}

/// A host primitive such as `vstack` or `button`
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: String,
    pub props: Props,
    pub children: Vec<Node>,
}

/// A component to be rendered in place
#[derive(Clone)]
pub struct ComponentElement {
    pub component: Rc<dyn Component>,
    pub props: Props,
    /// Stable identity among siblings, replaces the positional segment
    pub key: Option<String>,
}

impl Node {
    pub fn element(kind: impl Into<String>) -> Self {
        Node::Element(Element {
            kind: kind.into(),
            props: Props::new(),
            children: Vec::new(),
        })
    }

    pub fn vstack() -> Self {
        Self::element("vstack")
    }

    pub fn hstack() -> Self {
        Self::element("hstack")
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn button(label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self::element("button").prop("label", label)
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    pub fn component(component: impl Component + 'static) -> Self {
        Self::shared(Rc::new(component))
    }

    pub fn shared(component: Rc<dyn Component>) -> Self {
        Node::Component(ComponentElement {
            component,
            props: Props::new(),
            key: None,
        })
    }

    /// Set a prop on an element or component; other nodes are unchanged
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self {
            Node::Element(element) => element.props.insert(key, value),
            Node::Component(component) => component.props.insert(key, value),
            Node::Text(_) | Node::Fragment(_) => {}
        }
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        match &mut self {
            Node::Element(element) => element.props = props,
            Node::Component(component) => component.props = props,
            Node::Text(_) | Node::Fragment(_) => {}
        }
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        match &mut self {
            Node::Element(Element { children, .. }) | Node::Fragment(children) => {
                children.push(child.into())
            }
            Node::Text(_) | Node::Component(_) => {}
        }
        self
    }

    pub fn children<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        for node in nodes {
            self = self.child(node);
        }
        self
    }

    /// Wire an event prop to a bound action
    pub fn on(self, prop: &str, action: &ActionId) -> Self {
        self.prop(prop, action.as_str())
    }

    pub fn on_press(self, action: &ActionId) -> Self {
        self.on("on_press", action)
    }

    /// Key a component element
    pub fn key(mut self, key: impl Into<String>) -> Self {
        if let Node::Component(component) = &mut self {
            component.key = Some(key.into());
        }
        self
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::text(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Element(element) => std::fmt::Debug::fmt(element, f),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Component(component) => f
                .debug_struct("Component")
                .field("name", &component.component.name())
                .field("key", &component.key)
                .finish(),
            Node::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
        }
    }
}
