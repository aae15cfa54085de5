//! Built-in demo app served by the host

use std::rc::Rc;
use std::time::Duration;

use libblocks::hooks::{use_async, use_state};
use libblocks::providers::mock::MockProvider;
use libblocks::providers::{fetch_as, DataProvider};
use libblocks::render::{component_fn, Component, Node, Reconciler, RenderContext};
use libblocks::{Callback, EventKind, Halt, Props, RendererConfig};
use serde_json::json;

fn counter(_: &Props, cx: &mut RenderContext) -> Result<Node, Halt> {
    let count = use_state(cx, || 0i64)?;

    let set = count.setter();
    let incr = cx.bind_as(
        "incr",
        EventKind::Press,
        Callback::new(move |event| {
            set.update(|n| n + 1)?;
            event
                .effects
                .show_toast(format!("Count is now {}", set.current()?))?;
            Ok(())
        }),
    )?;
    let set = count.setter();
    let reset = cx.bind_as(
        "reset",
        EventKind::Press,
        Callback::new(move |_| {
            set.set(0)?;
            Ok(())
        }),
    )?;

    Ok(Node::hstack()
        .child(Node::text(format!("Count: {}", count.get()?)))
        .child(Node::button("+1").on_press(&incr))
        .child(Node::button("Reset").on_press(&reset)))
}

fn greeting(provider: Rc<dyn DataProvider>) -> impl Fn(&Props, &mut RenderContext) -> Result<Node, Halt> {
    move |_: &Props, cx: &mut RenderContext| {
        let provider = Rc::clone(&provider);
        let message = use_async(cx, move || fetch_as::<String>(provider, "greeting"))?;
        let text = match (message.data(), message.error()) {
            (Some(text), _) => text.clone(),
            (None, Some(error)) => format!("Greeting unavailable: {}", error.reason),
            (None, None) => "Loading...".to_string(),
        };
        Ok(Node::text(text))
    }
}

/// Counter plus a greeting loaded in the background
pub fn app(config: RendererConfig) -> Reconciler {
    let provider: Rc<dyn DataProvider> = Rc::new(
        MockProvider::with_values("demo", [("greeting", json!("Hello from blocks"))])
            .with_delay(Duration::from_millis(5)),
    );
    let greeter: Rc<dyn Component> = Rc::new(component_fn("Greeting", greeting(provider)));

    Reconciler::new(component_fn("Demo", move |_, _| {
        Ok(Node::vstack()
            .child(Node::shared(Rc::clone(&greeter)))
            .child(Node::component(component_fn("Counter", counter))))
    }))
    .with_config(config)
}
