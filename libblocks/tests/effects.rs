//! Effect delivery
//!
//! Effects reach the host only with a completed pass. Callback effects ride
//! along with the regenerated tree; interrupted and failed passes deliver
//! nothing.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use libblocks::hooks::{use_channel, use_form, use_interval, use_state_async, use_web_view};
use libblocks::render::{component_fn, Node, Reconciler};
use libblocks::types::{EventKind, FailureKind};
use libblocks::{Callback, EffectKind, LocalHost, RenderState};
use serde_json::{json, Value};

#[tokio::test]
async fn test_toast_emitted_twice_keeps_the_last() {
    let reconciler = Reconciler::new(component_fn("App", |_, cx| {
        cx.effects().show_toast("A")?;
        cx.effects().show_toast("B")?;
        Ok(Node::text("ok"))
    }));

    let response = reconciler.render(RenderState::new()).await.response;
    assert_eq!(response.effects.len(), 1);
    assert_eq!(response.effects[0].kind, EffectKind::ShowToast);
    assert_eq!(response.effects[0].payload, json!({ "text": "B" }));
}

#[tokio::test]
async fn test_distinct_effects_keep_emission_order() {
    let reconciler = Reconciler::new(component_fn("App", |_, cx| {
        cx.effects().navigate_to("https://example.com/docs")?;
        cx.effects().show_toast("Opening docs")?;
        Ok(Node::text("ok"))
    }));

    let response = reconciler.render(RenderState::new()).await.response;
    let kinds: Vec<_> = response.effects.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EffectKind::NavigateToUrl, EffectKind::ShowToast]);
}

#[tokio::test]
async fn test_interrupted_pass_delivers_no_effects() {
    let reconciler = Reconciler::new(component_fn("App", |_, cx| {
        cx.effects().show_toast("too early")?;
        let value = use_state_async(cx, || async { Ok(1i64) })?;
        Ok(Node::text(value.value()?.to_string()))
    }));

    let response = reconciler.render(RenderState::new()).await.response;
    assert!(response.is_interrupted());
    assert!(response.effects.is_empty());
}

#[tokio::test]
async fn test_failed_pass_delivers_no_effects() {
    let reconciler = Reconciler::new(component_fn("App", |_, cx| {
        cx.effects().show_toast("never")?;
        Err(anyhow::anyhow!("layout exploded").into())
    }));

    let response = reconciler.render(RenderState::new()).await.response;
    assert_eq!(response.failure.map(|f| f.kind), Some(FailureKind::Render));
    assert!(response.effects.is_empty());
}

fn saver() -> Reconciler {
    Reconciler::new(component_fn("Editor", |_, cx| {
        let save = cx.bind_as(
            "save",
            EventKind::Press,
            Callback::new(|event| {
                event.effects.show_toast("Saved")?;
                Ok(())
            }),
        )?;
        let fail = cx.bind_as(
            "fail",
            EventKind::Press,
            Callback::new(|event| {
                event.effects.show_toast("Saved")?;
                anyhow::bail!("disk full")
            }),
        )?;
        Ok(Node::hstack()
            .child(Node::button("Save").on_press(&save))
            .child(Node::button("Fail").on_press(&fail)))
    }))
}

#[tokio::test]
async fn test_callback_effects_arrive_with_regenerated_tree() {
    let mut host = LocalHost::new(saver()).unwrap();
    host.render().await;
    assert!(host.drain_effects().is_empty());

    let response = host.dispatch("save").await;
    assert!(response.is_complete());
    assert_eq!(response.effects.len(), 1);
    assert_eq!(response.effects[0].payload["text"], "Saved");
    assert_eq!(host.drain_effects().len(), 1);
}

#[tokio::test]
async fn test_failed_callback_effects_are_dropped() {
    let mut host = LocalHost::new(saver()).unwrap();
    host.render().await;

    let response = host.dispatch("fail").await;
    assert_eq!(response.failure.map(|f| f.kind), Some(FailureKind::Callback));
    assert!(response.effects.is_empty());
}

#[tokio::test]
async fn test_form_is_shown_and_submitted() {
    let submitted: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&submitted);

    let reconciler = Reconciler::new(component_fn("NewPost", move |_, cx| {
        let sink = Rc::clone(&sink);
        let form = use_form(
            cx,
            json!({ "fields": [{ "name": "title", "type": "string" }] }),
            Callback::new(move |event| {
                *sink.borrow_mut() = Some(event.payload);
                event.effects.show_toast("Posted")?;
                Ok(())
            }),
        )?;
        let shown = form.clone();
        let open = cx.bind_as(
            "open",
            EventKind::Press,
            Callback::new(move |event| {
                shown.show(&event.effects)?;
                Ok(())
            }),
        )?;
        Ok(Node::button("New post").on_press(&open))
    }));

    let mut host = LocalHost::new(reconciler).unwrap();
    let first = host.render().await;
    assert_eq!(first.action_ids(), vec!["NewPost#form.0.submit", "open"]);

    let opened = host.dispatch("open").await;
    assert_eq!(opened.effects.len(), 1);
    assert_eq!(opened.effects[0].kind, EffectKind::ShowForm);
    assert_eq!(opened.effects[0].payload["form_id"], "NewPost#form.0");
    assert_eq!(
        opened.effects[0].payload["submit_action"],
        "NewPost#form.0.submit"
    );

    let values = json!({ "title": "Hello" });
    let posted = host
        .submit_form("NewPost#form.0.submit", values.clone())
        .await;
    assert!(posted.is_complete());
    assert_eq!(submitted.borrow().clone(), Some(values));
    assert_eq!(posted.effects[0].payload["text"], "Posted");
}

#[tokio::test]
async fn test_channel_subscription_changes_are_announced_once() {
    let reconciler = Reconciler::new(component_fn("Chat", |_, cx| {
        let channel = use_channel(cx, "lobby", Callback::new(|_| Ok(())))?;
        let joining = channel.clone();
        cx.bind_as(
            "join",
            EventKind::Press,
            Callback::new(move |_| {
                joining.subscribe()?;
                Ok(())
            }),
        )?;
        let leaving = channel.clone();
        cx.bind_as(
            "leave",
            EventKind::Press,
            Callback::new(move |_| {
                leaving.unsubscribe()?;
                Ok(())
            }),
        )?;
        Ok(Node::text(if channel.is_subscribed() {
            "online"
        } else {
            "offline"
        }))
    }));

    let mut host = LocalHost::new(reconciler).unwrap();
    let first = host.render().await;
    assert!(first.effects.is_empty());
    assert_eq!(first.action_ids()[0], "Chat#channel.0.message");

    let joined = host.dispatch("join").await;
    assert_eq!(joined.tree.unwrap().texts(), vec!["online"]);
    assert_eq!(joined.effects.len(), 1);
    assert_eq!(joined.effects[0].kind, EffectKind::RealtimeSubscriptions);
    assert_eq!(joined.effects[0].payload, json!({ "channels": ["lobby"] }));
    assert!(joined.render_state.subscriptions.contains("lobby"));

    let steady = host.render().await;
    assert!(steady.effects.is_empty());

    let left = host.dispatch("leave").await;
    assert_eq!(left.effects[0].payload, json!({ "channels": [] }));
    assert!(left.render_state.subscriptions.is_empty());
}

#[tokio::test]
async fn test_interval_announces_start_and_ticks() {
    let ticks = Rc::new(RefCell::new(0u32));
    let counter = Rc::clone(&ticks);

    let reconciler = Reconciler::new(component_fn("Clock", move |_, cx| {
        let counter = Rc::clone(&counter);
        let interval = use_interval(
            cx,
            Duration::from_millis(500),
            Callback::new(move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            }),
        )?;
        let timer = interval.clone();
        cx.bind_as(
            "start",
            EventKind::Press,
            Callback::new(move |_| {
                timer.start()?;
                Ok(())
            }),
        )?;
        Ok(Node::text(if interval.is_running() { "running" } else { "idle" }))
    }));

    let mut host = LocalHost::new(reconciler).unwrap();
    host.render().await;

    let started = host.dispatch("start").await;
    assert_eq!(started.tree.unwrap().texts(), vec!["running"]);
    assert_eq!(started.effects[0].kind, EffectKind::Interval);
    assert_eq!(
        started.effects[0].payload,
        json!({ "action_id": "Clock#interval.0.tick", "period_ms": 500, "running": true })
    );

    host.dispatch("Clock#interval.0.tick").await;
    host.dispatch("Clock#interval.0.tick").await;
    assert_eq!(*ticks.borrow(), 2);
}

#[tokio::test]
async fn test_web_view_messages_are_not_collapsed() {
    let reconciler = Reconciler::new(component_fn("Game", |_, cx| {
        let view = use_web_view(cx, "https://example.com/game", Callback::new(|_| Ok(())))?;
        let target = view.clone();
        cx.bind_as(
            "ping",
            EventKind::Press,
            Callback::new(move |event| {
                target.post_message(&event.effects, json!({ "n": 1 }))?;
                target.post_message(&event.effects, json!({ "n": 2 }))?;
                target.set_fullscreen(&event.effects, true)?;
                Ok(())
            }),
        )?;
        Ok(Node::element("web_view").prop("url", view.url()))
    }));

    let mut host = LocalHost::new(reconciler).unwrap();
    host.render().await;
    let response = host.dispatch("ping").await;

    let kinds: Vec<_> = response.effects.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EffectKind::WebViewPostMessage,
            EffectKind::WebViewPostMessage,
            EffectKind::WebViewFullscreen,
        ]
    );
    assert_eq!(response.effects[1].payload["message"], json!({ "n": 2 }));
}
