//! In-process host driver
//!
//! `LocalHost` plays the host's part for one UI instance: it keeps the render
//! state between requests, drives the pending work a pass leaves behind and
//! redelivers the request until the tree no longer waits on anything. A
//! requeue after a completed action resumes with `async_resume`; one whose
//! action never ran redelivers the `user_action`. Useful for tests, the CLI
//! and embedding.

use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::effects::Effect;
use crate::error::Result;
use crate::hooks::PendingHook;
use crate::render::Reconciler;
use crate::state::{HookId, LoadState, RenderState, SettledHook};
use crate::types::{ActionId, RenderRequest, RenderResponse, Requeue};

pub struct LocalHost {
    reconciler: Reconciler,
    state: RenderState,
    max_resume_cycles: u32,
    resume_timeout: Duration,
    effects: Vec<Effect>,
}

impl LocalHost {
    /// Fails when the reconciler's resume timeout is not a valid duration
    pub fn new(reconciler: Reconciler) -> Result<Self> {
        let resume_timeout = reconciler.config().resume_timeout()?;
        let max_resume_cycles = reconciler.config().max_resume_cycles;
        Ok(Self {
            reconciler,
            state: RenderState::new(),
            max_resume_cycles,
            resume_timeout,
            effects: Vec::new(),
        })
    }

    /// Start from previously persisted state
    pub fn with_state(mut self, state: RenderState) -> Self {
        self.state = state;
        self
    }

    pub fn render_state(&self) -> &RenderState {
        &self.state
    }

    /// Every effect received since the last drain, in delivery order
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub async fn render(&mut self) -> RenderResponse {
        self.process(RenderRequest::initial(self.state.clone())).await
    }

    pub async fn dispatch(&mut self, action: impl Into<ActionId>) -> RenderResponse {
        self.process(RenderRequest::user_action(action, self.state.clone()))
            .await
    }

    pub async fn dispatch_with(
        &mut self,
        action: impl Into<ActionId>,
        payload: Value,
    ) -> RenderResponse {
        let request = RenderRequest::user_action(action, self.state.clone()).with_payload(payload);
        self.process(request).await
    }

    pub async fn submit_form(&mut self, action: impl Into<ActionId>, values: Value) -> RenderResponse {
        let request =
            RenderRequest::user_action(action, self.state.clone()).with_form_values(values);
        self.process(request).await
    }

    /// Handle a request, then resume until nothing is pending or the cycle
    /// budget runs out. Returns the last response.
    ///
    /// Hooks left loading by work this host does not hold, such as state
    /// from a process that answered before its work settled, are reset and
    /// started again on redelivery.
    pub async fn process(&mut self, request: RenderRequest) -> RenderResponse {
        let mut outcome = self.reconciler.handle(request.clone()).await;
        let mut cycles = 0;

        loop {
            self.state = outcome.response.render_state.clone();
            self.effects.extend(outcome.response.effects.iter().cloned());

            let Some(requeue) = outcome.response.requeue.clone() else {
                break;
            };
            let orphaned = self.orphaned(&requeue, &outcome.pending);
            if outcome.pending.is_empty() && orphaned.is_empty() {
                warn!("Requeue requested but no pending work is held by this host");
                break;
            }
            if cycles >= self.max_resume_cycles {
                warn!(cycles, "Resume budget exhausted, returning last response");
                break;
            }

            let pending = std::mem::take(&mut outcome.pending);
            self.settle(pending).await;
            self.restart(&orphaned);
            cycles += 1;
            debug!(
                cycle = cycles,
                action = ?requeue.action_id,
                "Redelivering after pending work settled"
            );
            let next = requeue.redelivery(&request, self.state.clone());
            outcome = self.reconciler.handle(next).await;
        }

        info!(
            cycles,
            complete = outcome.response.is_complete(),
            "Request processed"
        );
        outcome.response
    }

    /// Requeued hooks still loading without any work held for them
    fn orphaned(&self, requeue: &Requeue, pending: &[PendingHook]) -> Vec<HookId> {
        requeue
            .pending
            .iter()
            .filter(|id| pending.iter().all(|work| work.id() != *id))
            .filter(|id| {
                self.state
                    .get(id)
                    .is_some_and(|record| record.load_state == LoadState::Loading)
            })
            .cloned()
            .collect()
    }

    fn restart(&mut self, orphaned: &[HookId]) {
        for id in orphaned {
            if let Some(record) = self.state.get_mut(id) {
                info!(hook = %id, "Restarting loading hook with no work in flight");
                record.reset();
            }
        }
    }

    async fn settle(&mut self, pending: Vec<PendingHook>) {
        let limit = self.resume_timeout;
        let settled = join_all(pending.into_iter().map(|work| async move {
            let id = work.id().clone();
            let generation = work.generation();
            match tokio::time::timeout(limit, work.settle()).await {
                Ok(settled) => settled,
                Err(_) => SettledHook {
                    id,
                    generation,
                    result: Err(format!(
                        "timed out after {}",
                        humantime::format_duration(limit)
                    )),
                },
            }
        }))
        .await;

        for hook in settled {
            let id = hook.id.clone();
            match self.state.settle(hook) {
                Ok(true) => {}
                Ok(false) => debug!(hook = %id, "Dropping result of superseded work"),
                // A setter may have overwritten the record while work was in flight.
                Err(error) => warn!(hook = %id, error = %error, "Dropping settled value"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::hooks::{use_async, use_state_async};
    use crate::render::{component_fn, Node};

    #[tokio::test]
    async fn test_resumes_until_complete() {
        let reconciler = Reconciler::new(component_fn("App", |_, cx| {
            let value = use_state_async(cx, || async { Ok(42i64) })?;
            Ok(Node::text(value.value()?.to_string()))
        }));
        let mut host = LocalHost::new(reconciler).unwrap();
        let response = host.render().await;
        assert!(response.is_complete());
        assert_eq!(response.tree.unwrap().texts(), vec!["42"]);
    }

    #[tokio::test]
    async fn test_timeout_becomes_hook_error() {
        let config = RendererConfig {
            resume_timeout: "20ms".to_string(),
            ..Default::default()
        };
        let reconciler = Reconciler::new(component_fn("App", |_, cx| {
            let data = use_async(cx, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1u8)
            })?;
            Ok(Node::text(match data.error() {
                Some(error) => error.reason.clone(),
                None => "waiting".to_string(),
            }))
        }))
        .with_config(config);

        let mut host = LocalHost::new(reconciler).unwrap();
        let response = host.render().await;
        assert_eq!(response.tree.unwrap().texts(), vec!["timed out after 20ms"]);
        assert!(response.requeue.is_none());
    }

    #[tokio::test]
    async fn test_resume_budget_is_bounded() {
        let config = RendererConfig {
            max_resume_cycles: 0,
            ..Default::default()
        };
        let reconciler = Reconciler::new(component_fn("App", |_, cx| {
            use_state_async(cx, || async { Ok(1i64) })?;
            Ok(Node::text("done"))
        }))
        .with_config(config);

        let mut host = LocalHost::new(reconciler).unwrap();
        let response = host.render().await;
        assert!(response.is_interrupted());
        assert!(host.render_state().len() == 1);
    }

    #[tokio::test]
    async fn test_restarts_loading_hook_without_work_in_flight() {
        let reconciler = Reconciler::new(component_fn("App", |_, cx| {
            let value = use_state_async(cx, || async { Ok(7i64) })?;
            Ok(Node::text(value.value()?.to_string()))
        }));
        // Answer without driving the work, as a one-shot host would
        let first = reconciler.handle(RenderRequest::initial(RenderState::new())).await;
        assert!(first.response.is_interrupted());
        drop(first.pending);
        let state = first.response.render_state;

        let mut host = LocalHost::new(reconciler).unwrap().with_state(state.clone());
        let response = host.process(RenderRequest::async_resume(state)).await;
        assert!(response.is_complete());
        assert_eq!(response.tree.unwrap().texts(), vec!["7"]);
        let record = host.render_state().get(&HookId::from("App#state.0")).unwrap();
        assert_eq!(record.generation, 1);
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let config = RendererConfig {
            resume_timeout: "whenever".to_string(),
            ..Default::default()
        };
        let reconciler = Reconciler::new(component_fn("App", |_, _| Ok(Node::text("x"))))
            .with_config(config);
        let error = LocalHost::new(reconciler).err().unwrap();
        assert_eq!(error.exit_code(), 2);
    }
}
