//! Host-driven timer hook
//!
//! While running, every completed pass asks the host to keep firing the tick
//! action at the configured period. Stopping is announced once, including
//! when the component owning a running timer is no longer rendered.

use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{CallSite, Hook, HookRegistry, Init, PassCompletion};
use crate::actions::Callback;
use crate::effects::{EffectEmitter, EffectKind};
use crate::error::{Halt, ProtocolError};
use crate::render::RenderContext;
use crate::state::{HookId, RenderState, StateStore};
use crate::types::{ActionId, EventKind};

const NAMESPACE: &str = "interval";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct IntervalState {
    running: bool,
    /// The host was last told the timer is running
    announced: bool,
}

#[derive(Debug, Clone)]
pub struct Interval {
    id: HookId,
    period: Duration,
    tick: ActionId,
    store: StateStore,
}

impl Interval {
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick_action(&self) -> &ActionId {
        &self.tick
    }

    pub fn is_running(&self) -> bool {
        self.read().running
    }

    pub fn start(&self) -> Result<(), ProtocolError> {
        let state = IntervalState {
            running: true,
            ..self.read()
        };
        self.store.write(|render| write_state(render, &self.id, state))
    }

    pub fn stop(&self) -> Result<(), ProtocolError> {
        let state = IntervalState {
            running: false,
            ..self.read()
        };
        self.store.write(|render| write_state(render, &self.id, state))
    }

    fn read(&self) -> IntervalState {
        self.store
            .read(|state| state.value(&self.id))
            .unwrap_or_default()
    }

    fn key(&self) -> String {
        effect_key(&self.id)
    }
}

fn effect_key(id: &HookId) -> String {
    format!("interval.{id}")
}

fn write_state(
    render: &mut RenderState,
    id: &HookId,
    state: IntervalState,
) -> Result<(), ProtocolError> {
    let value = serde_json::to_value(state).map_err(|e| ProtocolError::state_shape(id, e))?;
    render
        .get_mut(id)
        .ok_or_else(|| ProtocolError::state_shape(id, "no interval record"))?
        .overwrite(id, value)
}

impl Hook for Interval {
    fn id(&self) -> &HookId {
        &self.id
    }

    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn on_pass_complete(&self, completion: &mut PassCompletion<'_>) -> Result<(), ProtocolError> {
        let state: IntervalState = completion.state.value(&self.id).unwrap_or_default();
        if state.running {
            completion.effects.emit(
                self.key(),
                EffectKind::Interval,
                json!({
                    "action_id": self.tick,
                    "period_ms": self.period.as_millis() as u64,
                    "running": true,
                }),
            )?;
        } else if state.announced {
            completion.effects.emit(
                self.key(),
                EffectKind::Interval,
                json!({ "action_id": self.tick, "running": false }),
            )?;
        }
        if state.announced != state.running {
            let next = IntervalState {
                announced: state.running,
                ..state
            };
            write_state(completion.state, &self.id, next)?;
        }
        Ok(())
    }
}

/// Announce the stop of every timer the host was told about whose hook was
/// not registered in this pass. Records that survive pruning are marked
/// unannounced, so the timer is announced again if its component returns.
pub(crate) fn stop_detached(
    state: &mut RenderState,
    effects: &EffectEmitter,
    registry: &HookRegistry,
) -> Result<(), ProtocolError> {
    let detached: Vec<(HookId, IntervalState)> = state
        .hooks
        .iter()
        .filter(|(id, record)| record.namespace == NAMESPACE && !registry.is_registered(id))
        .filter_map(|(id, record)| {
            let timer: IntervalState = record.decode(id).ok()?;
            timer.announced.then(|| (id.clone(), timer))
        })
        .collect();

    for (id, timer) in detached {
        debug!(hook = %id, "Stopping timer of a component that was not rendered");
        effects.emit(
            effect_key(&id),
            EffectKind::Interval,
            json!({ "action_id": format!("{id}.tick"), "running": false }),
        )?;
        let next = IntervalState {
            announced: false,
            ..timer
        };
        write_state(state, &id, next)?;
    }
    Ok(())
}

/// Declare a timer; it starts stopped
#[track_caller]
pub fn use_interval(
    cx: &mut RenderContext,
    period: Duration,
    on_tick: Callback,
) -> Result<Interval, Halt> {
    let site = CallSite::here();
    let slot = cx
        .registry()
        .register(NAMESPACE, site, || Init::Ready(IntervalState::default()))?;
    let tick = cx.bind_as(format!("{}.tick", slot.id), EventKind::IntervalTick, on_tick)?;
    let interval = Interval {
        id: slot.id,
        period,
        tick,
        store: cx.store().clone(),
    };
    cx.attach(Rc::new(interval.clone()));
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConditionalHookPolicy;

    fn context(emitter: &EffectEmitter) -> RenderContext {
        context_at(emitter, RenderState::new(), "Clock")
    }

    fn context_at(emitter: &EffectEmitter, state: RenderState, path: &str) -> RenderContext {
        emitter.open();
        let mut cx = RenderContext::new(
            HookRegistry::new(StateStore::new(state), ConditionalHookPolicy::Reset),
            emitter.clone(),
        );
        cx.enter(path);
        cx
    }

    /// Render a clock and start its timer; returns the committed state
    fn running_clock(emitter: &EffectEmitter) -> RenderState {
        let mut cx = context(emitter);
        let interval =
            use_interval(&mut cx, Duration::from_secs(1), Callback::new(|_| Ok(()))).unwrap();
        interval.start().unwrap();
        cx.commit().unwrap();
        assert_eq!(emitter.flush()[0].payload["running"], true);
        interval.store.snapshot()
    }

    #[test]
    fn test_running_interval_announces_period() {
        let emitter = EffectEmitter::new();
        let mut cx = context(&emitter);
        let interval =
            use_interval(&mut cx, Duration::from_secs(2), Callback::new(|_| Ok(()))).unwrap();

        cx.commit().unwrap();
        assert!(emitter.flush().is_empty());

        interval.start().unwrap();
        cx.commit().unwrap();
        let effects = emitter.flush();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].payload["period_ms"], 2000);
        assert_eq!(effects[0].payload["action_id"], "Clock#interval.0.tick");

        interval.stop().unwrap();
        cx.commit().unwrap();
        let effects = emitter.flush();
        assert_eq!(effects[0].payload["running"], false);

        cx.commit().unwrap();
        assert!(emitter.flush().is_empty());
    }

    #[test]
    fn test_timer_of_unrendered_component_is_stopped() {
        let emitter = EffectEmitter::new();
        let state = running_clock(&emitter);

        let mut cx = context_at(&emitter, state, "Elsewhere");
        cx.commit().unwrap();
        let effects = emitter.flush();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].key, "interval.Clock#interval.0");
        assert_eq!(effects[0].payload["running"], false);
        assert_eq!(effects[0].payload["action_id"], "Clock#interval.0.tick");

        let id = HookId::from("Clock#interval.0");
        let kept: IntervalState = cx.store().read(|state| state.value(&id)).unwrap();
        assert!(kept.running);
        assert!(!kept.announced);

        cx.commit().unwrap();
        assert!(emitter.flush().is_empty());
    }

    #[test]
    fn test_timer_dropped_from_rendered_component_is_stopped() {
        let emitter = EffectEmitter::new();
        let state = running_clock(&emitter);

        let mut cx = context_at(&emitter, state, "Clock");
        cx.commit().unwrap();
        let effects = emitter.flush();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].payload["running"], false);
        assert!(cx.store().read(|state| state.is_empty()));
    }
}
