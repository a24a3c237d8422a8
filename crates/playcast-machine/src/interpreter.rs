//! The statechart interpreter: one mutable cursor over a compiled machine.
//!
//! The interpreter holds the current state, the last inbound event, and a
//! timer epoch. Everything else it needs arrives per call through an
//! [`ActionCtx`], so the owning room keeps sole ownership of the state
//! tree, scheduler, and outbox. All methods are synchronous; one event
//! dispatch runs guard evaluation, exit/transition/entry actions, and timer
//! installation to completion before returning.

use std::sync::Arc;

use playcast_logic::eval_bool;
use serde_json::{json, Value as Json};

use crate::actions::{run_actions, ActionCtx};
use crate::{Machine, StateId, TimerTask, Transition};

/// Interprets a compiled [`Machine`] for one room.
pub struct Interpreter {
    machine: Arc<Machine>,
    current: StateId,
    /// Bumped on every state change; `after` timers installed under an
    /// older epoch are stale and ignored when they fire.
    epoch: u64,
    /// The last inbound event, visible to guards and token templates as
    /// `event.*`.
    last_event: Json,
}

impl Interpreter {
    /// Creates an interpreter positioned at the machine's initial state.
    /// Nothing runs until [`start`](Self::start).
    pub fn new(machine: Arc<Machine>) -> Self {
        let initial = machine.initial;
        Self {
            machine,
            current: initial,
            epoch: 0,
            last_event: Json::Null,
        }
    }

    /// The machine this interpreter runs.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Name of the current state.
    pub fn current_state(&self) -> &str {
        &self.machine.state(self.current).name
    }

    /// Whether the current state is final.
    pub fn in_final_state(&self) -> bool {
        self.machine.state(self.current).is_final
    }

    /// Runs the initial state's entry actions and installs its `after`
    /// timers. Call exactly once, before the first event.
    pub fn start(&mut self, ctx: &mut ActionCtx<'_>) {
        ctx.event = Json::Null;
        let machine = Arc::clone(&self.machine);
        self.enter(&machine, self.current, ctx);
        tracing::debug!(
            machine = %machine.id,
            state = %self.current_state(),
            "interpreter started"
        );
    }

    /// Dispatches one inbound event.
    ///
    /// Returns `true` when a transition was selected (state change or
    /// internal); `false` when the event was ignored — no handler in the
    /// current state, or every candidate's guard said no.
    pub fn send(&mut self, event: Json, ctx: &mut ActionCtx<'_>) -> bool {
        let event_type = match event.get("type").and_then(Json::as_str) {
            Some(t) => t.to_string(),
            None => {
                tracing::debug!("event without a type, ignoring");
                return false;
            }
        };

        self.last_event = event;
        ctx.event = self.last_event.clone();

        let machine = Arc::clone(&self.machine);
        let node = machine.state(self.current);
        let Some(candidates) = node.transitions_for(&event_type) else {
            tracing::debug!(
                state = %node.name,
                event = %event_type,
                "no handler in current state, ignoring"
            );
            return false;
        };

        let view = self.guard_view(ctx);
        let Some(transition) = select_transition(candidates, &view) else {
            tracing::debug!(
                state = %node.name,
                event = %event_type,
                "no candidate guard passed, ignoring"
            );
            return false;
        };

        tracing::debug!(
            state = %node.name,
            event = %event_type,
            internal = transition.target.is_none(),
            "transition selected"
        );
        self.take(&machine, transition, ctx);
        true
    }

    /// Handles a due timer from the room's scheduler.
    ///
    /// Returns `true` when anything ran. Stale `after` entries — installed
    /// by a state the machine has since left — are dropped silently.
    pub fn on_timer(&mut self, task: TimerTask, ctx: &mut ActionCtx<'_>) -> bool {
        match task {
            TimerTask::After { state, epoch, index } => {
                if state != self.current || epoch != self.epoch {
                    tracing::trace!("stale after timer, dropping");
                    return false;
                }

                ctx.event = self.last_event.clone();
                let machine = Arc::clone(&self.machine);
                let entry = &machine.state(state).after[index];
                let view = self.guard_view(ctx);
                match select_transition(&entry.transitions, &view) {
                    Some(transition) => {
                        tracing::debug!(
                            state = %machine.state(state).name,
                            delay_ms = entry.delay_ms,
                            "after transition firing"
                        );
                        self.take(&machine, transition, ctx);
                        true
                    }
                    None => false,
                }
            }
            TimerTask::Batch { actions, event } => {
                // Template against the event that scheduled the batch.
                ctx.event = event;
                run_actions(&actions, ctx);
                true
            }
        }
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Guard view: `{event, context, state, data}` with state as plain data.
    fn guard_view(&self, ctx: &ActionCtx<'_>) -> Json {
        json!({
            "event": self.last_event,
            "context": ctx.context,
            "state": ctx.state.to_json(),
            "data": ctx.data,
        })
    }

    fn take(&mut self, machine: &Machine, transition: &Transition, ctx: &mut ActionCtx<'_>) {
        // Exit actions only run when the transition actually leaves the
        // state; internal transitions keep timers and skip exit/entry.
        if transition.target.is_some() {
            let exit = &machine.state(self.current).exit;
            run_actions(exit, ctx);
        }

        run_actions(&transition.actions, ctx);

        if let Some(target) = transition.target {
            self.enter(machine, target, ctx);
        }
    }

    fn enter(&mut self, machine: &Machine, target: StateId, ctx: &mut ActionCtx<'_>) {
        self.current = target;
        // New epoch: anything the previous state scheduled via `after` is
        // now stale.
        self.epoch += 1;

        let node = machine.state(target);
        tracing::debug!(state = %node.name, "entering state");
        run_actions(&node.entry, ctx);

        for (index, after) in node.after.iter().enumerate() {
            ctx.scheduler.schedule(
                ctx.now_ms + after.delay_ms,
                TimerTask::After {
                    state: target,
                    epoch: self.epoch,
                    index,
                },
            );
        }
    }
}

/// First transition whose guard passes, in declaration order. A guard that
/// fails to evaluate counts as false and the search continues.
fn select_transition<'t>(candidates: &'t [Transition], view: &Json) -> Option<&'t Transition> {
    for transition in candidates {
        match &transition.cond {
            None => return Some(transition),
            Some(cond) => match eval_bool(cond, view) {
                Ok(true) => return Some(transition),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "guard failed to evaluate, treating as false");
                }
            },
        }
    }
    None
}

// =========================================================================
// Tests
// =========================================================================
