//! Statechart interpretation for Playcast rooms.
//!
//! This crate is the engine behind a data-driven room: it compiles a
//! definition's `machine` section into an immutable [`Machine`], drives it
//! with an [`Interpreter`], and executes the whitelisted action catalogue
//! against the replicated state.
//!
//! ```text
//! event ──▶ Interpreter::send ──▶ guard? ──▶ exit / transition / entry
//!                                               │
//!                                               ▼ (per action)
//!                              render params ──▶ action runtime ──▶ state
//!                                               │
//!                                               ├──▶ Outbox (broadcasts)
//!                                               └──▶ Scheduler (delays)
//! ```
//!
//! The interpreter never mutates state directly — every write flows through
//! an action, and every action's parameters are token-rendered against the
//! current `{event, state, context, data}` view first. Deferred work
//! (`after` transitions, `scheduleActions` batches) lands in the
//! [`Scheduler`], a passive priority queue the owning room drains from its
//! own loop; this crate is fully synchronous.

mod actions;
mod compile;
mod error;
mod interpreter;
mod scheduler;

pub use actions::{run_actions, ActionCtx, Broadcast, Outbox, ACTION_CATALOGUE};
pub use compile::{ActionSpec, AfterEntry, Machine, StateId, StateNode, Transition};
pub use error::MachineError;
pub use interpreter::Interpreter;
pub use scheduler::{Scheduler, TimerTask};
