//! Room hosting for Playcast.
//!
//! A room is one independent instance of the data-driven host: it loads a
//! game definition, builds the replicated-state classes, instantiates the
//! root state, and drives the statechart interpreter with inbound client
//! events and due timers. Each room runs in its own Tokio task (actor
//! model) and owns its state, interpreter, class table, and clock — nothing
//! is shared across rooms, so no locks guard state mutations.
//!
//! ```text
//! RoomManager ──RoomHandle──▶ room actor task
//!                               │ select! { command | next timer }
//!                               ▼
//!                        Interpreter / actions
//!                               │
//!                               ├──▶ per-player senders (snapshots, broadcasts)
//!                               └──▶ Scheduler (deferred batches, after timers)
//! ```

mod error;
mod manager;
mod options;
mod room;

pub use error::RoomError;
pub use manager::RoomManager;
pub use options::RoomOptions;
pub use room::{
    spawn_room, ClientSender, RoomHandle, RoomId, RoomInfo, RoomOutbound,
    SessionId,
};
