//! # Playcast
//!
//! A generic, data-driven multiplayer room host. A room loads a JSON *game
//! definition* at creation and thereafter behaves entirely according to
//! that definition: it generates the replicated-state shape at runtime,
//! interprets a declarative statechart, dispatches client messages as
//! statechart events, executes a whitelisted catalogue of actions against
//! the state, and schedules delayed work on the room's logical clock.
//! Clients observe state and send events; the host is authoritative.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use playcast::prelude::*;
//! use serde_json::json;
//!
//! # async fn demo(definition: serde_json::Value) -> Result<(), PlaycastError> {
//! let mut rooms = RoomManager::new();
//! let room = rooms.create_room(RoomOptions::inline(definition))?;
//!
//! let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
//! rooms.join_room(SessionId::new("alice"), room, Some("Alice".into()), tx).await?;
//! rooms.route_message(SessionId::new("alice"), "start", json!({})).await?;
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::PlaycastError;

/// Re-exports everything a host embedder needs.
///
/// ```rust
/// use playcast::prelude::*;
/// ```
pub mod prelude {
    // Meta-crate
    pub use crate::PlaycastError;

    // Definition types
    pub use playcast_definition::{
        load_definition, DefinitionError, GameDefinition, LoadOptions,
    };

    // Schema types
    pub use playcast_schema::{ClassTable, SchemaError, Value};

    // Logic types
    pub use playcast_logic::LogicError;

    // Machine types
    pub use playcast_machine::{
        Interpreter, Machine, MachineError, Scheduler, ACTION_CATALOGUE,
    };

    // Room types
    pub use playcast_room::{
        ClientSender, RoomError, RoomHandle, RoomId, RoomInfo, RoomManager,
        RoomOptions, RoomOutbound, SessionId,
    };
}
