//! Error types for the room layer.

use playcast_definition::DefinitionError;
use playcast_machine::MachineError;
use playcast_schema::SchemaError;

use crate::{RoomId, SessionId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The session is already in a room.
    #[error("session {0} is already in room {1}")]
    AlreadyInRoom(SessionId, RoomId),

    /// The session is not in any room.
    #[error("session {0} is not in a room")]
    NotInRoom(SessionId),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The definition failed to load or validate. Fatal at creation.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The schema failed to build. Fatal at creation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The machine failed to compile. Fatal at creation.
    #[error(transparent)]
    Machine(#[from] MachineError),
}
