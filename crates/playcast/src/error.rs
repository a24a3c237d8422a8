//! Unified error type for the Playcast host.

use playcast_definition::DefinitionError;
use playcast_logic::LogicError;
use playcast_machine::MachineError;
use playcast_room::RoomError;
use playcast_schema::SchemaError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `playcast` meta-crate, you deal with this single error
/// type; the `#[from]` conversions let `?` lift sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlaycastError {
    /// Definition loading or validation failed.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Schema building or state navigation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A logic tree failed to evaluate.
    #[error(transparent)]
    Logic(#[from] LogicError),

    /// Machine compilation or action execution failed.
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// A room operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),
}
