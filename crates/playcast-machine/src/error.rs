//! Error types for machine compilation and action execution.

use playcast_logic::LogicError;
use playcast_schema::SchemaError;

/// Errors from compiling a machine or running actions.
///
/// Compilation errors are fatal for room creation. Action errors degrade
/// exactly one action: the runtime logs them and moves on to the sibling,
/// so a misbehaving definition never takes the room down.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// The machine references a state it never declares.
    #[error("machine has no state named `{0}`")]
    UnknownState(String),

    /// A transition targets a state that is not declared.
    #[error("transition in state `{state}` targets unknown state `{target}`")]
    UnknownTarget { state: String, target: String },

    /// An `after` key did not parse as milliseconds.
    #[error("state `{state}` has non-numeric after delay `{delay}`")]
    BadDelay { state: String, delay: String },

    /// An action name outside the fixed catalogue.
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// A required action parameter is missing or has the wrong shape.
    #[error("action `{action}` is missing parameter `{param}`")]
    MissingParam {
        action: &'static str,
        param: &'static str,
    },

    /// A data path an action depends on resolved to nothing.
    #[error("action `{action}` found no value at `{path}`")]
    MissingData { action: &'static str, path: String },

    /// A state write failed (bad path, undeclared field, unknown class).
    #[error("action `{action}`: {source}")]
    State {
        action: &'static str,
        #[source]
        source: SchemaError,
    },

    /// A logic tree failed to evaluate.
    #[error(transparent)]
    Logic(#[from] LogicError),
}
