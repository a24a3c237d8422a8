//! Game definition model for Playcast.
//!
//! A *definition* is the declarative, data-only description of a game that a
//! room loads at creation: a state schema, a statechart, and a bank of static
//! game data. This crate defines the serde model for that JSON document, a
//! loader (inline or from a definitions directory), and cross-reference
//! validation.
//!
//! Definitions are pure data — there is no code in them and nothing here
//! executes anything. Interpretation happens in the machine and room layers.
//!
//! ```text
//! definition (this crate) → schema builder → statechart interpreter → room
//! ```

mod error;
mod loader;
mod types;
mod validate;

pub use error::DefinitionError;
pub use loader::{load_definition, LoadOptions};
pub use types::{
    ActionDef, FieldDef, GameDefinition, MachineDef, OneOrMany, PrimitiveName,
    SchemaDef, StateDef, TransitionDef,
};
pub use validate::validate;
