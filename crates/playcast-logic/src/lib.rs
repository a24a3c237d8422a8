//! Logic-tree evaluation and token templating for Playcast definitions.
//!
//! Guards and conditional actions in a definition are JSON trees of
//! operator nodes, `{"op": [args…]}`, evaluated over a plain-data view of
//! `{event, state, context, data}`. Action parameters use `${dotted.path}`
//! placeholders expanded against the same view. Both are pure functions of
//! their inputs — nothing here touches live state.

mod error;
mod eval;
mod template;

pub use error::LogicError;
pub use eval::{eval, eval_bool, lookup, truthy};
pub use template::render;
