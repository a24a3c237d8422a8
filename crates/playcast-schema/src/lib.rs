//! Runtime schema builder and replicated-state values for Playcast.
//!
//! A definition's `schema` section declares classes with typed fields. This
//! crate turns that DSL into a table of immutable class descriptors and a
//! dynamic state tree the rest of the host mutates:
//!
//! ```text
//! SchemaDef ──build──▶ ClassTable ──instantiate──▶ Value (state tree)
//! ```
//!
//! Instances are records tagged with their class name; the set of declared
//! fields is fixed at build time, so a write to an undeclared field is an
//! error rather than a silent extension. Keyed collections (`map` fields)
//! and ordered collections (`array` fields) participate in dotted-path
//! navigation alongside record fields, which is what lets action parameters
//! template paths like `players.<sid>.score` uniformly.

mod class;
mod error;
mod path;
mod value;

pub use class::{ClassDescriptor, ClassTable, ElementKind, FieldKind};
pub use error::SchemaError;
pub use path::{get_path, remove_path, set_path};
pub use value::{Record, Value};
