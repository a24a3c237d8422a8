//! Error types for schema building and state navigation.

/// Errors from building a class table or mutating the state tree.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A class name was looked up that the schema never declared.
    #[error("unknown class `{0}`")]
    UnknownClass(String),

    /// The schema's root names a class that is not declared.
    #[error("`schema.root` names undeclared class `{0}`")]
    UnknownRoot(String),

    /// A field's type references a class the schema never declared.
    #[error("field `{class}.{field}` references undeclared class `{referenced}`")]
    BadFieldRef {
        class: String,
        field: String,
        referenced: String,
    },

    /// A write targeted a field the instance's class does not declare.
    /// Declared field sets are fixed at build time.
    #[error("class `{class}` has no declared field `{field}`")]
    UndeclaredField { class: String, field: String },

    /// A path tried to descend through a value that is not a container.
    #[error("path segment `{0}` does not traverse a container")]
    NotAContainer(String),

    /// A path indexed past the end of an array.
    #[error("array index `{0}` is out of bounds")]
    IndexOutOfBounds(String),
}
