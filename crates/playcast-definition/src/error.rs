//! Error types for definition loading and validation.

/// Errors that can occur while loading or validating a game definition.
///
/// Every variant carries a human-readable reason. A definition error is
/// always fatal for room creation — a room never starts with a definition
/// it could not fully resolve.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// The definition file could not be read from disk.
    #[error("failed to read definition file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The definition is not valid JSON, or does not match the DSL shape.
    #[error("definition is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The definition parsed but failed a cross-reference or shape check.
    #[error("invalid definition: {0}")]
    Invalid(String),

    /// Neither an inline definition nor a definition id was supplied.
    #[error("no inline definition and no definition id to load from disk")]
    MissingSource,
}
