//! Definition loading: inline value first, definitions directory second.

use std::path::PathBuf;

use serde_json::Value as Json;

use crate::{validate, DefinitionError, GameDefinition};

/// Where to find a definition.
///
/// An inline `definition` wins when supplied; otherwise `definition_id`
/// names a file `<definitions_dir>/<id>.json`.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Full definition supplied inline (e.g. from room-creation options).
    pub definition: Option<Json>,

    /// Id of a definition to read from the definitions directory.
    pub definition_id: Option<String>,

    /// Directory holding `<id>.json` files. Defaults to `./definitions`.
    pub definitions_dir: Option<PathBuf>,
}

/// Loads and validates a game definition.
///
/// # Errors
/// - [`DefinitionError::MissingSource`] when neither an inline definition
///   nor a definition id is supplied
/// - [`DefinitionError::Io`] / [`DefinitionError::Parse`] on unreadable or
///   malformed files
/// - [`DefinitionError::Invalid`] when validation fails
pub fn load_definition(opts: LoadOptions) -> Result<GameDefinition, DefinitionError> {
    let def: GameDefinition = match (opts.definition, opts.definition_id) {
        (Some(inline), _) => serde_json::from_value(inline)?,
        (None, Some(id)) => {
            let dir = opts
                .definitions_dir
                .unwrap_or_else(|| PathBuf::from("definitions"));
            let path = dir.join(format!("{id}.json"));
            let text = std::fs::read_to_string(&path).map_err(|source| {
                DefinitionError::Io {
                    path: path.display().to_string(),
                    source,
                }
            })?;
            serde_json::from_str(&text)?
        }
        (None, None) => return Err(DefinitionError::MissingSource),
    };

    validate(&def)?;
    tracing::debug!(
        definition_id = %def.id,
        classes = def.schema.classes.len(),
        states = def.machine.states.len(),
        "definition loaded"
    );
    Ok(def)
}

// =========================================================================
// Tests
// =========================================================================
