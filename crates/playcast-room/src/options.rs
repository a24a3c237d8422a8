//! Room creation options.

use std::path::PathBuf;

use playcast_definition::LoadOptions;
use serde_json::Value as Json;

/// Options supplied when creating a room.
///
/// Either `definition` carries the full definition inline, or
/// `definition_id` names one resolvable from the definitions directory.
/// `config` is opaque per-room data surfaced to guards and actions as
/// `context.config`.
#[derive(Debug, Clone, Default)]
pub struct RoomOptions {
    /// Owning project, when a registry sits above the host. Informational.
    pub project_id: Option<String>,

    /// Id of a definition to load from disk.
    pub definition_id: Option<String>,

    /// Requested definition version. Informational.
    pub version: Option<String>,

    /// Full definition supplied inline. Wins over `definition_id`.
    pub definition: Option<Json>,

    /// Opaque per-room configuration, exposed under `context.config`.
    pub config: Option<Json>,

    /// Directory for `<definition_id>.json` lookups. Defaults to
    /// `./definitions`.
    pub definitions_dir: Option<PathBuf>,
}

impl RoomOptions {
    /// Options carrying a full inline definition.
    pub fn inline(definition: Json) -> Self {
        Self {
            definition: Some(definition),
            ..Default::default()
        }
    }

    /// Options naming a definition to load from disk.
    pub fn from_id(definition_id: impl Into<String>) -> Self {
        Self {
            definition_id: Some(definition_id.into()),
            ..Default::default()
        }
    }

    /// Sets the per-room config.
    pub fn with_config(mut self, config: Json) -> Self {
        self.config = Some(config);
        self
    }

    pub(crate) fn load_options(&self) -> LoadOptions {
        LoadOptions {
            definition: self.definition.clone(),
            definition_id: self.definition_id.clone(),
            definitions_dir: self.definitions_dir.clone(),
        }
    }
}
