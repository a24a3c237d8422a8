//! Serde model of the game definition DSL.
//!
//! The definition document has four parts:
//!
//! - `schema` — the replicated-state shape: named classes with typed fields.
//! - `machine` — a hierarchical statechart: states, events, guarded
//!   transitions, entry/exit actions, delayed transitions.
//! - `data` — free-form static game data (question banks, prize tables)
//!   visible to guards and actions as `data.*`.
//! - `actions` — an optional advisory allowlist of action names the machine
//!   is permitted to use.
//!
//! The JSON shapes here are stable: a definition produced against the DSL
//! parses unchanged. Unit tests at the bottom pin the accepted forms.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as Json;

fn empty_object() -> Json {
    Json::Object(serde_json::Map::new())
}

// ---------------------------------------------------------------------------
// GameDefinition
// ---------------------------------------------------------------------------

/// A complete game definition, read-only after load.
#[derive(Debug, Clone, Deserialize)]
pub struct GameDefinition {
    /// Stable identifier, also the file stem when loaded from disk.
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Definition version string. Informational only.
    #[serde(default)]
    pub version: String,

    /// The replicated-state DSL.
    pub schema: SchemaDef,

    /// The statechart.
    pub machine: MachineDef,

    /// Static game data, exposed to guards and actions as `data.*`.
    /// Must be a JSON object when present.
    #[serde(default = "empty_object")]
    pub data: Json,

    /// Advisory allowlist of action names used by the machine.
    #[serde(default)]
    pub actions: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Schema DSL
// ---------------------------------------------------------------------------

/// The state schema: a set of classes and the name of the root class.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDef {
    /// Name of the class instantiated as the room's root state.
    pub root: String,

    /// Class declarations: class name → field name → field type.
    pub classes: BTreeMap<String, BTreeMap<String, FieldDef>>,

    /// Optional per-class primitive defaults, applied at instantiation.
    #[serde(default)]
    pub defaults: BTreeMap<String, Json>,
}

/// A field type in the schema DSL. Four shapes are accepted:
///
/// ```json
/// {"type": "string"}      // primitive: string | number | boolean
/// {"ref": "Question"}     // single nested instance
/// {"map": "Player"}       // keyed collection of instances
/// {"array": "string"}     // ordered collection (class or primitive elems)
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldDef {
    /// A primitive field.
    Primitive {
        #[serde(rename = "type")]
        ty: PrimitiveName,
    },

    /// A single nested instance of the named class.
    Ref {
        #[serde(rename = "ref")]
        class: String,
    },

    /// A keyed collection of instances of the named class.
    Map { map: String },

    /// An ordered collection. The element name resolves to a declared class
    /// or to one of the three primitive names.
    Array { array: String },
}

/// The three primitive field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveName {
    String,
    Number,
    Boolean,
}

impl PrimitiveName {
    /// Parses a primitive name from its DSL spelling.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Machine DSL
// ---------------------------------------------------------------------------

/// The statechart: an initial state, optional server-only context, and a
/// flat map of named states.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineDef {
    /// Machine identifier.
    #[serde(default)]
    pub id: String,

    /// Name of the state entered when the interpreter starts.
    pub initial: String,

    /// Server-only context object. Never replicated to clients.
    #[serde(default = "empty_object")]
    pub context: Json,

    /// State nodes, keyed by state name.
    pub states: BTreeMap<String, StateDef>,
}

/// One state node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateDef {
    /// External transitions: event name → transition(s).
    #[serde(default)]
    pub on: BTreeMap<String, OneOrMany<TransitionDef>>,

    /// Delayed transitions: delay in milliseconds (JSON keys are strings,
    /// parsed at compile time) → transition(s).
    #[serde(default)]
    pub after: BTreeMap<String, OneOrMany<TransitionDef>>,

    /// Actions run when the state is entered.
    #[serde(default)]
    pub entry: Option<OneOrMany<ActionDef>>,

    /// Actions run when the state is exited.
    #[serde(default)]
    pub exit: Option<OneOrMany<ActionDef>>,

    /// `"final"` marks an absorbing state.
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
}

impl StateDef {
    /// Whether this state is declared `"type": "final"`.
    pub fn is_final(&self) -> bool {
        self.ty.as_deref() == Some("final")
    }
}

/// A transition: optional target state, optional guard, optional actions.
///
/// A transition without a `target` is *internal* — its actions run but the
/// machine stays in the current state and `after` timers are untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionDef {
    /// Name of a sibling state to switch to.
    #[serde(default)]
    pub target: Option<String>,

    /// Actions to run when the transition is taken.
    #[serde(default)]
    pub actions: Option<OneOrMany<ActionDef>>,

    /// Guard: a logic tree evaluated over `{event, context, state, data}`.
    /// The transition is only taken when the tree evaluates truthy.
    #[serde(default)]
    pub cond: Option<Json>,
}

/// An action descriptor. Either a bare name for parameterless actions, or
/// the full `{"type": name, "params": {…}}` form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActionDef {
    /// `"log"` — shorthand for an action with no parameters.
    Name(String),

    /// `{"type": "setState", "params": {"path": "…", "value": …}}`
    Full {
        #[serde(rename = "type")]
        name: String,
        #[serde(default)]
        params: Json,
    },
}

impl ActionDef {
    /// The action's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(n) => n,
            Self::Full { name, .. } => name,
        }
    }

    /// The action's raw (unrendered) parameter tree. `Null` when absent.
    pub fn params(&self) -> &Json {
        match self {
            Self::Name(_) => &Json::Null,
            Self::Full { params, .. } => params,
        }
    }
}

// ---------------------------------------------------------------------------
// OneOrMany
// ---------------------------------------------------------------------------

/// Accepts a single value or a list wherever the DSL allows both, e.g.
/// `"entry": {…}` and `"entry": [{…}, {…}]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Normalizes to a vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }

    /// Borrowing iteration without normalizing.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            Self::One(v) => std::slice::from_ref(v).iter(),
            Self::Many(v) => v.iter(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Pin the JSON forms the DSL accepts. A parse regression here means
    //! existing definitions stop loading.

    use super::*;
    use serde_json::json;

    fn field(v: serde_json::Value) -> FieldDef {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_field_def_primitive_forms() {
        assert!(matches!(
            field(json!({"type": "string"})),
            FieldDef::Primitive { ty: PrimitiveName::String }
        ));
        assert!(matches!(
            field(json!({"type": "number"})),
            FieldDef::Primitive { ty: PrimitiveName::Number }
        ));
        assert!(matches!(
            field(json!({"type": "boolean"})),
            FieldDef::Primitive { ty: PrimitiveName::Boolean }
        ));
    }

    #[test]
    fn test_field_def_ref_map_array_forms() {
        assert!(matches!(
            field(json!({"ref": "Question"})),
            FieldDef::Ref { class } if class == "Question"
        ));
        assert!(matches!(
            field(json!({"map": "Player"})),
            FieldDef::Map { map } if map == "Player"
        ));
        assert!(matches!(
            field(json!({"array": "string"})),
            FieldDef::Array { array } if array == "string"
        ));
    }

    #[test]
    fn test_field_def_unknown_primitive_rejected() {
        let r: Result<FieldDef, _> =
            serde_json::from_value(json!({"type": "float"}));
        assert!(r.is_err());
    }

    #[test]
    fn test_action_def_bare_name() {
        let a: ActionDef = serde_json::from_value(json!("log")).unwrap();
        assert_eq!(a.name(), "log");
        assert!(a.params().is_null());
    }

    #[test]
    fn test_action_def_full_form() {
        let a: ActionDef = serde_json::from_value(json!({
            "type": "setState",
            "params": {"path": "phase", "value": "question"}
        }))
        .unwrap();
        assert_eq!(a.name(), "setState");
        assert_eq!(a.params()["path"], "phase");
    }

    #[test]
    fn test_transition_def_all_fields_optional() {
        let t: TransitionDef = serde_json::from_value(json!({})).unwrap();
        assert!(t.target.is_none());
        assert!(t.actions.is_none());
        assert!(t.cond.is_none());
    }

    #[test]
    fn test_one_or_many_accepts_both_forms() {
        let one: OneOrMany<TransitionDef> =
            serde_json::from_value(json!({"target": "active"})).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: OneOrMany<TransitionDef> = serde_json::from_value(json!([
            {"target": "a"},
            {"target": "b"}
        ]))
        .unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn test_state_def_final_flag() {
        let s: StateDef =
            serde_json::from_value(json!({"type": "final"})).unwrap();
        assert!(s.is_final());

        let s: StateDef = serde_json::from_value(json!({})).unwrap();
        assert!(!s.is_final());
    }

    #[test]
    fn test_machine_def_context_defaults_to_empty_object() {
        let m: MachineDef = serde_json::from_value(json!({
            "initial": "idle",
            "states": {"idle": {}}
        }))
        .unwrap();
        assert!(m.context.as_object().map(|o| o.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_full_definition_parses() {
        let def: GameDefinition = serde_json::from_value(json!({
            "id": "demo",
            "name": "Demo",
            "version": "1.0.0",
            "schema": {
                "root": "State",
                "classes": {
                    "State": {
                        "players": {"map": "Player"},
                        "title": {"type": "string"}
                    },
                    "Player": {
                        "name": {"type": "string"},
                        "score": {"type": "number"}
                    }
                },
                "defaults": {"State": {"title": "Demo"}}
            },
            "machine": {
                "id": "demo",
                "initial": "waiting",
                "states": {
                    "waiting": {
                        "on": {"start": {"target": "active"}}
                    },
                    "active": {
                        "entry": {"type": "log", "params": {"message": "go"}},
                        "after": {"3000": {"target": "done"}}
                    },
                    "done": {"type": "final"}
                }
            },
            "data": {"questions": []}
        }))
        .unwrap();

        assert_eq!(def.id, "demo");
        assert_eq!(def.schema.root, "State");
        assert_eq!(def.machine.initial, "waiting");
        assert_eq!(def.machine.states.len(), 3);
        assert!(def.machine.states["done"].is_final());
    }

    #[test]
    fn test_definition_data_defaults_to_empty_object() {
        let def: GameDefinition = serde_json::from_value(json!({
            "id": "d",
            "schema": {"root": "S", "classes": {"S": {}}},
            "machine": {"initial": "a", "states": {"a": {}}}
        }))
        .unwrap();
        assert!(def.data.is_object());
    }
}
