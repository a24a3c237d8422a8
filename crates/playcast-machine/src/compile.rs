//! Compiling a machine definition into an immutable runtime form.
//!
//! Compilation resolves state names to indices, normalizes one-or-many
//! spots into vectors, parses `after` delays, and collects the union of
//! event names — so the hot path never re-parses JSON or chases strings.
//! Transitions are plain immutable values; the interpreter carries the only
//! mutable cursor.

use std::collections::{BTreeSet, HashMap};

use playcast_definition::{ActionDef, MachineDef, OneOrMany, TransitionDef};
use serde_json::Value as Json;

use crate::MachineError;

// ---------------------------------------------------------------------------
// Ids and specs
// ---------------------------------------------------------------------------

/// Index of a state within its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

/// A named action with its raw (unrendered) parameter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub name: String,
    pub params: Json,
}

impl ActionSpec {
    /// Parses one action descriptor from raw JSON: either a bare name or
    /// `{"type": name, "params": {…}}`. Used both at compile time and at
    /// runtime for the nested lists inside `when`/`scheduleActions`.
    pub fn from_json(raw: &Json) -> Option<ActionSpec> {
        match raw {
            Json::String(name) => Some(ActionSpec {
                name: name.clone(),
                params: Json::Null,
            }),
            Json::Object(map) => {
                let name = map.get("type")?.as_str()?.to_string();
                let params = map.get("params").cloned().unwrap_or(Json::Null);
                Some(ActionSpec { name, params })
            }
            _ => None,
        }
    }

    /// Parses a list of action descriptors, dropping malformed entries.
    pub fn parse_list(raw: &Json) -> Vec<ActionSpec> {
        let items = match raw {
            Json::Array(items) => items.as_slice(),
            Json::Null => &[],
            single => std::slice::from_ref(single),
        };
        items
            .iter()
            .filter_map(|item| {
                let spec = ActionSpec::from_json(item);
                if spec.is_none() {
                    tracing::warn!(?item, "ignoring malformed action descriptor");
                }
                spec
            })
            .collect()
    }

    fn from_def(def: &ActionDef) -> ActionSpec {
        ActionSpec {
            name: def.name().to_string(),
            params: def.params().clone(),
        }
    }
}

/// A compiled transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Target state; `None` marks an internal transition.
    pub target: Option<StateId>,
    pub actions: Vec<ActionSpec>,
    /// Guard tree, evaluated over `{event, context, state, data}`.
    pub cond: Option<Json>,
}

/// One delayed-transition entry of a state.
#[derive(Debug, Clone)]
pub struct AfterEntry {
    pub delay_ms: u64,
    pub transitions: Vec<Transition>,
}

/// A compiled state node.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub name: String,
    on: Vec<(String, Vec<Transition>)>,
    pub after: Vec<AfterEntry>,
    pub entry: Vec<ActionSpec>,
    pub exit: Vec<ActionSpec>,
    pub is_final: bool,
}

impl StateNode {
    /// Candidate transitions for an event, in declaration order.
    pub fn transitions_for(&self, event: &str) -> Option<&[Transition]> {
        self.on
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, t)| t.as_slice())
    }

    /// Event names this state reacts to.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.on.iter().map(|(name, _)| name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// An immutable, compiled statechart.
#[derive(Debug)]
pub struct Machine {
    pub id: String,
    pub initial: StateId,
    /// Server-only context object from the definition.
    pub context: Json,
    states: Vec<StateNode>,
    events: BTreeSet<String>,
}

impl Machine {
    /// Compiles a machine definition.
    ///
    /// # Errors
    /// [`MachineError::UnknownState`] / [`MachineError::UnknownTarget`] /
    /// [`MachineError::BadDelay`] on unresolved names or bad delays. The
    /// definition layer validates the same properties up front; compiling
    /// re-checks because a `Machine` can also be built from a raw
    /// `MachineDef` in tests and tools.
    pub fn compile(def: &MachineDef) -> Result<Machine, MachineError> {
        // Names resolve against the full state set, so index first.
        let index: HashMap<&str, StateId> = def
            .states
            .keys()
            .enumerate()
            .map(|(i, name)| (name.as_str(), StateId(i)))
            .collect();

        let initial = *index
            .get(def.initial.as_str())
            .ok_or_else(|| MachineError::UnknownState(def.initial.clone()))?;

        let mut states = Vec::with_capacity(def.states.len());
        let mut events = BTreeSet::new();

        for (name, node) in &def.states {
            let mut on = Vec::new();
            for (event, transitions) in &node.on {
                events.insert(event.clone());
                on.push((
                    event.clone(),
                    compile_transitions(&index, name, transitions)?,
                ));
            }

            let mut after = Vec::new();
            for (delay, transitions) in &node.after {
                let delay_ms =
                    delay.parse::<u64>().map_err(|_| MachineError::BadDelay {
                        state: name.clone(),
                        delay: delay.clone(),
                    })?;
                after.push(AfterEntry {
                    delay_ms,
                    transitions: compile_transitions(&index, name, transitions)?,
                });
            }
            // Fire shorter delays first when several are due together.
            after.sort_by_key(|entry| entry.delay_ms);

            states.push(StateNode {
                name: name.clone(),
                on,
                after,
                entry: compile_actions(&node.entry),
                exit: compile_actions(&node.exit),
                is_final: node.is_final(),
            });
        }

        Ok(Machine {
            id: def.id.clone(),
            initial,
            context: def.context.clone(),
            states,
            events,
        })
    }

    /// The state node for an id.
    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0]
    }

    /// Resolves a state name.
    pub fn state_named(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(StateId)
    }

    /// Union of event names across every state's `on` map. This is exactly
    /// the set of message types a room host may accept for this machine.
    pub fn events(&self) -> &BTreeSet<String> {
        &self.events
    }

    /// Whether any state handles the event type.
    pub fn handles_event(&self, event: &str) -> bool {
        self.events.contains(event)
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

fn compile_transitions(
    index: &HashMap<&str, StateId>,
    state: &str,
    transitions: &OneOrMany<TransitionDef>,
) -> Result<Vec<Transition>, MachineError> {
    transitions
        .iter()
        .map(|t| {
            let target = match &t.target {
                Some(name) => Some(*index.get(name.as_str()).ok_or_else(|| {
                    MachineError::UnknownTarget {
                        state: state.to_string(),
                        target: name.clone(),
                    }
                })?),
                None => None,
            };
            Ok(Transition {
                target,
                actions: compile_actions(&t.actions),
                cond: t.cond.clone(),
            })
        })
        .collect()
}

fn compile_actions(actions: &Option<OneOrMany<ActionDef>>) -> Vec<ActionSpec> {
    actions
        .iter()
        .flat_map(|list| list.iter())
        .map(ActionSpec::from_def)
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
