//! Cross-reference validation for loaded definitions.
//!
//! Runs after parsing and before any room machinery is built. Checks are
//! fail-fast: the first violation aborts with a reason naming the offending
//! class, field, state, or action so definition authors can fix it without
//! spelunking.

use crate::types::{ActionDef, FieldDef, GameDefinition, StateDef};
use crate::{DefinitionError, PrimitiveName};

/// Validates a parsed definition.
///
/// Checks, in order:
/// - `id` is non-empty
/// - `data` and `machine.context` are JSON objects
/// - `schema.classes` is non-empty and `schema.root` names one of them
/// - every `ref`/`map` field names a declared class; every `array` element
///   type names a declared class or one of the three primitives
/// - `defaults` keys name declared classes
/// - `machine.initial` and every transition `target` name a declared state
/// - every `after` key parses as a non-negative millisecond count
/// - when the advisory `actions` allowlist is present, every action name the
///   machine uses appears in it
pub fn validate(def: &GameDefinition) -> Result<(), DefinitionError> {
    if def.id.is_empty() {
        return invalid("definition id must not be empty");
    }
    if !def.data.is_object() {
        return invalid("`data` must be a JSON object");
    }
    if !def.machine.context.is_object() {
        return invalid("`machine.context` must be a JSON object");
    }

    validate_schema(def)?;
    validate_machine(def)?;
    validate_allowlist(def)?;
    Ok(())
}

fn invalid(reason: impl Into<String>) -> Result<(), DefinitionError> {
    Err(DefinitionError::Invalid(reason.into()))
}

// ---------------------------------------------------------------------------
// Schema checks
// ---------------------------------------------------------------------------

fn validate_schema(def: &GameDefinition) -> Result<(), DefinitionError> {
    let schema = &def.schema;

    if schema.classes.is_empty() {
        return invalid("`schema.classes` must declare at least one class");
    }
    if !schema.classes.contains_key(&schema.root) {
        return invalid(format!(
            "`schema.root` names undeclared class `{}`",
            schema.root
        ));
    }

    for (class, fields) in &schema.classes {
        for (field, ty) in fields {
            let referenced = match ty {
                FieldDef::Primitive { .. } => continue,
                FieldDef::Ref { class } => class,
                FieldDef::Map { map } => map,
                FieldDef::Array { array } => {
                    if PrimitiveName::parse(array).is_some() {
                        continue;
                    }
                    array
                }
            };
            if !schema.classes.contains_key(referenced) {
                return invalid(format!(
                    "field `{class}.{field}` references undeclared class `{referenced}`"
                ));
            }
        }
    }

    for class in schema.defaults.keys() {
        if !schema.classes.contains_key(class) {
            return invalid(format!(
                "`schema.defaults` names undeclared class `{class}`"
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Machine checks
// ---------------------------------------------------------------------------

fn validate_machine(def: &GameDefinition) -> Result<(), DefinitionError> {
    let machine = &def.machine;

    if !machine.states.contains_key(&machine.initial) {
        return invalid(format!(
            "`machine.initial` names undeclared state `{}`",
            machine.initial
        ));
    }

    for (name, state) in &machine.states {
        for (event, transitions) in &state.on {
            for t in transitions.iter() {
                check_target(machine, name, &format!("on.{event}"), t.target.as_deref())?;
            }
        }
        for (delay, transitions) in &state.after {
            if delay.parse::<u64>().is_err() {
                return invalid(format!(
                    "state `{name}` has non-numeric `after` delay `{delay}`"
                ));
            }
            for t in transitions.iter() {
                check_target(machine, name, &format!("after.{delay}"), t.target.as_deref())?;
            }
        }
    }

    Ok(())
}

fn check_target(
    machine: &crate::MachineDef,
    state: &str,
    site: &str,
    target: Option<&str>,
) -> Result<(), DefinitionError> {
    if let Some(target) = target {
        if !machine.states.contains_key(target) {
            return invalid(format!(
                "transition `{state}.{site}` targets undeclared state `{target}`"
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Advisory action allowlist
// ---------------------------------------------------------------------------

fn validate_allowlist(def: &GameDefinition) -> Result<(), DefinitionError> {
    let Some(allowed) = &def.actions else {
        return Ok(());
    };

    for (state, node) in &def.machine.states {
        for action in state_actions(node) {
            if !allowed.iter().any(|a| a == action.name()) {
                return invalid(format!(
                    "state `{state}` uses action `{}` not in the `actions` allowlist",
                    action.name()
                ));
            }
        }
    }
    Ok(())
}

/// All action descriptors reachable from a state node: entry, exit, and
/// every transition's actions. Nested `when`/`scheduleActions` payloads are
/// opaque parameter data at this layer and are not descended into.
fn state_actions(node: &StateDef) -> Vec<&ActionDef> {
    let mut out = Vec::new();
    for list in [&node.entry, &node.exit].into_iter().flatten() {
        out.extend(list.iter());
    }
    for transitions in node.on.values().chain(node.after.values()) {
        for t in transitions.iter() {
            if let Some(actions) = &t.actions {
                out.extend(actions.iter());
            }
        }
    }
    out
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(v: serde_json::Value) -> GameDefinition {
        serde_json::from_value(v).unwrap()
    }

    fn minimal() -> serde_json::Value {
        json!({
            "id": "t",
            "schema": {"root": "S", "classes": {"S": {"n": {"type": "number"}}}},
            "machine": {"initial": "a", "states": {"a": {}}}
        })
    }

    #[test]
    fn test_minimal_definition_is_valid() {
        assert!(validate(&def(minimal())).is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut v = minimal();
        v["id"] = json!("");
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_root_must_be_declared() {
        let mut v = minimal();
        v["schema"]["root"] = json!("Missing");
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_field_ref_must_be_declared() {
        let mut v = minimal();
        v["schema"]["classes"]["S"]["q"] = json!({"ref": "Question"});
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("S.q"));
        assert!(err.to_string().contains("Question"));
    }

    #[test]
    fn test_array_of_primitive_is_valid() {
        let mut v = minimal();
        v["schema"]["classes"]["S"]["tags"] = json!({"array": "string"});
        assert!(validate(&def(v)).is_ok());
    }

    #[test]
    fn test_array_of_unknown_class_rejected() {
        let mut v = minimal();
        v["schema"]["classes"]["S"]["xs"] = json!({"array": "Thing"});
        assert!(validate(&def(v)).is_err());
    }

    #[test]
    fn test_defaults_for_unknown_class_rejected() {
        let mut v = minimal();
        v["schema"]["defaults"] = json!({"Ghost": {"n": 1}});
        assert!(validate(&def(v)).is_err());
    }

    #[test]
    fn test_initial_must_be_declared() {
        let mut v = minimal();
        v["machine"]["initial"] = json!("nowhere");
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_transition_target_must_be_declared() {
        let mut v = minimal();
        v["machine"]["states"]["a"]["on"] = json!({"go": {"target": "b"}});
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("a.on.go"));
    }

    #[test]
    fn test_after_delay_must_be_numeric() {
        let mut v = minimal();
        v["machine"]["states"]["a"]["after"] = json!({"soon": {}});
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_allowlist_accepts_listed_actions() {
        let mut v = minimal();
        v["machine"]["states"]["a"]["entry"] =
            json!({"type": "log", "params": {"message": "hi"}});
        v["actions"] = json!(["log"]);
        assert!(validate(&def(v)).is_ok());
    }

    #[test]
    fn test_allowlist_rejects_unlisted_actions() {
        let mut v = minimal();
        v["machine"]["states"]["a"]["entry"] =
            json!({"type": "broadcast", "params": {"event": "x"}});
        v["actions"] = json!(["log"]);
        let err = validate(&def(v)).unwrap_err();
        assert!(err.to_string().contains("broadcast"));
    }

    #[test]
    fn test_no_allowlist_means_no_action_check() {
        let mut v = minimal();
        v["machine"]["states"]["a"]["entry"] =
            json!({"type": "anythingGoes", "params": {}});
        assert!(validate(&def(v)).is_ok());
    }
}
