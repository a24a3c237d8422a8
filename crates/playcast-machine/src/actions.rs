//! The action runtime: a fixed catalogue of whitelisted operations.
//!
//! Actions are the only way anything mutates replicated state. Each
//! action's parameter tree is token-rendered against the current
//! `{event, state, context, data}` view immediately before dispatch — with
//! one exception: the nested action lists inside `when` and
//! `scheduleActions` stay raw, so their own parameters render later against
//! the view that is current when *they* run.
//!
//! A failing action degrades only itself: the runtime logs a warning and
//! the sibling actions still run.

use playcast_logic::{eval_bool, lookup, render};
use playcast_schema::{get_path, set_path, ClassTable, Value};
use serde_json::{json, Value as Json};

use crate::{ActionSpec, MachineError, Scheduler, TimerTask};

/// Every action name a definition may invoke. Anything else is skipped
/// with a warning at runtime.
pub const ACTION_CATALOGUE: &[&str] = &[
    "setState",
    "increment",
    "incrementIfEqual",
    "setFromData",
    "setFromArray",
    "createInstance",
    "createInstanceFromArray",
    "ensureInstanceAtPath",
    "when",
    "scheduleActions",
    "broadcast",
    "log",
];

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

/// A message emitted to every connected client.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub event: String,
    pub data: Json,
}

/// Side-channel output collected during a dispatch. The owning room drains
/// it after each event or timer.
#[derive(Debug, Default)]
pub struct Outbox {
    pub broadcasts: Vec<Broadcast>,
}

/// Everything one dispatch runs against: the mutable state tree, the
/// immutable definition pieces, the scheduler, and the event in scope.
pub struct ActionCtx<'a> {
    pub state: &'a mut Value,
    pub classes: &'a ClassTable,
    pub data: &'a Json,
    pub context: &'a Json,
    pub scheduler: &'a mut Scheduler,
    pub outbox: &'a mut Outbox,
    /// Current time on the room's logical clock, in milliseconds.
    pub now_ms: u64,
    /// The event token templates see as `event.*`. The interpreter sets
    /// this to the inbound event, or to a batch's snapshot when deferred
    /// actions fire.
    pub event: Json,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Runs a list of actions in order. Individual failures are logged and
/// skipped; siblings still run.
pub fn run_actions(specs: &[ActionSpec], ctx: &mut ActionCtx<'_>) {
    for spec in specs {
        if let Err(e) = run_one(spec, ctx) {
            tracing::warn!(action = %spec.name, error = %e, "action failed, skipping");
        }
    }
}

fn run_one(spec: &ActionSpec, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let params = render_params(spec, ctx);
    match spec.name.as_str() {
        "setState" => set_state(&params, ctx),
        "increment" => increment(&params, ctx),
        "incrementIfEqual" => increment_if_equal(&params, ctx),
        "setFromData" => set_from_data(&params, ctx),
        "setFromArray" => set_from_array(&params, ctx),
        "createInstance" => create_instance(&params, ctx, false),
        "createInstanceFromArray" => create_instance_from_array(&params, ctx),
        "ensureInstanceAtPath" => create_instance(&params, ctx, true),
        "when" => when(&params, ctx),
        "scheduleActions" => schedule_actions(&params, ctx),
        "broadcast" => broadcast(&params, ctx),
        "log" => {
            let message = text(params.get("message").unwrap_or(&Json::Null));
            tracing::info!(%message, "definition log");
            Ok(())
        }
        other => Err(MachineError::UnknownAction(other.to_string())),
    }
}

/// Token-renders an action's parameters. The nested action lists of `when`
/// (`then`/`else`) and `scheduleActions` (`actions`) are carried through
/// unrendered.
fn render_params(spec: &ActionSpec, ctx: &ActionCtx<'_>) -> Json {
    let view = json!({
        "event": ctx.event,
        "state": ctx.state.to_json(),
        "context": ctx.context,
        "data": ctx.data,
    });

    let opaque: &[&str] = match spec.name.as_str() {
        "when" => &["then", "else"],
        "scheduleActions" => &["actions"],
        _ => &[],
    };

    if opaque.is_empty() {
        return render(&spec.params, &view);
    }

    let Json::Object(map) = &spec.params else {
        return render(&spec.params, &view);
    };
    let mut trimmed = map.clone();
    let kept: Vec<(String, Json)> = opaque
        .iter()
        .filter_map(|k| trimmed.remove(*k).map(|v| (k.to_string(), v)))
        .collect();

    let mut rendered = render(&Json::Object(trimmed), &view);
    if let Json::Object(out) = &mut rendered {
        for (k, v) in kept {
            out.insert(k, v);
        }
    }
    rendered
}

// ---------------------------------------------------------------------------
// Core mutators
// ---------------------------------------------------------------------------

fn set_state(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let path = str_param(params, "setState", "path")?;
    // Absent value is a no-op; explicit null is a legitimate write.
    let Some(value) = params.get("value") else {
        return Ok(());
    };
    write(ctx, "setState", path, Value::from_json(value))
}

fn increment(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let path = str_param(params, "increment", "path")?;
    let delta = num_param(params, "delta").unwrap_or(1.0);
    add_at(ctx, "increment", path, delta)
}

fn increment_if_equal(
    params: &Json,
    ctx: &mut ActionCtx<'_>,
) -> Result<(), MachineError> {
    let path = str_param(params, "incrementIfEqual", "path")?;
    let equals_path = str_param(params, "incrementIfEqual", "equalsPath")?;
    let expected = params
        .get("value")
        .ok_or(MachineError::MissingParam {
            action: "incrementIfEqual",
            param: "value",
        })?;
    let delta = num_param(params, "delta").unwrap_or(1.0);

    let current = get_path(ctx.state, equals_path)
        .map(|v| text(&v.to_json()))
        .unwrap_or_default();
    if current == text(expected) {
        add_at(ctx, "incrementIfEqual", path, delta)?;
    }
    Ok(())
}

fn set_from_data(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let state_path = str_param(params, "setFromData", "statePath")?;
    let data_path = str_param(params, "setFromData", "dataPath")?;
    let value = lookup(ctx.data, data_path).ok_or_else(|| MachineError::MissingData {
        action: "setFromData",
        path: data_path.to_string(),
    })?;
    let value = Value::from_json(value);
    write(ctx, "setFromData", state_path, value)
}

fn set_from_array(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let state_path = str_param(params, "setFromArray", "statePath")?;
    let element = pick_element("setFromArray", params, ctx)?;

    let value = match params.get("key").and_then(Json::as_str) {
        Some(key) => element.get(key).cloned().ok_or_else(|| {
            MachineError::MissingData {
                action: "setFromArray",
                path: key.to_string(),
            }
        })?,
        None => element,
    };
    write(ctx, "setFromArray", state_path, Value::from_json(&value))
}

// ---------------------------------------------------------------------------
// Instance creation
// ---------------------------------------------------------------------------

fn create_instance(
    params: &Json,
    ctx: &mut ActionCtx<'_>,
    ensure: bool,
) -> Result<(), MachineError> {
    let action: &'static str = if ensure {
        "ensureInstanceAtPath"
    } else {
        "createInstance"
    };
    let class = str_param(params, action, "className")?;
    let state_path = str_param(params, action, "statePath")?;

    if ensure {
        if let Some(existing) = get_path(ctx.state, state_path) {
            if existing.is_record() {
                return Ok(());
            }
        }
    }

    let data = params.get("data").unwrap_or(&Json::Null);
    let instance = ctx
        .classes
        .instantiate_with_data(class, data)
        .map_err(|source| MachineError::State { action, source })?;
    write(ctx, action, state_path, instance)
}

fn create_instance_from_array(
    params: &Json,
    ctx: &mut ActionCtx<'_>,
) -> Result<(), MachineError> {
    let action = "createInstanceFromArray";
    let class = str_param(params, action, "className")?;
    let state_path = str_param(params, action, "statePath")?;
    let element = pick_element(action, params, ctx)?;

    let instance = ctx
        .classes
        .instantiate_with_data(class, &element)
        .map_err(|source| MachineError::State { action, source })?;
    write(ctx, action, state_path, instance)
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

fn when(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let cond = params.get("cond").ok_or(MachineError::MissingParam {
        action: "when",
        param: "cond",
    })?;

    let view = json!({
        "state": ctx.state.to_json(),
        "context": ctx.context,
        "data": ctx.data,
    });
    let chosen = match eval_bool(cond, &view) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "when condition failed, taking else branch");
            false
        }
    };

    let branch = if chosen {
        params.get("then")
    } else {
        params.get("else")
    };
    if let Some(branch) = branch {
        let specs = ActionSpec::parse_list(branch);
        run_actions(&specs, ctx);
    }
    Ok(())
}

fn schedule_actions(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let delay_ms = num_param(params, "delayMs").ok_or(MachineError::MissingParam {
        action: "scheduleActions",
        param: "delayMs",
    })?;
    let actions = ActionSpec::parse_list(
        params.get("actions").unwrap_or(&Json::Null),
    );

    // The triggering event is captured now: when the batch fires, its
    // actions template against this snapshot, not whatever arrived since.
    ctx.scheduler.schedule(
        ctx.now_ms + delay_ms.max(0.0) as u64,
        TimerTask::Batch {
            actions,
            event: ctx.event.clone(),
        },
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Side channels
// ---------------------------------------------------------------------------

fn broadcast(params: &Json, ctx: &mut ActionCtx<'_>) -> Result<(), MachineError> {
    let event = str_param(params, "broadcast", "event")?;
    ctx.outbox.broadcasts.push(Broadcast {
        event: event.to_string(),
        data: params.get("data").cloned().unwrap_or(Json::Null),
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

fn str_param<'p>(
    params: &'p Json,
    action: &'static str,
    param: &'static str,
) -> Result<&'p str, MachineError> {
    params
        .get(param)
        .and_then(Json::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(MachineError::MissingParam { action, param })
}

/// Numeric parameter, accepting numbers and numeric strings (tokens render
/// through strings).
fn num_param(params: &Json, param: &str) -> Option<f64> {
    match params.get(param)? {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form used for `incrementIfEqual` comparison and `log`.
fn text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        _ => String::new(),
    }
}

/// Resolves `{arrayPath, index?|indexStatePath?}` to one element of a
/// `data` array. Defaults to index 0.
fn pick_element(
    action: &'static str,
    params: &Json,
    ctx: &ActionCtx<'_>,
) -> Result<Json, MachineError> {
    let array_path = str_param(params, action, "arrayPath")?;
    let array = lookup(ctx.data, array_path)
        .and_then(Json::as_array)
        .ok_or_else(|| MachineError::MissingData {
            action,
            path: array_path.to_string(),
        })?;

    let index = if let Some(index_path) =
        params.get("indexStatePath").and_then(Json::as_str)
    {
        get_path(ctx.state, index_path)
            .and_then(Value::as_f64)
            .map(|f| f as usize)
            .ok_or_else(|| MachineError::MissingData {
                action,
                path: index_path.to_string(),
            })?
    } else {
        num_param(params, "index").unwrap_or(0.0) as usize
    };

    array.get(index).cloned().ok_or_else(|| MachineError::MissingData {
        action,
        path: format!("{array_path}.{index}"),
    })
}

fn write(
    ctx: &mut ActionCtx<'_>,
    action: &'static str,
    path: &str,
    value: Value,
) -> Result<(), MachineError> {
    set_path(ctx.state, path, value)
        .map_err(|source| MachineError::State { action, source })
}

fn add_at(
    ctx: &mut ActionCtx<'_>,
    action: &'static str,
    path: &str,
    delta: f64,
) -> Result<(), MachineError> {
    // Non-numeric current values count as 0 before the add.
    let current = get_path(ctx.state, path)
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    write(ctx, action, path, Value::Number(current + delta))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use playcast_definition::SchemaDef;
    use serde_json::json;

    struct World {
        state: Value,
        classes: ClassTable,
        data: Json,
        context: Json,
        scheduler: Scheduler,
        outbox: Outbox,
        now_ms: u64,
        event: Json,
    }

    impl World {
        fn new() -> Self {
            let schema: SchemaDef = serde_json::from_value(json!({
                "root": "S",
                "classes": {
                    "S": {"players": {"map": "Player"}, "title": {"type": "string"}},
                    "Player": {
                        "name": {"type": "string"},
                        "score": {"type": "number"},
                        "phase": {"type": "string"},
                        "questionIndex": {"type": "number"},
                        "currentQuestion": {"ref": "Question"}
                    },
                    "Question": {
                        "text": {"type": "string"},
                        "correctAnswer": {"type": "string"},
                        "options": {"array": "string"}
                    }
                },
                "defaults": {"Player": {"score": 0, "phase": "waiting", "questionIndex": 0}}
            }))
            .unwrap();
            let classes = ClassTable::build(&schema).unwrap();
            let mut state = classes.instantiate_root().unwrap();
            let player = classes.instantiate("Player").unwrap();
            set_path(&mut state, "players.A", player).unwrap();

            World {
                state,
                classes,
                data: json!({
                    "questions": [
                        {"text": "q0", "correctAnswer": "2", "options": ["a", "b"]},
                        {"text": "q1", "correctAnswer": "false", "options": []}
                    ],
                    "welcome": "hello"
                }),
                context: json!({"questionCount": 2}),
                scheduler: Scheduler::new(),
                outbox: Outbox::default(),
                now_ms: 0,
                event: json!({"type": "answer", "sessionId": "A", "value": "2"}),
            }
        }

        fn run(&mut self, actions: Json) {
            let specs = ActionSpec::parse_list(&actions);
            let mut ctx = ActionCtx {
                state: &mut self.state,
                classes: &self.classes,
                data: &self.data,
                context: &self.context,
                scheduler: &mut self.scheduler,
                outbox: &mut self.outbox,
                now_ms: self.now_ms,
                event: self.event.clone(),
            };
            run_actions(&specs, &mut ctx);
        }

        fn snap(&self) -> Json {
            self.state.to_json()
        }
    }

    #[test]
    fn test_set_state_writes_through_tokens() {
        let mut w = World::new();
        w.run(json!([{
            "type": "setState",
            "params": {"path": "players.${event.sessionId}.phase", "value": "question"}
        }]));
        assert_eq!(w.snap()["players"]["A"]["phase"], json!("question"));
    }

    #[test]
    fn test_set_state_without_value_is_noop_but_null_writes() {
        let mut w = World::new();
        w.run(json!([{"type": "setState", "params": {"path": "title"}}]));
        assert_eq!(w.snap()["title"], json!(null));

        w.run(json!([{"type": "setState", "params": {"path": "title", "value": "t"}}]));
        w.run(json!([{"type": "setState", "params": {"path": "title", "value": null}}]));
        assert_eq!(w.snap()["title"], json!(null));
    }

    #[test]
    fn test_set_state_is_idempotent() {
        let mut w = World::new();
        let write = json!([{"type": "setState", "params": {"path": "title", "value": "x"}}]);
        w.run(write.clone());
        let once = w.snap();
        w.run(write);
        assert_eq!(w.snap(), once);
    }

    #[test]
    fn test_increment_defaults_and_inverse() {
        let mut w = World::new();
        w.run(json!([{"type": "increment", "params": {"path": "players.A.score"}}]));
        assert_eq!(w.snap()["players"]["A"]["score"], json!(1));

        w.run(json!([{"type": "increment", "params": {"path": "players.A.score", "delta": 4}}]));
        w.run(json!([{"type": "increment", "params": {"path": "players.A.score", "delta": -4}}]));
        assert_eq!(w.snap()["players"]["A"]["score"], json!(1));
    }

    #[test]
    fn test_increment_treats_non_numeric_as_zero() {
        let mut w = World::new();
        w.run(json!([
            {"type": "setState", "params": {"path": "players.A.phase", "value": "x"}},
            {"type": "increment", "params": {"path": "players.A.phase", "delta": 3}}
        ]));
        assert_eq!(w.snap()["players"]["A"]["phase"], json!(3));
    }

    #[test]
    fn test_increment_if_equal_scores_matching_answers_only() {
        let mut w = World::new();
        w.run(json!([{
            "type": "createInstanceFromArray",
            "params": {"className": "Question", "statePath": "players.A.currentQuestion",
                       "arrayPath": "questions", "index": 0}
        }]));

        let grade = json!([{
            "type": "incrementIfEqual",
            "params": {"path": "players.A.score",
                       "equalsPath": "players.A.currentQuestion.correctAnswer",
                       "value": "${event.value}"}
        }]);

        // event.value is "2", correctAnswer is "2" → score.
        w.run(grade.clone());
        assert_eq!(w.snap()["players"]["A"]["score"], json!(1));

        // Wrong answer → unchanged.
        w.event = json!({"type": "answer", "sessionId": "A", "value": "0"});
        w.run(grade);
        assert_eq!(w.snap()["players"]["A"]["score"], json!(1));
    }

    #[test]
    fn test_set_from_data_copies_static_values() {
        let mut w = World::new();
        w.run(json!([{
            "type": "setFromData",
            "params": {"statePath": "title", "dataPath": "welcome"}
        }]));
        assert_eq!(w.snap()["title"], json!("hello"));
    }

    #[test]
    fn test_set_from_array_with_key_projection() {
        let mut w = World::new();
        w.run(json!([{
            "type": "setFromArray",
            "params": {"statePath": "title", "arrayPath": "questions",
                       "index": 1, "key": "text"}
        }]));
        assert_eq!(w.snap()["title"], json!("q1"));
    }

    #[test]
    fn test_set_from_array_index_from_state() {
        let mut w = World::new();
        w.run(json!([
            {"type": "setState", "params": {"path": "players.A.questionIndex", "value": 1}},
            {"type": "setFromArray",
             "params": {"statePath": "title", "arrayPath": "questions",
                        "indexStatePath": "players.A.questionIndex", "key": "text"}}
        ]));
        assert_eq!(w.snap()["title"], json!("q1"));
    }

    #[test]
    fn test_create_instance_applies_defaults_and_data() {
        let mut w = World::new();
        w.run(json!([{
            "type": "createInstance",
            "params": {"className": "Player", "statePath": "players.B",
                       "data": {"name": "bea"}}
        }]));
        let b = &w.snap()["players"]["B"];
        assert_eq!(b["name"], json!("bea"));
        assert_eq!(b["score"], json!(0));
        assert_eq!(b["phase"], json!("waiting"));
    }

    #[test]
    fn test_create_instance_from_array_copies_element_fields() {
        let mut w = World::new();
        w.run(json!([{
            "type": "createInstanceFromArray",
            "params": {"className": "Question",
                       "statePath": "players.A.currentQuestion",
                       "arrayPath": "questions", "index": 1}
        }]));
        let q = &w.snap()["players"]["A"]["currentQuestion"];
        assert_eq!(q["text"], json!("q1"));
        assert_eq!(q["correctAnswer"], json!("false"));
    }

    #[test]
    fn test_ensure_instance_is_idempotent() {
        let mut w = World::new();
        let ensure = json!([{
            "type": "ensureInstanceAtPath",
            "params": {"className": "Question",
                       "statePath": "players.A.currentQuestion",
                       "data": {"text": "first"}}
        }]);
        w.run(ensure.clone());
        let once = w.snap();
        w.run(ensure);
        assert_eq!(w.snap(), once);
        assert_eq!(once["players"]["A"]["currentQuestion"]["text"], json!("first"));
    }

    #[test]
    fn test_when_picks_branch_against_state_view() {
        let mut w = World::new();
        w.run(json!([{
            "type": "when",
            "params": {
                "cond": {"<": [{"var": "state.players.A.score"}, 1]},
                "then": [{"type": "setState", "params": {"path": "players.A.phase", "value": "low"}}],
                "else": [{"type": "setState", "params": {"path": "players.A.phase", "value": "high"}}]
            }
        }]));
        assert_eq!(w.snap()["players"]["A"]["phase"], json!("low"));
    }

    #[test]
    fn test_when_broken_cond_takes_else_branch() {
        let mut w = World::new();
        w.run(json!([{
            "type": "when",
            "params": {
                "cond": {"mystery": [1]},
                "then": [{"type": "setState", "params": {"path": "title", "value": "t"}}],
                "else": [{"type": "setState", "params": {"path": "title", "value": "e"}}]
            }
        }]));
        assert_eq!(w.snap()["title"], json!("e"));
    }

    #[test]
    fn test_unknown_action_in_branch_does_not_abort_siblings() {
        let mut w = World::new();
        w.run(json!([{
            "type": "when",
            "params": {
                "cond": true,
                "then": [
                    {"type": "explode", "params": {}},
                    {"type": "setState", "params": {"path": "title", "value": "alive"}}
                ]
            }
        }]));
        assert_eq!(w.snap()["title"], json!("alive"));
    }

    #[test]
    fn test_unknown_top_level_action_skipped() {
        let mut w = World::new();
        w.run(json!([
            {"type": "teleport", "params": {}},
            {"type": "setState", "params": {"path": "title", "value": "ok"}}
        ]));
        assert_eq!(w.snap()["title"], json!("ok"));
    }

    #[test]
    fn test_path_error_skips_only_that_action() {
        let mut w = World::new();
        w.run(json!([
            // Undeclared field on a classed instance.
            {"type": "setState", "params": {"path": "players.A.cheats", "value": 1}},
            {"type": "setState", "params": {"path": "players.A.phase", "value": "ok"}}
        ]));
        assert_eq!(w.snap()["players"]["A"].get("cheats"), None);
        assert_eq!(w.snap()["players"]["A"]["phase"], json!("ok"));
    }

    #[test]
    fn test_schedule_actions_defers_with_event_snapshot() {
        let mut w = World::new();
        w.run(json!([{
            "type": "scheduleActions",
            "params": {
                "delayMs": 3000,
                "actions": [{"type": "increment",
                             "params": {"path": "players.${event.sessionId}.score"}}]
            }
        }]));

        // Nothing ran inline.
        assert_eq!(w.snap()["players"]["A"]["score"], json!(0));
        assert_eq!(w.scheduler.next_deadline(), Some(3000));

        let TimerTask::Batch { actions, event } =
            w.scheduler.pop_due(3000).unwrap()
        else {
            panic!("expected batch");
        };
        assert_eq!(event["sessionId"], json!("A"));
        // Nested params stayed raw for later rendering.
        assert_eq!(
            actions[0].params["path"],
            json!("players.${event.sessionId}.score")
        );
    }

    #[test]
    fn test_broadcast_lands_in_outbox() {
        let mut w = World::new();
        w.run(json!([{
            "type": "broadcast",
            "params": {"event": "roundOver", "data": {"by": "${event.sessionId}"}}
        }]));
        assert_eq!(
            w.outbox.broadcasts,
            vec![Broadcast {
                event: "roundOver".into(),
                data: json!({"by": "A"}),
            }]
        );
    }
}
