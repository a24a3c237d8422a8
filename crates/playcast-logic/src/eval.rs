//! The logic-tree evaluator.
//!
//! A node is one of:
//! - an object with exactly one key: an operator applied to its argument(s)
//! - an array: evaluated element-wise
//! - anything else: a literal
//!
//! Operators: `var`, equality (`==`, `!=`, `===`, `!==`), ordering
//! (`<`, `<=`, `>`, `>=`), logical (`and`, `or`, `!`, `!!`), arithmetic
//! (`+`, `-`, `*`, `/`, `%`), and membership (`in`).

use serde_json::Value as Json;

use crate::LogicError;

/// Evaluates a logic tree against a view, yielding a JSON value.
pub fn eval(node: &Json, view: &Json) -> Result<Json, LogicError> {
    match node {
        Json::Object(map) if map.len() == 1 => {
            let (op, raw) = map.iter().next().expect("len checked");
            apply(op, raw, view)
        }
        Json::Object(map) => Err(LogicError::Malformed(format!(
            "operator node must have exactly one key, found {}",
            map.len()
        ))),
        Json::Array(items) => {
            let evaluated: Result<Vec<Json>, _> =
                items.iter().map(|item| eval(item, view)).collect();
            Ok(Json::Array(evaluated?))
        }
        literal => Ok(literal.clone()),
    }
}

/// Evaluates a logic tree to a boolean via [`truthy`].
pub fn eval_bool(node: &Json, view: &Json) -> Result<bool, LogicError> {
    Ok(truthy(&eval(node, view)?))
}

/// JavaScript-flavored truthiness: `false`, `null`, `0`, `""`, and `[]`
/// are falsy; everything else is truthy.
pub fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Json::String(s) => !s.is_empty(),
        Json::Array(items) => !items.is_empty(),
        Json::Object(_) => true,
    }
}

/// Resolves a dotted path against a JSON view. Numeric segments index
/// arrays. Empty segments are ignored.
pub fn lookup<'a>(view: &'a Json, path: &str) -> Option<&'a Json> {
    let mut current = view;
    for seg in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Json::Object(map) => map.get(seg)?,
            Json::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// Operator dispatch
// ---------------------------------------------------------------------------

fn apply(op: &str, raw: &Json, view: &Json) -> Result<Json, LogicError> {
    // `var` receives its argument unevaluated-first: the path itself may be
    // the result of a nested expression.
    if op == "var" {
        return apply_var(raw, view);
    }

    let args: Vec<Json> = match raw {
        Json::Array(items) => items
            .iter()
            .map(|item| eval(item, view))
            .collect::<Result<_, _>>()?,
        single => vec![eval(single, view)?],
    };

    match op {
        "==" => binary(op, &args, |a, b| Ok(Json::Bool(loose_eq(a, b)))),
        "!=" => binary(op, &args, |a, b| Ok(Json::Bool(!loose_eq(a, b)))),
        "===" => binary(op, &args, |a, b| Ok(Json::Bool(a == b))),
        "!==" => binary(op, &args, |a, b| Ok(Json::Bool(a != b))),
        "<" => compare(op, &args, |o| o == std::cmp::Ordering::Less),
        "<=" => compare(op, &args, |o| o != std::cmp::Ordering::Greater),
        ">" => compare(op, &args, |o| o == std::cmp::Ordering::Greater),
        ">=" => compare(op, &args, |o| o != std::cmp::Ordering::Less),
        "and" => {
            for arg in &args {
                if !truthy(arg) {
                    return Ok(arg.clone());
                }
            }
            Ok(args.last().cloned().unwrap_or(Json::Bool(true)))
        }
        "or" => {
            for arg in &args {
                if truthy(arg) {
                    return Ok(arg.clone());
                }
            }
            Ok(args.last().cloned().unwrap_or(Json::Bool(false)))
        }
        "!" => unary(op, &args, |a| Ok(Json::Bool(!truthy(a)))),
        "!!" => unary(op, &args, |a| Ok(Json::Bool(truthy(a)))),
        "+" => fold_numeric(op, &args, 0.0, |acc, n| acc + n),
        "*" => fold_numeric(op, &args, 1.0, |acc, n| acc * n),
        "-" => match args.len() {
            1 => Ok(number(-to_number(op, &args[0])?)),
            2 => Ok(number(
                to_number(op, &args[0])? - to_number(op, &args[1])?,
            )),
            got => Err(LogicError::Arity {
                op: op.into(),
                expected: 2,
                got,
            }),
        },
        "/" => binary(op, &args, |a, b| {
            let d = to_number(op, b)?;
            if d == 0.0 {
                return Err(LogicError::DivisionByZero);
            }
            Ok(number(to_number(op, a)? / d))
        }),
        "%" => binary(op, &args, |a, b| {
            let d = to_number(op, b)?;
            if d == 0.0 {
                return Err(LogicError::DivisionByZero);
            }
            Ok(number(to_number(op, a)? % d))
        }),
        "in" => binary(op, &args, |needle, haystack| match haystack {
            Json::Array(items) => {
                Ok(Json::Bool(items.iter().any(|i| loose_eq(needle, i))))
            }
            Json::String(s) => match needle {
                Json::String(n) => Ok(Json::Bool(s.contains(n.as_str()))),
                _ => Ok(Json::Bool(false)),
            },
            _ => Ok(Json::Bool(false)),
        }),
        other => Err(LogicError::UnknownOperator(other.to_string())),
    }
}

fn apply_var(raw: &Json, view: &Json) -> Result<Json, LogicError> {
    let (path_node, default) = match raw {
        Json::Array(items) => match items.len() {
            1 => (&items[0], None),
            2 => (&items[0], Some(&items[1])),
            got => {
                return Err(LogicError::Arity {
                    op: "var".into(),
                    expected: 1,
                    got,
                })
            }
        },
        single => (single, None),
    };

    let path = match eval(path_node, view)? {
        Json::String(s) => s,
        other => {
            return Err(LogicError::Malformed(format!(
                "`var` path must be a string, got {other}"
            )))
        }
    };

    match lookup(view, &path) {
        Some(found) => Ok(found.clone()),
        None => match default {
            Some(d) => eval(d, view),
            None => Ok(Json::Null),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unary(
    op: &str,
    args: &[Json],
    f: impl Fn(&Json) -> Result<Json, LogicError>,
) -> Result<Json, LogicError> {
    match args {
        [a] => f(a),
        _ => Err(LogicError::Arity {
            op: op.into(),
            expected: 1,
            got: args.len(),
        }),
    }
}

fn binary(
    op: &str,
    args: &[Json],
    f: impl Fn(&Json, &Json) -> Result<Json, LogicError>,
) -> Result<Json, LogicError> {
    match args {
        [a, b] => f(a, b),
        _ => Err(LogicError::Arity {
            op: op.into(),
            expected: 2,
            got: args.len(),
        }),
    }
}

fn compare(
    op: &str,
    args: &[Json],
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Json, LogicError> {
    binary(op, args, |a, b| {
        let ordering = match (a, b) {
            (Json::String(x), Json::String(y)) => x.cmp(y),
            _ => {
                let (x, y) = (to_number(op, a)?, to_number(op, b)?);
                x.partial_cmp(&y)
                    .ok_or_else(|| LogicError::NonNumeric(op.into()))?
            }
        };
        Ok(Json::Bool(accept(ordering)))
    })
}

fn fold_numeric(
    op: &str,
    args: &[Json],
    init: f64,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Json, LogicError> {
    let mut acc = init;
    for arg in args {
        acc = f(acc, to_number(op, arg)?);
    }
    Ok(number(acc))
}

fn number(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Json::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

fn as_number(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        Json::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn to_number(op: &str, value: &Json) -> Result<f64, LogicError> {
    as_number(value).ok_or_else(|| LogicError::NonNumeric(op.to_string()))
}

/// Loose equality: identical values are equal, and a number compares equal
/// to a string or boolean carrying the same numeric value.
fn loose_eq(a: &Json, b: &Json) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Json::Number(_), _) | (_, Json::Number(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => false,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view() -> Json {
        json!({
            "event": {"type": "answer", "sessionId": "A", "value": "2"},
            "state": {"players": {"A": {"score": 3, "phase": "question"}}},
            "context": {"questionCount": 4},
            "data": {"questions": ["q0", "q1"]}
        })
    }

    fn ev(node: Json) -> Json {
        eval(&node, &view()).unwrap()
    }

    #[test]
    fn test_literals_evaluate_to_themselves() {
        assert_eq!(ev(json!(42)), json!(42));
        assert_eq!(ev(json!("hi")), json!("hi"));
        assert_eq!(ev(json!([1, 2])), json!([1, 2]));
        assert_eq!(ev(json!(null)), json!(null));
    }

    #[test]
    fn test_var_resolves_dotted_paths() {
        assert_eq!(ev(json!({"var": "state.players.A.score"})), json!(3));
        assert_eq!(ev(json!({"var": "context.questionCount"})), json!(4));
        assert_eq!(ev(json!({"var": "data.questions.1"})), json!("q1"));
    }

    #[test]
    fn test_var_missing_is_null_or_default() {
        assert_eq!(ev(json!({"var": "state.players.Z.score"})), json!(null));
        assert_eq!(
            ev(json!({"var": ["state.players.Z.score", 0]})),
            json!(0)
        );
    }

    #[test]
    fn test_loose_equality_coerces_numbers() {
        assert_eq!(ev(json!({"==": [1, 1]})), json!(true));
        assert_eq!(ev(json!({"==": [1, "1"]})), json!(true));
        assert_eq!(ev(json!({"==": ["a", "b"]})), json!(false));
        assert_eq!(ev(json!({"!=": [1, "2"]})), json!(true));
    }

    #[test]
    fn test_strict_equality_requires_same_type() {
        assert_eq!(ev(json!({"===": [1, "1"]})), json!(false));
        assert_eq!(ev(json!({"===": [1, 1]})), json!(true));
        assert_eq!(ev(json!({"!==": [1, "1"]})), json!(true));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(ev(json!({"<": [{"var": "state.players.A.score"}, 4]})), json!(true));
        assert_eq!(ev(json!({"<": [4, 4]})), json!(false));
        assert_eq!(ev(json!({"<=": [4, 4]})), json!(true));
        assert_eq!(ev(json!({">": ["10", 2]})), json!(true));
        assert_eq!(ev(json!({">=": [2, 3]})), json!(false));
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        assert_eq!(ev(json!({"<": ["apple", "banana"]})), json!(true));
    }

    #[test]
    fn test_logical_operators_short_circuit_semantics() {
        assert_eq!(ev(json!({"and": [true, "keep"]})), json!("keep"));
        assert_eq!(ev(json!({"and": [0, "skip"]})), json!(0));
        assert_eq!(ev(json!({"or": [0, "fallback"]})), json!("fallback"));
        assert_eq!(ev(json!({"or": ["first", "second"]})), json!("first"));
        assert_eq!(ev(json!({"!": [0]})), json!(true));
        assert_eq!(ev(json!({"!!": ["x"]})), json!(true));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(ev(json!({"+": [1, 2, 3]})), json!(6));
        assert_eq!(ev(json!({"-": [10, 4]})), json!(6));
        assert_eq!(ev(json!({"-": [5]})), json!(-5));
        assert_eq!(ev(json!({"*": [2, 3, 4]})), json!(24));
        assert_eq!(ev(json!({"/": [9, 2]})), json!(4.5));
        assert_eq!(ev(json!({"%": [7, 3]})), json!(1));
    }

    #[test]
    fn test_arithmetic_coerces_numeric_strings() {
        assert_eq!(ev(json!({"+": ["1", "2"]})), json!(3));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert!(matches!(
            eval(&json!({"/": [1, 0]}), &view()),
            Err(LogicError::DivisionByZero)
        ));
    }

    #[test]
    fn test_membership() {
        assert_eq!(ev(json!({"in": ["q1", {"var": "data.questions"}]})), json!(true));
        assert_eq!(ev(json!({"in": ["q9", {"var": "data.questions"}]})), json!(false));
        assert_eq!(ev(json!({"in": ["ell", "hello"]})), json!(true));
    }

    #[test]
    fn test_nested_trees() {
        // (score + 1) < questionCount
        let node = json!({"<": [
            {"+": [{"var": "state.players.A.score"}, 1]},
            {"var": "context.questionCount"}
        ]});
        assert_eq!(ev(node), json!(false));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        assert!(matches!(
            eval(&json!({"frobnicate": [1]}), &view()),
            Err(LogicError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_multi_key_object_is_malformed() {
        assert!(matches!(
            eval(&json!({"==": [1, 1], "!=": [1, 2]}), &view()),
            Err(LogicError::Malformed(_))
        ));
    }

    #[test]
    fn test_eval_bool_truthiness() {
        assert!(eval_bool(&json!({"var": "event.sessionId"}), &view()).unwrap());
        assert!(!eval_bool(&json!({"var": "event.missing"}), &view()).unwrap());
        assert!(!eval_bool(&json!(""), &view()).unwrap());
        assert!(!eval_bool(&json!([]), &view()).unwrap());
        assert!(eval_bool(&json!({"var": "state"}), &view()).unwrap());
    }
}
