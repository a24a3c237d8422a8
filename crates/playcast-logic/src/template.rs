//! `${…}` token expansion for action parameters.
//!
//! Every string in a parameter tree may embed `${dotted.path}` placeholders
//! resolved against the view. A string that is exactly one placeholder
//! substitutes the resolved value itself, preserving its type — this is how
//! `{"value": "${event.value}"}` writes the sender's actual value rather
//! than a stringified copy. Strings mixing placeholders with other text
//! interpolate; unresolved placeholders render as empty strings.

use serde_json::Value as Json;

use crate::eval::lookup;

/// Renders a parameter tree against a view. Arrays and objects are
/// traversed recursively; non-string leaves pass through unchanged.
pub fn render(params: &Json, view: &Json) -> Json {
    match params {
        Json::String(s) => render_string(s, view),
        Json::Array(items) => {
            Json::Array(items.iter().map(|item| render(item, view)).collect())
        }
        Json::Object(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render(v, view)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render_string(s: &str, view: &Json) -> Json {
    // Fast path: no placeholder at all.
    let Some(start) = s.find("${") else {
        return Json::String(s.to_string());
    };

    // Whole-string placeholder: substitute the raw value, keeping its type.
    if start == 0 && s.ends_with('}') && !s[2..s.len() - 1].contains("${") {
        let path = &s[2..s.len() - 1];
        if !path.contains('}') {
            return match lookup(view, path) {
                Some(Json::Null) | None => Json::String(String::new()),
                Some(found) => found.clone(),
            };
        }
    }

    // Mixed content: interpolate each placeholder as text.
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 2..];
        match tail.find('}') {
            Some(close) => {
                let path = &tail[..close];
                out.push_str(&stringify(lookup(view, path)));
                rest = &tail[close + 1..];
            }
            None => {
                // Unterminated placeholder: emit the remainder verbatim.
                out.push_str(&rest[open..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    Json::String(out)
}

/// Text form of a resolved value for interpolation. Only leaf values have
/// one; containers and missing values become the empty string.
fn stringify(value: Option<&Json>) -> String {
    match value {
        Some(Json::String(s)) => s.clone(),
        Some(Json::Bool(b)) => b.to_string(),
        Some(Json::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        _ => String::new(),
    }
}

// =========================================================================
// Tests
// =========================================================================
